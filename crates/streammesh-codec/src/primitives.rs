use crate::error::CodecError;
use bytes::{Buf, BufMut, BytesMut};

pub(crate) fn put_string(buf: &mut BytesMut, s: &str) {
    put_bytes(buf, s.as_bytes());
}

pub(crate) fn get_string(buf: &mut impl Buf) -> Result<String, CodecError> {
    let bytes = get_bytes(buf)?;
    String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
}

pub(crate) fn put_bytes(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

pub(crate) fn get_bytes(buf: &mut impl Buf) -> Result<Vec<u8>, CodecError> {
    let len = get_u32(buf)? as usize;
    if buf.remaining() < len {
        return Err(CodecError::UnexpectedEof);
    }
    let mut out = vec![0u8; len];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

pub(crate) fn put_opt_string(buf: &mut BytesMut, s: &Option<String>) {
    match s {
        Some(s) => {
            buf.put_u8(1);
            put_string(buf, s);
        }
        None => buf.put_u8(0),
    }
}

pub(crate) fn get_opt_string(buf: &mut impl Buf) -> Result<Option<String>, CodecError> {
    match get_u8(buf)? {
        0 => Ok(None),
        1 => Ok(Some(get_string(buf)?)),
        other => Err(CodecError::UnknownMessageKind(other)),
    }
}

pub(crate) fn put_opt_bytes(buf: &mut BytesMut, b: &Option<Vec<u8>>) {
    match b {
        Some(b) => {
            buf.put_u8(1);
            put_bytes(buf, b);
        }
        None => buf.put_u8(0),
    }
}

pub(crate) fn get_opt_bytes(buf: &mut impl Buf) -> Result<Option<Vec<u8>>, CodecError> {
    match get_u8(buf)? {
        0 => Ok(None),
        1 => Ok(Some(get_bytes(buf)?)),
        other => Err(CodecError::UnknownMessageKind(other)),
    }
}

pub(crate) fn put_opt_u64(buf: &mut BytesMut, v: &Option<u64>) {
    match v {
        Some(v) => {
            buf.put_u8(1);
            buf.put_u64(*v);
        }
        None => buf.put_u8(0),
    }
}

pub(crate) fn get_opt_u64(buf: &mut impl Buf) -> Result<Option<u64>, CodecError> {
    match get_u8(buf)? {
        0 => Ok(None),
        1 => Ok(Some(get_u64(buf)?)),
        other => Err(CodecError::UnknownMessageKind(other)),
    }
}

pub(crate) fn put_string_vec(buf: &mut BytesMut, items: &[String]) {
    buf.put_u32(items.len() as u32);
    for item in items {
        put_string(buf, item);
    }
}

pub(crate) fn get_string_vec(buf: &mut impl Buf) -> Result<Vec<String>, CodecError> {
    let count = get_u32(buf)? as usize;
    let mut out = Vec::with_capacity(count.min(1 << 16));
    for _ in 0..count {
        out.push(get_string(buf)?);
    }
    Ok(out)
}

pub(crate) fn put_bytes_vec(buf: &mut BytesMut, items: &[Vec<u8>]) {
    buf.put_u32(items.len() as u32);
    for item in items {
        put_bytes(buf, item);
    }
}

pub(crate) fn get_bytes_vec(buf: &mut impl Buf) -> Result<Vec<Vec<u8>>, CodecError> {
    let count = get_u32(buf)? as usize;
    let mut out = Vec::with_capacity(count.min(1 << 16));
    for _ in 0..count {
        out.push(get_bytes(buf)?);
    }
    Ok(out)
}

pub(crate) fn get_u8(buf: &mut impl Buf) -> Result<u8, CodecError> {
    if buf.remaining() < 1 {
        return Err(CodecError::UnexpectedEof);
    }
    Ok(buf.get_u8())
}

pub(crate) fn get_u32(buf: &mut impl Buf) -> Result<u32, CodecError> {
    if buf.remaining() < 4 {
        return Err(CodecError::UnexpectedEof);
    }
    Ok(buf.get_u32())
}

pub(crate) fn get_u64(buf: &mut impl Buf) -> Result<u64, CodecError> {
    if buf.remaining() < 8 {
        return Err(CodecError::UnexpectedEof);
    }
    Ok(buf.get_u64())
}

pub(crate) fn get_bool(buf: &mut impl Buf) -> Result<bool, CodecError> {
    Ok(get_u8(buf)? != 0)
}
