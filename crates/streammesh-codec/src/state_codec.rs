use crate::error::CodecError;
use crate::primitives::*;
use bytes::{Buf, BufMut, BytesMut};
use streammesh_types::{
    ColumnValue, Element, EvictionPolicy, ServiceKey, StreamState, StreamStateTransition, Subject, Tag, TagSet,
    TopicKey,
};

pub(crate) fn put_subject(buf: &mut BytesMut, subject: &Subject) {
    put_string(buf, subject.service.as_str());
    put_string(buf, subject.topic.as_str());
    let tags: Vec<String> = subject.tags.0.iter().map(|t| t.as_str().to_string()).collect();
    put_string_vec(buf, &tags);
}

pub(crate) fn get_subject(buf: &mut impl Buf) -> Result<Subject, CodecError> {
    let service = ServiceKey::new(get_string(buf)?);
    let topic = TopicKey::new(get_string(buf)?);
    let tags = get_string_vec(buf)?;
    let tags = TagSet::from_iter(tags.into_iter().map(Tag::new));
    Ok(Subject::new(service, topic, tags))
}

fn put_eviction(buf: &mut BytesMut, eviction: EvictionPolicy) {
    buf.put_u8(match eviction {
        EvictionPolicy::FromHead => 0,
        EvictionPolicy::FromTail => 1,
    });
}

fn get_eviction(buf: &mut impl Buf) -> Result<EvictionPolicy, CodecError> {
    match get_u8(buf)? {
        0 => Ok(EvictionPolicy::FromHead),
        1 => Ok(EvictionPolicy::FromTail),
        other => Err(CodecError::UnknownMessageKind(other)),
    }
}

fn put_column_value(buf: &mut BytesMut, value: &ColumnValue) {
    match value {
        ColumnValue::Str(s) => {
            buf.put_u8(0);
            put_string(buf, s);
        }
        ColumnValue::Int(i) => {
            buf.put_u8(1);
            buf.put_i64(*i);
        }
        ColumnValue::Bool(b) => {
            buf.put_u8(2);
            buf.put_u8(if *b { 1 } else { 0 });
        }
    }
}

fn get_column_value(buf: &mut impl Buf) -> Result<ColumnValue, CodecError> {
    match get_u8(buf)? {
        0 => Ok(ColumnValue::Str(get_string(buf)?)),
        1 => {
            if buf.remaining() < 8 {
                return Err(CodecError::UnexpectedEof);
            }
            Ok(ColumnValue::Int(buf.get_i64()))
        }
        2 => Ok(ColumnValue::Bool(get_bool(buf)?)),
        other => Err(CodecError::UnknownMessageKind(other)),
    }
}

fn put_column_values(buf: &mut BytesMut, values: &[ColumnValue]) {
    buf.put_u32(values.len() as u32);
    for v in values {
        put_column_value(buf, v);
    }
}

fn get_column_values(buf: &mut impl Buf) -> Result<Vec<ColumnValue>, CodecError> {
    let count = get_u32(buf)? as usize;
    let mut out = Vec::with_capacity(count.min(1 << 16));
    for _ in 0..count {
        out.push(get_column_value(buf)?);
    }
    Ok(out)
}

pub(crate) fn put_stream_state(buf: &mut BytesMut, state: &StreamState) {
    match state {
        StreamState::String(s) => {
            buf.put_u8(0);
            put_string(buf, s);
        }
        StreamState::Set {
            version,
            elements,
            partial_updates,
        } => {
            buf.put_u8(1);
            buf.put_u64(*version);
            put_bytes_vec(buf, elements);
            buf.put_u8(if *partial_updates { 1 } else { 0 });
        }
        StreamState::List { capacity, eviction, items } => {
            buf.put_u8(2);
            buf.put_u32(*capacity as u32);
            put_eviction(buf, *eviction);
            put_bytes_vec(buf, items);
        }
        StreamState::DictMap { columns, values } => {
            buf.put_u8(3);
            put_string_vec(buf, columns);
            put_column_values(buf, values);
        }
    }
}

pub(crate) fn get_stream_state(buf: &mut impl Buf) -> Result<StreamState, CodecError> {
    match get_u8(buf)? {
        0 => Ok(StreamState::String(get_string(buf)?)),
        1 => {
            let version = get_u64(buf)?;
            let elements = get_bytes_vec(buf)?;
            let partial_updates = get_bool(buf)?;
            Ok(StreamState::Set {
                version,
                elements,
                partial_updates,
            })
        }
        2 => {
            let capacity = get_u32(buf)? as usize;
            let eviction = get_eviction(buf)?;
            let items: Vec<Element> = get_bytes_vec(buf)?;
            Ok(StreamState::List { capacity, eviction, items })
        }
        3 => {
            let columns = get_string_vec(buf)?;
            let values = get_column_values(buf)?;
            Ok(StreamState::DictMap { columns, values })
        }
        other => Err(CodecError::UnknownMessageKind(other)),
    }
}

pub(crate) fn put_stream_state_transition(buf: &mut BytesMut, transition: &StreamStateTransition) {
    match transition {
        StreamStateTransition::StringSet(value) => {
            buf.put_u8(0);
            put_string(buf, value);
        }
        StreamStateTransition::SetSnapshot {
            version,
            elements,
            partial_updates,
        } => {
            buf.put_u8(1);
            buf.put_u64(*version);
            put_bytes_vec(buf, elements);
            buf.put_u8(if *partial_updates { 1 } else { 0 });
        }
        StreamStateTransition::SetDelta {
            base_version,
            added,
            removed,
        } => {
            buf.put_u8(2);
            buf.put_u64(*base_version);
            put_bytes_vec(buf, added);
            put_bytes_vec(buf, removed);
        }
        StreamStateTransition::ListSnapshot {
            capacity,
            eviction,
            items,
        } => {
            buf.put_u8(3);
            buf.put_u32(*capacity as u32);
            put_eviction(buf, *eviction);
            put_bytes_vec(buf, items);
        }
        StreamStateTransition::ListAddAtHead(item) => {
            buf.put_u8(4);
            put_bytes(buf, item);
        }
        StreamStateTransition::ListAddAtTail(item) => {
            buf.put_u8(5);
            put_bytes(buf, item);
        }
        StreamStateTransition::ListRemoveByValue(item) => {
            buf.put_u8(6);
            put_bytes(buf, item);
        }
        StreamStateTransition::DictMapReplace { columns, values } => {
            buf.put_u8(7);
            put_string_vec(buf, columns);
            put_column_values(buf, values);
        }
    }
}

pub(crate) fn get_stream_state_transition(buf: &mut impl Buf) -> Result<StreamStateTransition, CodecError> {
    match get_u8(buf)? {
        0 => Ok(StreamStateTransition::StringSet(get_string(buf)?)),
        1 => {
            let version = get_u64(buf)?;
            let elements = get_bytes_vec(buf)?;
            let partial_updates = get_bool(buf)?;
            Ok(StreamStateTransition::SetSnapshot {
                version,
                elements,
                partial_updates,
            })
        }
        2 => {
            let base_version = get_u64(buf)?;
            let added = get_bytes_vec(buf)?;
            let removed = get_bytes_vec(buf)?;
            Ok(StreamStateTransition::SetDelta {
                base_version,
                added,
                removed,
            })
        }
        3 => {
            let capacity = get_u32(buf)? as usize;
            let eviction = get_eviction(buf)?;
            let items: Vec<Element> = get_bytes_vec(buf)?;
            Ok(StreamStateTransition::ListSnapshot { capacity, eviction, items })
        }
        4 => Ok(StreamStateTransition::ListAddAtHead(get_bytes(buf)?)),
        5 => Ok(StreamStateTransition::ListAddAtTail(get_bytes(buf)?)),
        6 => Ok(StreamStateTransition::ListRemoveByValue(get_bytes(buf)?)),
        7 => {
            let columns = get_string_vec(buf)?;
            let values = get_column_values(buf)?;
            Ok(StreamStateTransition::DictMapReplace { columns, values })
        }
        other => Err(CodecError::UnknownMessageKind(other)),
    }
}
