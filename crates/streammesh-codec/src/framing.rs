use crate::error::CodecError;
use crate::message::DialectMessage;
use crate::primitives::*;
use crate::state_codec::{get_stream_state, get_stream_state_transition, get_subject, put_stream_state, put_stream_state_transition, put_subject};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use streammesh_types::{Alias, ServiceKey};

fn put_alias(buf: &mut BytesMut, alias: Alias) {
    buf.put_u32(alias.0);
}

fn get_alias(buf: &mut impl Buf) -> Result<Alias, CodecError> {
    Ok(Alias(get_u32(buf)?))
}

fn encode_body(buf: &mut BytesMut, msg: &DialectMessage) {
    buf.put_u8(msg.kind_tag());
    match msg {
        DialectMessage::Alias { alias, subject } => {
            put_alias(buf, *alias);
            put_subject(buf, subject);
        }
        DialectMessage::OpenSubscription {
            alias,
            priority_key,
            aggregation_interval_ms,
        } => {
            put_alias(buf, *alias);
            put_opt_string(buf, priority_key);
            buf.put_u32(*aggregation_interval_ms);
        }
        DialectMessage::CloseSubscription { alias } => put_alias(buf, *alias),
        DialectMessage::ResetSubscription { alias } => put_alias(buf, *alias),
        DialectMessage::Signal {
            subject,
            payload,
            expire_at_millis,
            ordering_group,
            correlation_id,
        } => {
            put_subject(buf, subject);
            put_bytes(buf, payload);
            buf.put_u64(*expire_at_millis);
            put_opt_string(buf, ordering_group);
            put_opt_u64(buf, correlation_id);
        }
        DialectMessage::Ping { id } => buf.put_u64(*id),
        DialectMessage::Pong { id } => buf.put_u64(*id),
        DialectMessage::StreamStateUpdate { alias, state } => {
            put_alias(buf, *alias);
            put_stream_state(buf, state);
        }
        DialectMessage::StreamStateTransitionUpdate { alias, transition } => {
            put_alias(buf, *alias);
            put_stream_state_transition(buf, transition);
        }
        DialectMessage::SubscriptionClosed { alias } => put_alias(buf, *alias),
        DialectMessage::ServiceNotAvailable { service } => put_string(buf, service.as_str()),
        DialectMessage::InvalidRequest { alias } => put_alias(buf, *alias),
        DialectMessage::SignalAckOk { correlation_id, payload } => {
            buf.put_u64(*correlation_id);
            put_opt_bytes(buf, payload);
        }
        DialectMessage::SignalAckFailed { correlation_id, payload } => {
            buf.put_u64(*correlation_id);
            put_opt_bytes(buf, payload);
        }
    }
}

fn decode_body(kind: u8, buf: &mut impl Buf) -> Result<DialectMessage, CodecError> {
    Ok(match kind {
        0 => DialectMessage::Alias {
            alias: get_alias(buf)?,
            subject: get_subject(buf)?,
        },
        1 => DialectMessage::OpenSubscription {
            alias: get_alias(buf)?,
            priority_key: get_opt_string(buf)?,
            aggregation_interval_ms: get_u32(buf)?,
        },
        2 => DialectMessage::CloseSubscription { alias: get_alias(buf)? },
        3 => DialectMessage::ResetSubscription { alias: get_alias(buf)? },
        4 => DialectMessage::Signal {
            subject: get_subject(buf)?,
            payload: get_bytes(buf)?,
            expire_at_millis: get_u64(buf)?,
            ordering_group: get_opt_string(buf)?,
            correlation_id: get_opt_u64(buf)?,
        },
        5 => DialectMessage::Ping { id: get_u64(buf)? },
        6 => DialectMessage::Pong { id: get_u64(buf)? },
        7 => DialectMessage::StreamStateUpdate {
            alias: get_alias(buf)?,
            state: get_stream_state(buf)?,
        },
        8 => DialectMessage::StreamStateTransitionUpdate {
            alias: get_alias(buf)?,
            transition: get_stream_state_transition(buf)?,
        },
        9 => DialectMessage::SubscriptionClosed { alias: get_alias(buf)? },
        10 => DialectMessage::ServiceNotAvailable {
            service: ServiceKey::new(get_string(buf)?),
        },
        11 => DialectMessage::InvalidRequest { alias: get_alias(buf)? },
        12 => DialectMessage::SignalAckOk {
            correlation_id: get_u64(buf)?,
            payload: get_opt_bytes(buf)?,
        },
        13 => DialectMessage::SignalAckFailed {
            correlation_id: get_u64(buf)?,
            payload: get_opt_bytes(buf)?,
        },
        other => return Err(CodecError::UnknownMessageKind(other)),
    })
}

/// Encode a single message as one length-prefixed record and append it to
/// `out`. Several calls can be concatenated into one frame; the decoder
/// consumes records one at a time regardless of frame boundaries.
pub fn encode(out: &mut BytesMut, msg: &DialectMessage) {
    let mut body = BytesMut::new();
    encode_body(&mut body, msg);
    out.put_u32(body.len() as u32);
    out.put_slice(&body);
}

/// Decode every complete record found in `buf`, advancing `buf` past them.
/// A partial trailing record (not enough bytes for its declared length) is
/// left in `buf` for the caller to top up from the next socket read; any
/// other malformed record is a fatal [`CodecError`].
pub fn decode_all(buf: &mut BytesMut) -> Result<Vec<DialectMessage>, CodecError> {
    let mut out = Vec::new();
    loop {
        if buf.remaining() < 4 {
            break;
        }
        let len = {
            let mut peek = &buf[..4];
            peek.get_u32() as usize
        };
        if buf.remaining() < 4 + len {
            break;
        }
        buf.advance(4);
        let mut body = buf.split_to(len);
        let kind = get_u8(&mut body)?;
        let msg = decode_body(kind, &mut body)?;
        if body.has_remaining() {
            return Err(CodecError::TrailingGarbage {
                declared: len,
                trailing: body.remaining(),
            });
        }
        out.push(msg);
    }
    Ok(out)
}

/// Decode exactly one record from a self-contained buffer (no length
/// prefix); used by round-trip tests and by callers that already know
/// record boundaries out of band.
pub fn decode_one(mut bytes: Bytes) -> Result<DialectMessage, CodecError> {
    let kind = get_u8(&mut bytes)?;
    let msg = decode_body(kind, &mut bytes)?;
    if bytes.has_remaining() {
        return Err(CodecError::TrailingGarbage {
            declared: 0,
            trailing: bytes.remaining(),
        });
    }
    Ok(msg)
}

/// Encode exactly one record without a length prefix (the counterpart of
/// [`decode_one`]).
pub fn encode_one(msg: &DialectMessage) -> Bytes {
    let mut body = BytesMut::new();
    encode_body(&mut body, msg);
    body.freeze()
}
