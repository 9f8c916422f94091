//! The binary stream dialect: length-delimited records, one leading kind-tag
//! byte per record, manually encoded fields. Bidirectional and total — every
//! record that decodes to a [`DialectMessage`] also encodes back to the same
//! bytes (see the round-trip tests in [`framing`]).

mod error;
mod framing;
mod message;
mod primitives;
mod state_codec;

pub use error::CodecError;
pub use framing::{decode_all, decode_one, encode, encode_one};
pub use message::{CorrelationId, DialectMessage};

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use streammesh_types::{Alias, ColumnValue, EvictionPolicy, ServiceKey, StreamState, StreamStateTransition, Subject, Tag, TagSet, TopicKey};

    fn sample_subject() -> Subject {
        Subject::new(
            ServiceKey::new("svcA"),
            TopicKey::new("topic1"),
            TagSet::from_iter(vec![Tag::new("region:eu")]),
        )
    }

    fn all_messages() -> Vec<DialectMessage> {
        vec![
            DialectMessage::Alias {
                alias: Alias(1),
                subject: sample_subject(),
            },
            DialectMessage::OpenSubscription {
                alias: Alias(1),
                priority_key: Some("A".into()),
                aggregation_interval_ms: 100,
            },
            DialectMessage::OpenSubscription {
                alias: Alias(2),
                priority_key: None,
                aggregation_interval_ms: 0,
            },
            DialectMessage::CloseSubscription { alias: Alias(1) },
            DialectMessage::ResetSubscription { alias: Alias(1) },
            DialectMessage::Signal {
                subject: sample_subject(),
                payload: vec![1, 2, 3],
                expire_at_millis: 123456,
                ordering_group: Some("grp".into()),
                correlation_id: Some(7),
            },
            DialectMessage::Signal {
                subject: sample_subject(),
                payload: vec![],
                expire_at_millis: 0,
                ordering_group: None,
                correlation_id: None,
            },
            DialectMessage::Ping { id: 42 },
            DialectMessage::Pong { id: 42 },
            DialectMessage::StreamStateUpdate {
                alias: Alias(1),
                state: StreamState::String("v1".into()),
            },
            DialectMessage::StreamStateUpdate {
                alias: Alias(1),
                state: StreamState::List {
                    capacity: 3,
                    eviction: EvictionPolicy::FromTail,
                    items: vec![vec![1], vec![2]],
                },
            },
            DialectMessage::StreamStateUpdate {
                alias: Alias(1),
                state: StreamState::DictMap {
                    columns: vec!["a".into(), "b".into()],
                    values: vec![ColumnValue::Int(1), ColumnValue::Bool(true)],
                },
            },
            DialectMessage::StreamStateTransitionUpdate {
                alias: Alias(1),
                transition: StreamStateTransition::SetDelta {
                    base_version: 5,
                    added: vec![vec![9]],
                    removed: vec![],
                },
            },
            DialectMessage::SubscriptionClosed { alias: Alias(3) },
            DialectMessage::ServiceNotAvailable {
                service: ServiceKey::new("svcA"),
            },
            DialectMessage::InvalidRequest { alias: Alias(4) },
            DialectMessage::SignalAckOk {
                correlation_id: 7,
                payload: Some(vec![9, 9]),
            },
            DialectMessage::SignalAckFailed {
                correlation_id: 7,
                payload: None,
            },
        ]
    }

    #[test]
    fn every_message_round_trips_through_encode_one_decode_one() {
        for msg in all_messages() {
            let bytes = encode_one(&msg);
            let decoded = decode_one(bytes).expect("decode");
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn decode_all_consumes_a_batch_of_concatenated_records_in_order() {
        let msgs = all_messages();
        let mut out = BytesMut::new();
        for msg in &msgs {
            encode(&mut out, msg);
        }
        let decoded = decode_all(&mut out).expect("decode");
        assert_eq!(decoded, msgs);
        assert!(out.is_empty());
    }

    #[test]
    fn decode_all_leaves_a_partial_trailing_record_for_the_next_read() {
        let mut out = BytesMut::new();
        encode(&mut out, &DialectMessage::Ping { id: 1 });
        let full_len = out.len();
        encode(&mut out, &DialectMessage::Ping { id: 2 });
        // Truncate so the second record's body is incomplete.
        out.truncate(full_len + 4);
        let decoded = decode_all(&mut out).expect("decode");
        assert_eq!(decoded, vec![DialectMessage::Ping { id: 1 }]);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn unknown_kind_tag_is_a_fatal_decode_error() {
        let mut out = BytesMut::new();
        out.extend_from_slice(&[255u8]);
        let err = decode_one(out.freeze()).unwrap_err();
        assert_eq!(err, CodecError::UnknownMessageKind(255));
    }
}
