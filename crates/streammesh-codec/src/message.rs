use streammesh_types::{Alias, ServiceKey, StreamState, StreamStateTransition, Subject};

/// A correlation id attached to a `Signal` so its ack can be matched back up.
pub type CorrelationId = u64;

/// One record of the binary dialect. Every variant round-trips through
/// [`crate::encode`]/[`crate::decode_all`] unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum DialectMessage {
    /// C→S: register `alias` to stand in for `subject` on this connection.
    Alias { alias: Alias, subject: Subject },
    /// C→S: open a subscription for an already-registered alias.
    OpenSubscription {
        alias: Alias,
        priority_key: Option<String>,
        aggregation_interval_ms: u32,
    },
    /// C→S: close a previously opened subscription.
    CloseSubscription { alias: Alias },
    /// C→S: request a full snapshot be redelivered for this alias.
    ResetSubscription { alias: Alias },
    /// C→S: fire-and-forget (optionally acked) RPC targeting a subject.
    Signal {
        subject: Subject,
        payload: Vec<u8>,
        expire_at_millis: u64,
        ordering_group: Option<String>,
        correlation_id: Option<CorrelationId>,
    },
    /// Either direction: liveness probe.
    Ping { id: u64 },
    /// Either direction: liveness reply, must echo the `Ping`'s id.
    Pong { id: u64 },
    /// S→C: full-state snapshot for `alias`.
    StreamStateUpdate { alias: Alias, state: StreamState },
    /// S→C: incremental delta for `alias`.
    StreamStateTransitionUpdate {
        alias: Alias,
        transition: StreamStateTransition,
    },
    /// S→C: the producer closed the stream backing `alias`.
    SubscriptionClosed { alias: Alias },
    /// S→C: no binding currently exists for `service`.
    ServiceNotAvailable { service: ServiceKey },
    /// S→C: the producer rejected the request for `alias`.
    InvalidRequest { alias: Alias },
    /// S→C: a `Signal` was accepted.
    SignalAckOk {
        correlation_id: CorrelationId,
        payload: Option<Vec<u8>>,
    },
    /// S→C: a `Signal` was rejected.
    SignalAckFailed {
        correlation_id: CorrelationId,
        payload: Option<Vec<u8>>,
    },
}

impl DialectMessage {
    pub(crate) fn kind_tag(&self) -> u8 {
        match self {
            DialectMessage::Alias { .. } => 0,
            DialectMessage::OpenSubscription { .. } => 1,
            DialectMessage::CloseSubscription { .. } => 2,
            DialectMessage::ResetSubscription { .. } => 3,
            DialectMessage::Signal { .. } => 4,
            DialectMessage::Ping { .. } => 5,
            DialectMessage::Pong { .. } => 6,
            DialectMessage::StreamStateUpdate { .. } => 7,
            DialectMessage::StreamStateTransitionUpdate { .. } => 8,
            DialectMessage::SubscriptionClosed { .. } => 9,
            DialectMessage::ServiceNotAvailable { .. } => 10,
            DialectMessage::InvalidRequest { .. } => 11,
            DialectMessage::SignalAckOk { .. } => 12,
            DialectMessage::SignalAckFailed { .. } => 13,
        }
    }
}
