use crate::endpoint_handle::SharedEndpointHandle;
use streammesh_types::{PriorityKey, ServiceKey, StreamState, StreamStateTransition, Subject};

/// Inbound mailbox messages the aggregator actor processes one at a time.
#[derive(Debug)]
pub enum AggregatorMsg {
    /// Downstream consumer opened a subscription.
    OpenSubscription {
        subject: Subject,
        priority_key: PriorityKey,
        aggregation_interval_ms: u32,
    },
    /// Downstream consumer closed a subscription.
    CloseSubscription { subject: Subject },
    /// Downstream consumer asked for a full-state refresh.
    ResetSubscription { subject: Subject },
    /// Downstream consumer granted `n` additional demand tokens.
    ConsumerDemand(u64),
    /// An endpoint forwarded a transition for `subject`.
    UpstreamTransition {
        subject: Subject,
        transition: StreamStateTransition,
    },
    /// An endpoint closed the stream backing `subject`.
    UpstreamSubscriptionClosed { subject: Subject },
    /// An endpoint rejected the request for `subject`.
    UpstreamInvalidRequest { subject: Subject },
    /// The location registry changed the binding for `service`.
    ServiceLocationChanged {
        service: ServiceKey,
        endpoint: Option<SharedEndpointHandle>,
    },
    /// Periodic liveness/aggregation-expiry tick; also fired manually by
    /// tests that want deterministic dispatch without waiting on the clock.
    Tick,
    /// Consumer connection is gone; tear everything down.
    Shutdown,
}

/// Outbound, subject-addressed events. Alias translation happens at the
/// outer wire-transport boundary, not here.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsumerEvent {
    StreamStateUpdate(Subject, StreamState),
    StreamStateTransitionUpdate(Subject, StreamStateTransition),
    SubscriptionClosed(Subject),
    ServiceNotAvailable(ServiceKey),
    InvalidRequest(Subject),
}

/// A control message queued for FIFO delivery once downstream demand is
/// available; kept distinct from `ConsumerEvent` so `pendingMessages` can be
/// deduped without touching data-path events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingControlMessage {
    ServiceNotAvailable(ServiceKey),
    InvalidRequest(Subject),
    SubscriptionClosed(Subject),
}

impl From<PendingControlMessage> for ConsumerEvent {
    fn from(msg: PendingControlMessage) -> Self {
        match msg {
            PendingControlMessage::ServiceNotAvailable(svc) => ConsumerEvent::ServiceNotAvailable(svc),
            PendingControlMessage::InvalidRequest(subj) => ConsumerEvent::InvalidRequest(subj),
            PendingControlMessage::SubscriptionClosed(subj) => ConsumerEvent::SubscriptionClosed(subj),
        }
    }
}
