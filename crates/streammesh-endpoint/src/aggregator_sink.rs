use std::fmt;
use streammesh_aggregator::AggregatorMsg;
use streammesh_types::{StreamStateTransition, Subject};
use tokio::sync::mpsc::Sender;
use tracing::warn;

/// The endpoint's view of its bound aggregator: where forwarded transitions
/// and control notifications land. A thin wrapper around the aggregator's
/// own mailbox sender, mirroring how `EndpointHandle` wraps the endpoint's.
pub trait AggregatorSink: Send + Sync + fmt::Debug {
    fn forward_transition(&self, subject: Subject, transition: StreamStateTransition);
    fn forward_subscription_closed(&self, subject: Subject);
    fn forward_invalid_request(&self, subject: Subject);
}

#[derive(Debug, Clone)]
pub struct MailboxAggregatorSink {
    mailbox: Sender<AggregatorMsg>,
}

impl MailboxAggregatorSink {
    pub fn new(mailbox: Sender<AggregatorMsg>) -> Self {
        Self { mailbox }
    }

    fn send(&self, msg: AggregatorMsg) {
        if let Err(err) = self.mailbox.try_send(msg) {
            warn!(%err, "aggregator mailbox full or closed, dropping message");
        }
    }
}

impl AggregatorSink for MailboxAggregatorSink {
    fn forward_transition(&self, subject: Subject, transition: StreamStateTransition) {
        self.send(AggregatorMsg::UpstreamTransition { subject, transition });
    }

    fn forward_subscription_closed(&self, subject: Subject) {
        self.send(AggregatorMsg::UpstreamSubscriptionClosed { subject });
    }

    fn forward_invalid_request(&self, subject: Subject) {
        self.send(AggregatorMsg::UpstreamInvalidRequest { subject });
    }
}
