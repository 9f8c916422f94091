use std::collections::HashMap;
use std::sync::Mutex;
use streammesh_aggregator::AggregatorMsg;
use streammesh_endpoint::AggregatorSink;
use streammesh_types::{StreamStateTransition, Subject};
use tokio::sync::mpsc::Sender;
use tracing::warn;

/// One `StreamEndpoint` is shared by every consumer connection interested in
/// its service; this sink fans each forwarded event out to every connection
/// currently subscribed to the subject it concerns, rather than the single
/// fixed mailbox `AggregatorSink` otherwise assumes.
#[derive(Debug, Default)]
pub struct FanOutAggregatorSink {
    interested: Mutex<HashMap<Subject, Vec<Sender<AggregatorMsg>>>>,
}

impl FanOutAggregatorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, subject: Subject, mailbox: Sender<AggregatorMsg>) {
        self.interested.lock().unwrap().entry(subject).or_default().push(mailbox);
    }

    pub fn unregister(&self, subject: &Subject, mailbox: &Sender<AggregatorMsg>) {
        let mut interested = self.interested.lock().unwrap();
        if let Some(list) = interested.get_mut(subject) {
            list.retain(|m| !m.same_channel(mailbox));
            if list.is_empty() {
                interested.remove(subject);
            }
        }
    }

    fn broadcast(&self, subject: &Subject, msg: impl Fn() -> AggregatorMsg) {
        let interested = self.interested.lock().unwrap();
        let Some(list) = interested.get(subject) else {
            return;
        };
        for mailbox in list {
            if mailbox.try_send(msg()).is_err() {
                warn!(%subject, "aggregator mailbox full or closed, dropping fanned-out message");
            }
        }
    }
}

impl AggregatorSink for FanOutAggregatorSink {
    fn forward_transition(&self, subject: Subject, transition: StreamStateTransition) {
        self.broadcast(&subject, || AggregatorMsg::UpstreamTransition {
            subject: subject.clone(),
            transition: transition.clone(),
        });
    }

    fn forward_subscription_closed(&self, subject: Subject) {
        self.broadcast(&subject, || AggregatorMsg::UpstreamSubscriptionClosed {
            subject: subject.clone(),
        });
    }

    fn forward_invalid_request(&self, subject: Subject) {
        self.broadcast(&subject, || AggregatorMsg::UpstreamInvalidRequest {
            subject: subject.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streammesh_types::{ServiceKey, TagSet, TopicKey};
    use tokio::sync::mpsc;

    fn subj() -> Subject {
        Subject::new(ServiceKey::new("svc"), TopicKey::new("t1"), TagSet::empty())
    }

    #[tokio::test]
    async fn broadcasts_to_every_registered_mailbox() {
        let sink = FanOutAggregatorSink::new();
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        sink.register(subj(), tx1);
        sink.register(subj(), tx2);

        sink.forward_transition(subj(), StreamStateTransition::StringSet("v".into()));

        assert!(matches!(
            rx1.recv().await.unwrap(),
            AggregatorMsg::UpstreamTransition { .. }
        ));
        assert!(matches!(
            rx2.recv().await.unwrap(),
            AggregatorMsg::UpstreamTransition { .. }
        ));
    }

    #[tokio::test]
    async fn unregistering_stops_further_delivery() {
        let sink = FanOutAggregatorSink::new();
        let (tx, mut rx) = mpsc::channel(8);
        sink.register(subj(), tx.clone());
        sink.unregister(&subj(), &tx);

        sink.forward_transition(subj(), StreamStateTransition::StringSet("v".into()));
        assert!(rx.try_recv().is_err());
    }
}
