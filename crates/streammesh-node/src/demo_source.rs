use std::collections::HashMap;
use streammesh_endpoint::{TopicSource, TopicSubscription};
use streammesh_types::{StreamStateTransition, Subject, TopicKey};
use tokio::sync::mpsc::UnboundedSender;

/// A `TopicSource` that has nothing behind it but the values from config: on
/// `subscribe` it immediately emits a one-shot string snapshot for a known
/// topic and otherwise never sends anything again. Stands in for the actual
/// per-service data sources, which are out of scope for this core.
#[derive(Debug, Default)]
pub struct StaticTopicSource {
    initial_values: HashMap<TopicKey, String>,
}

impl StaticTopicSource {
    pub fn new(initial_values: HashMap<TopicKey, String>) -> Self {
        Self { initial_values }
    }
}

impl TopicSource for StaticTopicSource {
    fn subscribe(&self, subject: Subject, sink: UnboundedSender<StreamStateTransition>) -> TopicSubscription {
        let value = self.initial_values.get(&subject.topic).cloned().unwrap_or_default();
        let _ = sink.send(StreamStateTransition::StringSet(value));
        TopicSubscription::noop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streammesh_types::{ServiceKey, TagSet};
    use tokio::sync::mpsc;

    #[test]
    fn subscribe_emits_a_single_snapshot_and_then_nothing() {
        let mut values = HashMap::new();
        values.insert(TopicKey::new("t1"), "hello".to_string());
        let source = StaticTopicSource::new(values);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subject = Subject::new(ServiceKey::new("svc"), TopicKey::new("t1"), TagSet::empty());
        let _sub = source.subscribe(subject, tx);
        assert_eq!(rx.try_recv().unwrap(), StreamStateTransition::StringSet("hello".to_string()));
        assert!(rx.try_recv().is_err());
    }
}
