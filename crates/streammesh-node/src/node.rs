use crate::config::NodeConfig;
use crate::demo_source::StaticTopicSource;
use crate::fanout_sink::FanOutAggregatorSink;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use streammesh_endpoint::{AggregatorSink, StaticServiceLocationBinding, TopicSource};
use streammesh_types::ServiceKey;
use tracing::info;

/// Everything constructed once at startup and shared by every consumer
/// connection: the location registry and the per-service endpoint fan-out
/// sinks a connection registers its interest with.
pub struct Node {
    pub config: NodeConfig,
    pub location: Arc<StaticServiceLocationBinding>,
    pub sinks: HashMap<ServiceKey, Arc<FanOutAggregatorSink>>,
    pub tick_interval: Duration,
}

impl Node {
    pub fn build(config: NodeConfig, tick_interval: Duration) -> Self {
        let location = Arc::new(StaticServiceLocationBinding::new());
        let mut sinks = HashMap::new();
        for service in &config.services {
            let mut initial_values = HashMap::new();
            for topic in &service.topics {
                initial_values.insert(topic.key(), topic.initial_value.clone());
            }
            let source: Arc<dyn TopicSource> = Arc::new(StaticTopicSource::new(initial_values));
            let sink = Arc::new(FanOutAggregatorSink::new());
            let mailbox = streammesh_endpoint::spawn(source, sink.clone() as Arc<dyn AggregatorSink>);
            info!(service = %service.key(), topics = service.topics.len(), "service endpoint started");
            location.set_binding(service.key(), Some(mailbox));
            sinks.insert(service.key(), sink);
        }
        Self {
            config,
            location,
            sinks,
            tick_interval,
        }
    }
}
