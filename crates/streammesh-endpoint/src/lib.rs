mod aggregator_sink;
mod endpoint;
mod handle;
mod location;
mod topic_source;

pub use aggregator_sink::{AggregatorSink, MailboxAggregatorSink};
pub use endpoint::{spawn, EndpointMsg, StreamEndpoint};
pub use handle::MailboxEndpointHandle;
pub use location::StaticServiceLocationBinding;
pub use topic_source::{TopicSource, TopicSubscription};
