//! The per-consumer Stream Aggregator: subscription lifecycle, demand
//! tracking, per-subscription coalescing and priority-fair dispatch.

mod aggregator;
mod bucket;
mod endpoint_handle;
mod messages;
mod priority_group;

pub use aggregator::{run, run_with_tick_interval, AggregatorState, DEFAULT_TICK_INTERVAL};
pub use bucket::{Bucket, Outbound, PublishOutcome};
pub use endpoint_handle::{EndpointHandle, SharedEndpointHandle};
pub use messages::{AggregatorMsg, ConsumerEvent, PendingControlMessage};
pub use priority_group::PriorityBucketGroup;
