//! Core data model for the subscription-stream dispatch core: subjects,
//! aliases, priority ordering and the `StreamState`/`StreamStateTransition`
//! algebra shared by the codec, the aggregator and the endpoint crates.

mod state;
mod subject;

pub use state::{dict_map_from_sorted, ColumnValue, Element, EvictionPolicy, StreamState, StreamStateTransition};
pub use subject::{
    compare_priority_keys, Alias, PriorityKey, ServiceKey, Subject, Tag, TagSet, TagSetKey, TopicKey,
};
