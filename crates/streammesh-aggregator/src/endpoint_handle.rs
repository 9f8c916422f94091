use std::fmt;
use streammesh_types::Subject;

/// The aggregator's view of a remote `StreamEndpoint` binding — an opaque,
/// cloneable address the aggregator uses to ask a producer-side hub to open
/// or close local streams and to grant it upstream demand. Implemented by
/// `streammesh-endpoint` as a thin wrapper around that endpoint's mailbox.
pub trait EndpointHandle: Send + Sync + fmt::Debug {
    fn open_local_stream_for(&self, subject: Subject);
    fn close_local_stream_for(&self, subject: Subject);
    fn open_local_streams_for_all(&self, subjects: Vec<Subject>);
    fn close_all_local_streams(&self);
    /// Ask the endpoint to treat its next forward for `subject` as if the
    /// stream had just been (re)opened, i.e. send a fresh snapshot.
    fn request_reset(&self, subject: Subject);
    /// Grant `tokens` additional upstream demand tokens.
    fn grant_upstream_demand(&self, tokens: u32);
}

pub type SharedEndpointHandle = std::sync::Arc<dyn EndpointHandle>;
