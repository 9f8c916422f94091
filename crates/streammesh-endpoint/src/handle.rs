use crate::endpoint::EndpointMsg;
use std::fmt;
use streammesh_aggregator::EndpointHandle;
use streammesh_types::Subject;
use tokio::sync::mpsc::Sender;
use tracing::warn;

/// The aggregator's handle onto a running `StreamEndpoint`: a thin wrapper
/// around its mailbox sender.
#[derive(Clone)]
pub struct MailboxEndpointHandle {
    mailbox: Sender<EndpointMsg>,
}

impl MailboxEndpointHandle {
    pub fn new(mailbox: Sender<EndpointMsg>) -> Self {
        Self { mailbox }
    }

    fn send(&self, msg: EndpointMsg) {
        if let Err(err) = self.mailbox.try_send(msg) {
            warn!(%err, "endpoint mailbox full or closed, dropping message");
        }
    }
}

impl fmt::Debug for MailboxEndpointHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailboxEndpointHandle").finish()
    }
}

impl EndpointHandle for MailboxEndpointHandle {
    fn open_local_stream_for(&self, subject: Subject) {
        self.send(EndpointMsg::OpenLocalStreamFor(subject));
    }

    fn close_local_stream_for(&self, subject: Subject) {
        self.send(EndpointMsg::CloseLocalStreamFor(subject));
    }

    fn open_local_streams_for_all(&self, subjects: Vec<Subject>) {
        self.send(EndpointMsg::OpenLocalStreamsForAll(subjects));
    }

    fn close_all_local_streams(&self) {
        self.send(EndpointMsg::CloseAllLocalStreams);
    }

    fn request_reset(&self, subject: Subject) {
        self.send(EndpointMsg::RequestReset(subject));
    }

    fn grant_upstream_demand(&self, tokens: u32) {
        self.send(EndpointMsg::GrantUpstreamDemand(tokens));
    }
}
