use std::fmt;
use streammesh_types::{StreamStateTransition, Subject};
use tokio::sync::mpsc::UnboundedSender;

/// The seam between the dispatch core and an in-process service's topic
/// streams. Implementations (the sample services, out of scope here) own
/// the actual state and push transitions through the sender handed to them
/// at subscribe time.
///
/// Contract: the first transition sent after `subscribe` is called MUST be
/// snapshot-shaped (`StreamStateTransition::is_snapshot() == true`) so the
/// endpoint never needs to synthesise one.
pub trait TopicSource: Send + Sync + fmt::Debug {
    fn subscribe(&self, subject: Subject, sink: UnboundedSender<StreamStateTransition>) -> TopicSubscription;
}

/// Cancellation handle for a `TopicSource::subscribe` call. Dropping it (or
/// calling `cancel` explicitly) must stop further sends on the associated
/// sink.
pub struct TopicSubscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TopicSubscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn noop() -> Self {
        Self { cancel: None }
    }

    pub fn cancel(mut self) {
        if let Some(f) = self.cancel.take() {
            f();
        }
    }
}

impl fmt::Debug for TopicSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicSubscription").finish()
    }
}
