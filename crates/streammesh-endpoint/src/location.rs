use crate::handle::MailboxEndpointHandle;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use streammesh_aggregator::{AggregatorMsg, SharedEndpointHandle};
use streammesh_futures::stream::variable::Variable;
use streammesh_types::ServiceKey;
use tokio::sync::mpsc::Sender;
use tracing::info;

/// A static, in-process implementation of the `ServiceLocationBinding`
/// contract: bindings are set explicitly (by config or by a test) rather
/// than discovered. One `Variable` per service broadcasts the current
/// binding to every aggregator that has subscribed to it, the same
/// latest-value fan-out `Variable`/`Observer` is used for elsewhere.
#[derive(Debug, Clone, Default)]
pub struct StaticServiceLocationBinding {
    bindings: Arc<Mutex<HashMap<ServiceKey, Variable<Option<SharedEndpointHandle>>>>>,
}

impl StaticServiceLocationBinding {
    pub fn new() -> Self {
        Self::default()
    }

    fn variable_for(&self, service: &ServiceKey) -> Variable<Option<SharedEndpointHandle>> {
        self.bindings
            .lock()
            .unwrap()
            .entry(service.clone())
            .or_insert_with(|| Variable::new(None))
            .clone()
    }

    /// Bind `service` to the endpoint behind `endpoint_mailbox`, or clear the
    /// binding with `None`. Every aggregator subscribed via
    /// [`Self::watch`] observes the change.
    pub fn set_binding(&self, service: ServiceKey, endpoint_mailbox: Option<Sender<crate::endpoint::EndpointMsg>>) {
        let handle = endpoint_mailbox.map(|mailbox| Arc::new(MailboxEndpointHandle::new(mailbox)) as SharedEndpointHandle);
        info!(%service, bound = handle.is_some(), "service location binding changed");
        self.variable_for(&service).set(handle);
    }

    /// Subscribe `aggregator_mailbox` to `service`'s binding changes. The
    /// current value is delivered immediately, then every subsequent
    /// change, for as long as the returned task stays alive.
    pub fn watch(&self, service: ServiceKey, aggregator_mailbox: Sender<AggregatorMsg>) {
        let mut observer = self.variable_for(&service).new_observer();
        tokio::spawn(async move {
            while let Some(endpoint) = observer.next().await {
                let msg = AggregatorMsg::ServiceLocationChanged {
                    service: service.clone(),
                    endpoint,
                };
                if aggregator_mailbox.send(msg).await.is_err() {
                    break;
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streammesh_aggregator::AggregatorMsg;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn watcher_observes_initial_none_then_a_binding() {
        let binding = StaticServiceLocationBinding::new();
        let (tx, mut rx) = mpsc::channel(8);
        binding.watch(ServiceKey::new("svcA"), tx);

        let first = rx.recv().await.unwrap();
        assert!(matches!(
            first,
            AggregatorMsg::ServiceLocationChanged { endpoint: None, .. }
        ));

        let (etx, _erx) = mpsc::channel(8);
        binding.set_binding(ServiceKey::new("svcA"), Some(etx));
        let second = rx.recv().await.unwrap();
        assert!(matches!(
            second,
            AggregatorMsg::ServiceLocationChanged { endpoint: Some(_), .. }
        ));
    }
}
