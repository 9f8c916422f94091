use crate::aggregator_sink::AggregatorSink;
use crate::topic_source::{TopicSource, TopicSubscription};
use std::collections::HashMap;
use std::sync::Arc;
use streammesh_types::{StreamStateTransition, Subject};
use tokio::sync::mpsc;
use tracing::debug;

/// Messages a `StreamEndpoint` accepts: the aggregator-facing contract of
/// component G, plus an internal loopback variant used to receive
/// transitions pushed by a `TopicSource`.
#[derive(Debug)]
pub enum EndpointMsg {
    OpenLocalStreamFor(Subject),
    CloseLocalStreamFor(Subject),
    OpenLocalStreamsForAll(Vec<Subject>),
    CloseAllLocalStreams,
    RequestReset(Subject),
    GrantUpstreamDemand(u32),
    Shutdown,
}

enum Internal {
    FromAggregator(EndpointMsg),
    FromTopic(Subject, StreamStateTransition),
}

/// Producer-side per-service hub. Subscribes to the in-process service's
/// topics on demand and forwards transitions to the bound aggregator,
/// respecting the outstanding upstream demand token count.
pub struct StreamEndpoint {
    source: Arc<dyn TopicSource>,
    sink: Arc<dyn AggregatorSink>,
    subscriptions: HashMap<Subject, TopicSubscription>,
    demand_tokens: u32,
    topic_tx: mpsc::UnboundedSender<(Subject, StreamStateTransition)>,
}

impl StreamEndpoint {
    fn subscribe(&mut self, subject: Subject) {
        if self.subscriptions.contains_key(&subject) {
            return;
        }
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = self.source.subscribe(subject.clone(), tx);
        self.subscriptions.insert(subject.clone(), handle);
        let forward = self.topic_tx.clone();
        tokio::spawn(async move {
            while let Some(transition) = rx.recv().await {
                if forward.send((subject.clone(), transition)).is_err() {
                    break;
                }
            }
        });
    }

    fn unsubscribe(&mut self, subject: &Subject) {
        if let Some(sub) = self.subscriptions.remove(subject) {
            sub.cancel();
        }
    }

    fn handle(&mut self, msg: EndpointMsg) -> bool {
        match msg {
            EndpointMsg::OpenLocalStreamFor(subject) => {
                self.subscribe(subject);
            }
            EndpointMsg::CloseLocalStreamFor(subject) => {
                self.unsubscribe(&subject);
            }
            EndpointMsg::OpenLocalStreamsForAll(subjects) => {
                for subject in subjects {
                    self.subscribe(subject);
                }
            }
            EndpointMsg::CloseAllLocalStreams => {
                let subjects: Vec<Subject> = self.subscriptions.keys().cloned().collect();
                for subject in subjects {
                    self.unsubscribe(&subject);
                }
            }
            EndpointMsg::RequestReset(subject) => {
                // Cancel and resubscribe so the source's snapshot-first
                // contract gives us a fresh snapshot.
                self.unsubscribe(&subject);
                self.subscribe(subject);
            }
            EndpointMsg::GrantUpstreamDemand(tokens) => {
                self.demand_tokens = self.demand_tokens.saturating_add(tokens);
            }
            EndpointMsg::Shutdown => return true,
        }
        false
    }

    fn on_topic_transition(&mut self, subject: Subject, transition: StreamStateTransition) {
        if !self.subscriptions.contains_key(&subject) {
            return;
        }
        if self.demand_tokens == 0 {
            debug!(%subject, "no upstream demand outstanding, dropping transition");
            return;
        }
        self.demand_tokens -= 1;
        self.sink.forward_transition(subject, transition);
    }
}

/// Spawns a `StreamEndpoint` as a single-threaded cooperative unit and
/// returns the sender side of its mailbox.
pub fn spawn(source: Arc<dyn TopicSource>, sink: Arc<dyn AggregatorSink>) -> mpsc::Sender<EndpointMsg> {
    let (tx, rx) = mpsc::channel(64);
    let (topic_tx, topic_rx) = mpsc::unbounded_channel();
    let endpoint = StreamEndpoint {
        source,
        sink,
        subscriptions: HashMap::new(),
        demand_tokens: 0,
        topic_tx,
    };
    tokio::spawn(run(endpoint, rx, topic_rx));
    tx
}

async fn run(
    mut endpoint: StreamEndpoint,
    mut mailbox: mpsc::Receiver<EndpointMsg>,
    mut topic_rx: mpsc::UnboundedReceiver<(Subject, StreamStateTransition)>,
) {
    loop {
        let next = tokio::select! {
            msg = mailbox.recv() => msg.map(Internal::FromAggregator),
            item = topic_rx.recv() => item.map(|(s, t)| Internal::FromTopic(s, t)),
        };
        match next {
            Some(Internal::FromAggregator(msg)) => {
                if endpoint.handle(msg) {
                    break;
                }
            }
            Some(Internal::FromTopic(subject, transition)) => {
                endpoint.on_topic_transition(subject, transition);
            }
            None => break,
        }
    }
}
