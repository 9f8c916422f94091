use crate::alias_registry::AliasRegistry;
use crate::node::Node;
use bytes::BytesMut;
use futures::{FutureExt, SinkExt, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use streammesh_aggregator::{AggregatorMsg, AggregatorState, ConsumerEvent};
use streammesh_codec::DialectMessage;
use streammesh_types::{ServiceKey, Subject};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, warn};
use warp::filters::ws::{Message, WebSocket};

/// Drives one consumer connection end to end: owns the alias registry, the
/// per-connection `AggregatorState` actor, and the translation between wire
/// `DialectMessage`s and the dispatch core's `Subject`-addressed messages.
///
/// Downstream demand is granted once, unbounded, at connection start: the
/// wire dialect has no consumer-demand message, so flow control here comes
/// from the bounded mailboxes and the WebSocket's own TCP backpressure
/// rather than from an explicit protocol-level credit scheme.
pub async fn handle_connection(ws: WebSocket, node: Arc<Node>) {
    let (ws_tx, mut ws_rx) = ws.split();
    let (send_tx, send_rx) = mpsc::unbounded_channel::<Message>();
    tokio::spawn(UnboundedReceiverStream::new(send_rx).map(Ok).forward(ws_tx).map(|_| ()));

    let (agg_tx, agg_rx) = mpsc::channel::<AggregatorMsg>(256);
    let (consumer_tx, mut consumer_rx) = mpsc::unbounded_channel::<ConsumerEvent>();
    tokio::spawn(streammesh_aggregator::run_with_tick_interval(
        AggregatorState::new(),
        agg_rx,
        consumer_tx,
        node.tick_interval,
    ));
    let _ = agg_tx.send(AggregatorMsg::ConsumerDemand(u64::MAX)).await;

    let mut registry = AliasRegistry::new();
    let mut watched_services: HashSet<ServiceKey> = HashSet::new();
    let mut open_subjects: HashSet<Subject> = HashSet::new();
    let mut buf = BytesMut::new();

    loop {
        tokio::select! {
            ws_msg = ws_rx.next() => {
                match ws_msg {
                    Some(Ok(msg)) => {
                        if msg.is_close() {
                            break;
                        }
                        if msg.is_ping() || msg.is_pong() {
                            continue;
                        }
                        if !msg.is_binary() {
                            warn!("received a non-binary websocket frame, closing connection");
                            break;
                        }
                        buf.extend_from_slice(msg.as_bytes());
                        match streammesh_codec::decode_all(&mut buf) {
                            Ok(messages) => {
                                for inbound in messages {
                                    handle_inbound(
                                        inbound,
                                        &node,
                                        &mut registry,
                                        &agg_tx,
                                        &mut watched_services,
                                        &mut open_subjects,
                                        &send_tx,
                                    )
                                    .await;
                                }
                            }
                            Err(err) => {
                                warn!(%err, "wire decode error, closing connection");
                                break;
                            }
                        }
                    }
                    Some(Err(err)) => {
                        warn!(%err, "websocket transport error");
                        break;
                    }
                    None => break,
                }
            }
            event = consumer_rx.recv() => {
                match event {
                    Some(event) => {
                        if let Some(wire) = translate_outbound(event, &registry) {
                            send_wire(&send_tx, &wire);
                        }
                    }
                    None => break,
                }
            }
        }
    }

    let _ = agg_tx.send(AggregatorMsg::Shutdown).await;
    for subject in &open_subjects {
        if let Some(sink) = node.sinks.get(&subject.service) {
            sink.unregister(subject, &agg_tx);
        }
    }
    debug!("connection closed");
}

#[allow(clippy::too_many_arguments)]
async fn handle_inbound(
    msg: DialectMessage,
    node: &Node,
    registry: &mut AliasRegistry,
    agg_tx: &mpsc::Sender<AggregatorMsg>,
    watched_services: &mut HashSet<ServiceKey>,
    open_subjects: &mut HashSet<Subject>,
    send_tx: &mpsc::UnboundedSender<Message>,
) {
    match msg {
        DialectMessage::Alias { alias, subject } => {
            if !registry.bind(alias, subject) {
                send_wire(send_tx, &DialectMessage::InvalidRequest { alias });
            }
        }
        DialectMessage::OpenSubscription {
            alias,
            priority_key,
            aggregation_interval_ms,
        } => {
            let Some(subject) = registry.subject_for(alias).cloned() else {
                send_wire(send_tx, &DialectMessage::InvalidRequest { alias });
                return;
            };
            if watched_services.insert(subject.service.clone()) {
                node.location.watch(subject.service.clone(), agg_tx.clone());
            }
            if let Some(sink) = node.sinks.get(&subject.service) {
                sink.register(subject.clone(), agg_tx.clone());
            }
            open_subjects.insert(subject.clone());
            let _ = agg_tx
                .send(AggregatorMsg::OpenSubscription {
                    subject,
                    priority_key,
                    aggregation_interval_ms,
                })
                .await;
        }
        DialectMessage::CloseSubscription { alias } => {
            let Some(subject) = registry.subject_for(alias).cloned() else {
                send_wire(send_tx, &DialectMessage::InvalidRequest { alias });
                return;
            };
            if let Some(sink) = node.sinks.get(&subject.service) {
                sink.unregister(&subject, agg_tx);
            }
            open_subjects.remove(&subject);
            let _ = agg_tx.send(AggregatorMsg::CloseSubscription { subject }).await;
        }
        DialectMessage::ResetSubscription { alias } => {
            let Some(subject) = registry.subject_for(alias).cloned() else {
                send_wire(send_tx, &DialectMessage::InvalidRequest { alias });
                return;
            };
            let _ = agg_tx.send(AggregatorMsg::ResetSubscription { subject }).await;
        }
        DialectMessage::Ping { id } => {
            send_wire(send_tx, &DialectMessage::Pong { id });
        }
        DialectMessage::Signal { subject, .. } => {
            debug!(%subject, "ignoring signal: the producer write path is out of scope");
        }
        other => {
            debug!(?other, "ignoring a server-direction message sent by the client");
        }
    }
}

fn translate_outbound(event: ConsumerEvent, registry: &AliasRegistry) -> Option<DialectMessage> {
    match event {
        ConsumerEvent::StreamStateUpdate(subject, state) => {
            let alias = registry.alias_for(&subject)?;
            Some(DialectMessage::StreamStateUpdate { alias, state })
        }
        ConsumerEvent::StreamStateTransitionUpdate(subject, transition) => {
            let alias = registry.alias_for(&subject)?;
            Some(DialectMessage::StreamStateTransitionUpdate { alias, transition })
        }
        ConsumerEvent::SubscriptionClosed(subject) => {
            let alias = registry.alias_for(&subject)?;
            Some(DialectMessage::SubscriptionClosed { alias })
        }
        ConsumerEvent::ServiceNotAvailable(service) => Some(DialectMessage::ServiceNotAvailable { service }),
        ConsumerEvent::InvalidRequest(subject) => {
            let alias = registry.alias_for(&subject)?;
            Some(DialectMessage::InvalidRequest { alias })
        }
    }
}

fn send_wire(send_tx: &mpsc::UnboundedSender<Message>, msg: &DialectMessage) {
    let bytes = streammesh_codec::encode_one(msg);
    if send_tx.send(Message::binary(bytes.to_vec())).is_err() {
        debug!("outbound channel closed, consumer already gone");
    }
}
