use crate::bucket::{Bucket, Outbound, PublishOutcome};
use crate::endpoint_handle::SharedEndpointHandle;
use crate::messages::{AggregatorMsg, ConsumerEvent, PendingControlMessage};
use crate::priority_group::PriorityBucketGroup;
use std::collections::{HashMap, VecDeque};
use streammesh_types::{compare_priority_keys, PriorityKey, ServiceKey, Subject};
use tokio::time::Instant;
use tracing::{debug, warn};

/// The consumer-facing multiplexer. Owns every bucket for one consumer
/// connection, tracks downstream/upstream demand and the current
/// `ServiceKey -> endpoint` bindings, and performs priority-fair dispatch.
///
/// Kept free of any `tokio` mailbox/task concerns so its algorithms can be
/// driven and tested synchronously; [`run`] wraps it in the actual actor
/// loop.
#[derive(Debug, Default)]
pub struct AggregatorState {
    stream_to_bucket: HashMap<Subject, Bucket>,
    priority_groups: HashMap<PriorityKey, PriorityBucketGroup>,
    priority_order: Vec<PriorityKey>,
    group_rr_index: usize,
    service_locations: HashMap<ServiceKey, Option<SharedEndpointHandle>>,
    pending_messages: VecDeque<PendingControlMessage>,
    consumer_demand: u64,
}

impl AggregatorState {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn consumer_demand(&self) -> u64 {
        self.consumer_demand
    }

    fn resort_priority_order(&mut self) {
        self.priority_order = self.priority_groups.keys().cloned().collect();
        self.priority_order.sort_by(compare_priority_keys);
        self.group_rr_index = 0;
    }

    fn endpoint_for(&self, service: &ServiceKey) -> Option<&SharedEndpointHandle> {
        self.service_locations.get(service).and_then(|opt| opt.as_ref())
    }

    fn enqueue_control(&mut self, msg: PendingControlMessage) {
        if !self.pending_messages.contains(&msg) {
            self.pending_messages.push_back(msg);
        }
    }

    /// Open (or replace) the subscription for `subject`.
    pub fn open_subscription(
        &mut self,
        subject: Subject,
        priority_key: PriorityKey,
        aggregation_interval_ms: u32,
    ) {
        if self.stream_to_bucket.contains_key(&subject) {
            self.close_subscription_inner(&subject, true);
        }
        self.stream_to_bucket
            .insert(subject.clone(), Bucket::new(priority_key.clone(), aggregation_interval_ms));
        let group = self
            .priority_groups
            .entry(priority_key.clone())
            .or_insert_with(|| PriorityBucketGroup::new(priority_key));
        group.add(subject.clone());
        self.resort_priority_order();

        match self.endpoint_for(&subject.service) {
            Some(endpoint) => {
                endpoint.grant_upstream_demand(1);
                endpoint.open_local_stream_for(subject);
            }
            None => self.enqueue_control(PendingControlMessage::ServiceNotAvailable(subject.service)),
        }
    }

    /// Remove `subject`'s bucket. `notify_endpoint` is `false` when the
    /// removal is driven by the endpoint itself (it already knows).
    fn close_subscription_inner(&mut self, subject: &Subject, notify_endpoint: bool) {
        if let Some(bucket) = self.stream_to_bucket.remove(subject) {
            if let Some(group) = self.priority_groups.get_mut(&bucket.priority_key) {
                if group.remove(subject) {
                    self.priority_groups.remove(&bucket.priority_key);
                }
            }
            self.resort_priority_order();
        }
        if notify_endpoint {
            if let Some(endpoint) = self.endpoint_for(&subject.service) {
                endpoint.close_local_stream_for(subject.clone());
            }
        }
    }

    pub fn close_subscription(&mut self, subject: Subject) {
        self.close_subscription_inner(&subject, true);
        self.enqueue_control(PendingControlMessage::SubscriptionClosed(subject));
    }

    /// Consumer-initiated reset: drop cached state so the next applicable
    /// transition is delivered as a fresh snapshot, and ask the producer for
    /// one.
    pub fn reset_subscription(&mut self, subject: Subject) {
        if let Some(bucket) = self.stream_to_bucket.get_mut(&subject) {
            bucket.clear_state();
        }
        if let Some(endpoint) = self.endpoint_for(&subject.service) {
            endpoint.request_reset(subject);
        }
    }

    pub fn grant_consumer_demand(&mut self, n: u64, now: Instant, out: &mut Vec<ConsumerEvent>) {
        self.consumer_demand = self.consumer_demand.saturating_add(n);
        self.dispatch_loop(now, out);
    }

    /// A transition arrived from an endpoint. Grants one upstream demand
    /// token back immediately and attempts an opportunistic single-bucket
    /// publish so zero-aggregation-interval buckets flush without waiting
    /// for the next tick.
    pub fn upstream_transition(
        &mut self,
        subject: Subject,
        transition: streammesh_types::StreamStateTransition,
        now: Instant,
        out: &mut Vec<ConsumerEvent>,
    ) {
        if let Some(endpoint) = self.endpoint_for(&subject.service) {
            endpoint.grant_upstream_demand(1);
        }
        let Some(bucket) = self.stream_to_bucket.get_mut(&subject) else {
            return;
        };
        bucket.on_new_transition(transition);
        self.try_opportunistic_publish(&subject, now, out);
    }

    fn try_opportunistic_publish(&mut self, subject: &Subject, now: Instant, out: &mut Vec<ConsumerEvent>) {
        let can_update = self.consumer_demand > 0;
        let Some(bucket) = self.stream_to_bucket.get_mut(subject) else {
            return;
        };
        match bucket.publish_pending(now, can_update) {
            Some(PublishOutcome::Update(outbound)) => {
                self.consumer_demand -= 1;
                out.push(to_consumer_event(subject.clone(), outbound));
            }
            Some(PublishOutcome::ResetNeeded) => {
                warn!(%subject, "dropping inapplicable transition, requesting reset");
                bucket.clear_state();
                if let Some(endpoint) = self.endpoint_for(&subject.service) {
                    endpoint.request_reset(subject.clone());
                }
            }
            None => {}
        }
    }

    pub fn upstream_subscription_closed(&mut self, subject: Subject) {
        self.close_subscription_inner(&subject, false);
        self.enqueue_control(PendingControlMessage::SubscriptionClosed(subject));
    }

    pub fn upstream_invalid_request(&mut self, subject: Subject) {
        self.enqueue_control(PendingControlMessage::InvalidRequest(subject));
    }

    pub fn service_location_changed(
        &mut self,
        service: ServiceKey,
        endpoint: Option<SharedEndpointHandle>,
    ) {
        if let Some(Some(old)) = self.service_locations.get(&service) {
            old.close_all_local_streams();
        }
        self.service_locations.insert(service.clone(), endpoint.clone());

        let subjects: Vec<Subject> = self
            .stream_to_bucket
            .keys()
            .filter(|s| s.service == service)
            .cloned()
            .collect();

        match endpoint {
            Some(endpoint) => {
                self.pending_messages
                    .retain(|m| !matches!(m, PendingControlMessage::ServiceNotAvailable(s) if *s == service));
                if !subjects.is_empty() {
                    endpoint.grant_upstream_demand(subjects.len() as u32);
                    endpoint.open_local_streams_for_all(subjects);
                }
            }
            None => {
                self.enqueue_control(PendingControlMessage::ServiceNotAvailable(service));
            }
        }
    }

    pub fn tick(&mut self, now: Instant, out: &mut Vec<ConsumerEvent>) {
        self.dispatch_loop(now, out);
    }

    pub fn shutdown(&mut self) {
        let services: Vec<ServiceKey> = self.service_locations.keys().cloned().collect();
        for service in services {
            if let Some(Some(endpoint)) = self.service_locations.remove(&service) {
                endpoint.close_all_local_streams();
            }
        }
        self.stream_to_bucket.clear();
        self.priority_groups.clear();
        self.priority_order.clear();
        self.pending_messages.clear();
    }

    /// Step 1 (control message drain) + repeated rounds of step 2 (one
    /// attempt per priority group, each group round-robining internally)
    /// until demand is exhausted or a full round makes no progress.
    fn dispatch_loop(&mut self, now: Instant, out: &mut Vec<ConsumerEvent>) {
        while self.consumer_demand > 0 {
            let Some(msg) = self.pending_messages.pop_front() else {
                break;
            };
            self.consumer_demand -= 1;
            out.push(msg.into());
        }

        loop {
            if self.priority_order.is_empty() || self.consumer_demand == 0 {
                break;
            }
            let attempts = self.priority_order.len();
            let mut progressed = false;
            for _ in 0..attempts {
                if self.consumer_demand == 0 {
                    break;
                }
                let group_idx = self.group_rr_index % self.priority_order.len();
                self.group_rr_index = (self.group_rr_index + 1) % self.priority_order.len();
                let priority_key = self.priority_order[group_idx].clone();
                let Some(group) = self.priority_groups.get_mut(&priority_key) else {
                    continue;
                };
                let Some(subject) = group.next_subject() else {
                    continue;
                };
                let before = out.len();
                let reset_needed = {
                    let can_update = self.consumer_demand > 0;
                    match self.stream_to_bucket.get_mut(&subject) {
                        Some(bucket) => match bucket.publish_pending(now, can_update) {
                            Some(PublishOutcome::Update(outbound)) => {
                                self.consumer_demand -= 1;
                                out.push(to_consumer_event(subject.clone(), outbound));
                                false
                            }
                            Some(PublishOutcome::ResetNeeded) => {
                                bucket.clear_state();
                                true
                            }
                            None => false,
                        },
                        None => false,
                    }
                };
                if reset_needed {
                    if let Some(endpoint) = self.endpoint_for(&subject.service) {
                        endpoint.request_reset(subject.clone());
                    }
                    progressed = true;
                }
                if out.len() > before {
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
        debug!(remaining_demand = self.consumer_demand, "dispatch loop settled");
    }

    pub fn handle(&mut self, msg: AggregatorMsg, now: Instant, out: &mut Vec<ConsumerEvent>) {
        match msg {
            AggregatorMsg::OpenSubscription {
                subject,
                priority_key,
                aggregation_interval_ms,
            } => self.open_subscription(subject, priority_key, aggregation_interval_ms),
            AggregatorMsg::CloseSubscription { subject } => self.close_subscription(subject),
            AggregatorMsg::ResetSubscription { subject } => self.reset_subscription(subject),
            AggregatorMsg::ConsumerDemand(n) => self.grant_consumer_demand(n, now, out),
            AggregatorMsg::UpstreamTransition { subject, transition } => {
                self.upstream_transition(subject, transition, now, out)
            }
            AggregatorMsg::UpstreamSubscriptionClosed { subject } => self.upstream_subscription_closed(subject),
            AggregatorMsg::UpstreamInvalidRequest { subject } => self.upstream_invalid_request(subject),
            AggregatorMsg::ServiceLocationChanged { service, endpoint } => {
                self.service_location_changed(service, endpoint)
            }
            AggregatorMsg::Tick => self.tick(now, out),
            AggregatorMsg::Shutdown => self.shutdown(),
        }
    }
}

fn to_consumer_event(subject: Subject, outbound: Outbound) -> ConsumerEvent {
    match outbound {
        Outbound::Snapshot(state) => ConsumerEvent::StreamStateUpdate(subject, state),
        Outbound::Transition(transition) => ConsumerEvent::StreamStateTransitionUpdate(subject, transition),
    }
}

/// The liveness/aggregation-expiry tick period `run` falls back to when the
/// caller doesn't override it via [`run_with_tick_interval`].
pub const DEFAULT_TICK_INTERVAL: std::time::Duration = std::time::Duration::from_millis(200);

/// Runs an [`AggregatorState`] as a single-threaded cooperative unit: one
/// mailbox message at a time, with a 200ms tick as the liveness/aggregation
/// safety net. This is the only place in the crate that touches `tokio`
/// directly.
pub async fn run(
    state: AggregatorState,
    mailbox: tokio::sync::mpsc::Receiver<AggregatorMsg>,
    outbound: tokio::sync::mpsc::UnboundedSender<ConsumerEvent>,
) {
    run_with_tick_interval(state, mailbox, outbound, DEFAULT_TICK_INTERVAL).await
}

/// Same as [`run`], but with a caller-supplied tick period (the node crate's
/// `--tick-interval-ms` wires up here).
pub async fn run_with_tick_interval(
    mut state: AggregatorState,
    mut mailbox: tokio::sync::mpsc::Receiver<AggregatorMsg>,
    outbound: tokio::sync::mpsc::UnboundedSender<ConsumerEvent>,
    tick_interval: std::time::Duration,
) {
    let mut ticker = tokio::time::interval(tick_interval);
    loop {
        let mut out = Vec::new();
        tokio::select! {
            msg = mailbox.recv() => {
                match msg {
                    Some(AggregatorMsg::Shutdown) => {
                        state.shutdown();
                        break;
                    }
                    Some(msg) => state.handle(msg, Instant::now(), &mut out),
                    None => {
                        state.shutdown();
                        break;
                    }
                }
            }
            _ = ticker.tick() => {
                state.tick(Instant::now(), &mut out);
            }
        }
        for event in out {
            if outbound.send(event).is_err() {
                debug!("consumer disconnected, shutting aggregator down");
                state.shutdown();
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint_handle::EndpointHandle;
    use std::sync::{Arc, Mutex};
    use streammesh_types::{ServiceKey, StreamState, StreamStateTransition, TagSet, TopicKey};

    #[derive(Debug, Default)]
    struct RecordingEndpoint {
        opened: Mutex<Vec<Subject>>,
        closed: Mutex<Vec<Subject>>,
        reset: Mutex<Vec<Subject>>,
        closed_all: Mutex<u32>,
        granted: Mutex<u32>,
    }

    impl EndpointHandle for RecordingEndpoint {
        fn open_local_stream_for(&self, subject: Subject) {
            self.opened.lock().unwrap().push(subject);
        }
        fn close_local_stream_for(&self, subject: Subject) {
            self.closed.lock().unwrap().push(subject);
        }
        fn open_local_streams_for_all(&self, subjects: Vec<Subject>) {
            self.opened.lock().unwrap().extend(subjects);
        }
        fn close_all_local_streams(&self) {
            *self.closed_all.lock().unwrap() += 1;
        }
        fn request_reset(&self, subject: Subject) {
            self.reset.lock().unwrap().push(subject);
        }
        fn grant_upstream_demand(&self, tokens: u32) {
            *self.granted.lock().unwrap() += tokens;
        }
    }

    fn subj(service: &str, topic: &str) -> Subject {
        Subject::new(ServiceKey::new(service), TopicKey::new(topic), TagSet::empty())
    }

    fn now() -> Instant {
        Instant::now()
    }

    #[test]
    fn s1_single_subject_happy_path() {
        let mut agg = AggregatorState::new();
        let endpoint: SharedEndpointHandle = Arc::new(RecordingEndpoint::default());
        agg.service_location_changed(ServiceKey::new("svcA"), Some(endpoint));
        agg.open_subscription(subj("svcA", "t1"), None, 0);

        let mut out = Vec::new();
        agg.grant_consumer_demand(3, now(), &mut out);
        assert!(out.is_empty());

        let s = subj("svcA", "t1");
        agg.upstream_transition(s.clone(), StreamStateTransition::StringSet("v1".into()), now(), &mut out);
        agg.upstream_transition(s.clone(), StreamStateTransition::StringSet("v2".into()), now(), &mut out);
        agg.upstream_transition(s.clone(), StreamStateTransition::StringSet("v3".into()), now(), &mut out);

        assert_eq!(
            out,
            vec![
                ConsumerEvent::StreamStateUpdate(s.clone(), StreamState::String("v1".into())),
                ConsumerEvent::StreamStateTransitionUpdate(s.clone(), StreamStateTransition::StringSet("v2".into())),
                ConsumerEvent::StreamStateTransitionUpdate(s, StreamStateTransition::StringSet("v3".into())),
            ]
        );
    }

    #[test]
    fn s3_priority_fairness_round_robins_groups_and_buckets() {
        let mut agg = AggregatorState::new();
        let endpoint: SharedEndpointHandle = Arc::new(RecordingEndpoint::default());
        agg.service_location_changed(ServiceKey::new("svc"), Some(endpoint));

        let a0 = subj("svc", "a0");
        let a1 = subj("svc", "a1");
        let b0 = subj("svc", "b0");
        let b1 = subj("svc", "b1");
        agg.open_subscription(a0.clone(), Some("A".into()), 0);
        agg.open_subscription(a1.clone(), Some("A".into()), 0);
        agg.open_subscription(b0.clone(), Some("B".into()), 0);
        agg.open_subscription(b1.clone(), Some("B".into()), 0);

        // Queue pending transitions without demand so they sit as pending.
        let mut scratch = Vec::new();
        for s in [&a0, &a1, &b0, &b1] {
            agg.upstream_transition(s.clone(), StreamStateTransition::StringSet("v".into()), now(), &mut scratch);
        }
        assert!(scratch.is_empty());

        let mut out = Vec::new();
        agg.grant_consumer_demand(4, now(), &mut out);
        let subjects: Vec<_> = out
            .into_iter()
            .map(|e| match e {
                ConsumerEvent::StreamStateUpdate(s, _) => s,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(subjects, vec![a0, b0, a1, b1]);
    }

    #[test]
    fn s4_binding_change_notifies_service_not_available_then_rebinds() {
        let mut agg = AggregatorState::new();
        let s = subj("svcA", "t1");
        agg.open_subscription(s.clone(), None, 0);

        let mut out = Vec::new();
        agg.grant_consumer_demand(1, now(), &mut out);
        assert_eq!(out, vec![ConsumerEvent::ServiceNotAvailable(ServiceKey::new("svcA"))]);

        let loc1 = Arc::new(RecordingEndpoint::default());
        agg.service_location_changed(ServiceKey::new("svcA"), Some(loc1.clone() as SharedEndpointHandle));
        assert_eq!(loc1.opened.lock().unwrap().as_slice(), &[s.clone()]);

        let loc2 = Arc::new(RecordingEndpoint::default());
        agg.service_location_changed(ServiceKey::new("svcA"), Some(loc2.clone() as SharedEndpointHandle));
        assert_eq!(*loc1.closed_all.lock().unwrap(), 1);
        assert_eq!(loc2.opened.lock().unwrap().as_slice(), &[s]);
    }

    #[test]
    fn s5_inapplicable_delta_triggers_reset_and_only_snapshot_is_observed() {
        let mut agg = AggregatorState::new();
        let endpoint = Arc::new(RecordingEndpoint::default());
        agg.service_location_changed(ServiceKey::new("svc"), Some(endpoint.clone() as SharedEndpointHandle));
        let s = subj("svc", "t1");
        agg.open_subscription(s.clone(), None, 0);

        let mut out = Vec::new();
        agg.grant_consumer_demand(10, now(), &mut out);
        agg.upstream_transition(
            s.clone(),
            StreamStateTransition::SetSnapshot {
                version: 3,
                elements: vec![],
                partial_updates: true,
            },
            now(),
            &mut out,
        );
        agg.upstream_transition(
            s.clone(),
            StreamStateTransition::SetDelta {
                base_version: 5,
                added: vec![],
                removed: vec![],
            },
            now(),
            &mut out,
        );

        assert_eq!(endpoint.reset.lock().unwrap().as_slice(), &[s.clone()]);
        assert_eq!(
            out,
            vec![ConsumerEvent::StreamStateUpdate(
                s,
                StreamState::Set {
                    version: 3,
                    elements: vec![],
                    partial_updates: true,
                }
            )]
        );
    }

    #[test]
    fn boundary_empty_priority_groups_is_a_no_op() {
        let mut agg = AggregatorState::new();
        let mut out = Vec::new();
        agg.tick(now(), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn reopening_a_subject_replaces_the_prior_bucket() {
        let mut agg = AggregatorState::new();
        let s = subj("svc", "t1");
        agg.open_subscription(s.clone(), Some("A".into()), 0);
        agg.open_subscription(s.clone(), Some("A".into()), 0);
        assert_eq!(agg.priority_groups.get(&Some("A".into())).unwrap().len(), 1);
    }

    #[test]
    fn opening_a_second_subject_on_an_already_bound_service_grants_its_own_demand() {
        let mut agg = AggregatorState::new();
        let endpoint = Arc::new(RecordingEndpoint::default());
        agg.service_location_changed(ServiceKey::new("svc"), Some(endpoint.clone() as SharedEndpointHandle));
        assert_eq!(*endpoint.granted.lock().unwrap(), 0);

        agg.open_subscription(subj("svc", "t1"), None, 0);
        assert_eq!(*endpoint.granted.lock().unwrap(), 1);

        agg.open_subscription(subj("svc", "t2"), None, 0);
        assert_eq!(*endpoint.granted.lock().unwrap(), 2);
    }
}
