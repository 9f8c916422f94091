use std::time::Duration;
use streammesh_types::{PriorityKey, StreamState, StreamStateTransition};
use tokio::time::Instant;

/// What a successful [`Bucket::publish_pending`] hands back to the caller:
/// either a full snapshot (first delivery, or after a reset) or a delta.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Snapshot(StreamState),
    Transition(StreamStateTransition),
}

/// Result of one publish attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    /// A message should be delivered downstream.
    Update(Outbound),
    /// The pending transition did not apply to the cached state; it was
    /// dropped and a reset should be requested from the producer.
    ResetNeeded,
}

/// Per-subscription coalescing buffer. Holds the last state the consumer is
/// known to have (`state`), and at most one not-yet-delivered transition
/// (`pending`) — later transitions simply replace earlier, undelivered ones.
#[derive(Debug)]
pub struct Bucket {
    pub priority_key: PriorityKey,
    aggregation_interval: Duration,
    state: Option<StreamState>,
    pending: Option<StreamStateTransition>,
    last_published_at: Option<Instant>,
}

impl Bucket {
    pub fn new(priority_key: PriorityKey, aggregation_interval_ms: u32) -> Self {
        Self {
            priority_key,
            aggregation_interval: Duration::from_millis(aggregation_interval_ms as u64),
            state: None,
            pending: None,
            last_published_at: None,
        }
    }

    /// Coalesce a newly arrived transition into the pending slot. Overwrites
    /// any previously buffered, not-yet-delivered transition — only the most
    /// recent one is ever retained, which is what makes this a latest-wins
    /// coalescing buffer rather than a queue.
    pub fn on_new_transition(&mut self, transition: StreamStateTransition) {
        self.pending = Some(transition);
    }

    /// Whether `publish_pending` is willing to fold `pending` into `state`
    /// right now, independent of whether there is anything pending.
    fn aggregation_criteria_met(&self, now: Instant) -> bool {
        if self.aggregation_interval.is_zero() {
            return true;
        }
        match self.last_published_at {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.aggregation_interval,
        }
    }

    /// Attempt to deliver the pending transition. Returns `None` if there is
    /// nothing to do (no pending transition, demand unavailable, or still
    /// inside the aggregation window). A transition that turns out not to
    /// apply against the cached state is dropped here (not in
    /// `on_new_transition`) and reported as [`PublishOutcome::ResetNeeded`].
    pub fn publish_pending(&mut self, now: Instant, can_update: bool) -> Option<PublishOutcome> {
        if !can_update || self.pending.is_none() {
            return None;
        }
        if !self.aggregation_criteria_met(now) {
            return None;
        }
        let pending = self.pending.take().expect("checked is_some above");
        if !pending.applicable_to(self.state.as_ref()) {
            return Some(PublishOutcome::ResetNeeded);
        }
        let deliver_as_snapshot = self.state.is_none() || pending.is_snapshot();
        let new_state = pending
            .apply(self.state.as_ref())
            .expect("applicable_to just confirmed this transition applies");
        self.state = Some(new_state.clone());
        self.last_published_at = Some(now);
        let outbound = if deliver_as_snapshot {
            Outbound::Snapshot(new_state)
        } else {
            Outbound::Transition(pending)
        };
        Some(PublishOutcome::Update(outbound))
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop any cached state and pending transition, e.g. after a reset is
    /// requested so the next arriving transition is forced through the
    /// snapshot path.
    pub fn clear_state(&mut self) {
        self.state = None;
        self.pending = None;
    }

    #[cfg(test)]
    pub fn state(&self) -> Option<&StreamState> {
        self.state.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> Instant {
        Instant::now()
    }

    #[test]
    fn zero_interval_delivers_every_transition_when_demand_allows() {
        let mut bucket = Bucket::new(None, 0);
        bucket.on_new_transition(StreamStateTransition::StringSet("v1".into()));
        let out = bucket.publish_pending(now(), true);
        assert_eq!(
            out,
            Some(PublishOutcome::Update(Outbound::Snapshot(StreamState::String("v1".into()))))
        );

        bucket.on_new_transition(StreamStateTransition::StringSet("v2".into()));
        let out = bucket.publish_pending(now(), true);
        assert_eq!(
            out,
            Some(PublishOutcome::Update(Outbound::Transition(StreamStateTransition::StringSet("v2".into()))))
        );
    }

    #[test]
    fn coalesces_to_the_latest_transition_only() {
        let mut bucket = Bucket::new(None, 0);
        bucket.on_new_transition(StreamStateTransition::StringSet("v1".into()));
        bucket.on_new_transition(StreamStateTransition::StringSet("v2".into()));
        bucket.on_new_transition(StreamStateTransition::StringSet("v3".into()));
        let out = bucket.publish_pending(now(), true);
        assert_eq!(
            out,
            Some(PublishOutcome::Update(Outbound::Snapshot(StreamState::String("v3".into()))))
        );
        assert!(!bucket.has_pending());
    }

    #[test]
    fn inapplicable_delta_is_dropped_and_reset_is_requested() {
        let mut bucket = Bucket::new(None, 0);
        bucket.on_new_transition(StreamStateTransition::SetSnapshot {
            version: 3,
            elements: vec![],
            partial_updates: true,
        });
        bucket.publish_pending(now(), true);

        bucket.on_new_transition(StreamStateTransition::SetDelta {
            base_version: 5,
            added: vec![],
            removed: vec![],
        });
        let out = bucket.publish_pending(now(), true);
        assert_eq!(out, Some(PublishOutcome::ResetNeeded));
        assert!(!bucket.has_pending());
    }

    #[test]
    fn no_demand_means_no_publish_attempt() {
        let mut bucket = Bucket::new(None, 0);
        bucket.on_new_transition(StreamStateTransition::StringSet("v1".into()));
        assert_eq!(bucket.publish_pending(now(), false), None);
        assert!(bucket.has_pending());
    }
}
