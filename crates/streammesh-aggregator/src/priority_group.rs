use streammesh_types::{PriorityKey, Subject};

/// An ordered collection of subjects sharing a priority key, with its own
/// round-robin cursor. The group owns ordering and fairness only — the
/// buckets themselves live in the aggregator's subject map; a group just
/// remembers which subjects belong to it and whose turn is next.
#[derive(Debug)]
pub struct PriorityBucketGroup {
    pub priority_key: PriorityKey,
    subjects: Vec<Subject>,
    rr_index: usize,
}

impl PriorityBucketGroup {
    pub fn new(priority_key: PriorityKey) -> Self {
        Self {
            priority_key,
            subjects: Vec::new(),
            rr_index: 0,
        }
    }

    pub fn add(&mut self, subject: Subject) {
        if !self.subjects.contains(&subject) {
            self.subjects.push(subject);
        }
    }

    /// Remove `subject`; returns `true` if the group is now empty and should
    /// be dropped by the caller.
    pub fn remove(&mut self, subject: &Subject) -> bool {
        if let Some(pos) = self.subjects.iter().position(|s| s == subject) {
            self.subjects.remove(pos);
            if self.rr_index > pos || self.rr_index >= self.subjects.len() {
                self.rr_index = self.subjects.len().min(self.rr_index);
            }
        }
        self.subjects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    /// Returns the subject whose turn it is, then advances the cursor. The
    /// cursor persists across calls, which is what makes fairness a
    /// property of the whole run rather than of any one dispatch attempt.
    pub fn next_subject(&mut self) -> Option<Subject> {
        if self.subjects.is_empty() {
            return None;
        }
        if self.rr_index >= self.subjects.len() {
            self.rr_index = 0;
        }
        let subject = self.subjects[self.rr_index].clone();
        self.rr_index = (self.rr_index + 1) % self.subjects.len();
        Some(subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streammesh_types::{ServiceKey, TagSet, TopicKey};

    fn subj(n: u8) -> Subject {
        Subject::new(ServiceKey::new("svc"), TopicKey::new(format!("t{}", n)), TagSet::empty())
    }

    #[test]
    fn round_robins_across_calls() {
        let mut group = PriorityBucketGroup::new(Some("A".into()));
        group.add(subj(0));
        group.add(subj(1));
        group.add(subj(2));
        let order: Vec<_> = (0..6).map(|_| group.next_subject().unwrap()).collect();
        assert_eq!(order, vec![subj(0), subj(1), subj(2), subj(0), subj(1), subj(2)]);
    }

    #[test]
    fn removing_a_bucket_keeps_the_cursor_in_range() {
        let mut group = PriorityBucketGroup::new(None);
        group.add(subj(0));
        group.add(subj(1));
        group.next_subject();
        let now_empty = group.remove(&subj(1));
        assert!(!now_empty);
        assert_eq!(group.next_subject(), Some(subj(0)));
    }

    #[test]
    fn removing_last_bucket_reports_empty() {
        let mut group = PriorityBucketGroup::new(None);
        group.add(subj(0));
        assert!(group.remove(&subj(0)));
    }
}
