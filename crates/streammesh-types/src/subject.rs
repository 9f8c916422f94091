use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Opaque identifier for a logical service, independent of physical location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceKey(String);

impl ServiceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Opaque identifier for a topic exposed by a service.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TopicKey(String);

impl TopicKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TopicKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A single `key:value` disambiguation tag. Tags are unordered as a set but
/// individually comparable so that a [`TagSet`] can be kept in a `BTreeSet`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag(String);

impl Tag {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Tag {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// An unordered set of [`Tag`]s used to disambiguate instance-scoped subjects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagSet(BTreeSet<Tag>);

impl TagSet {
    pub fn empty() -> Self {
        Self(BTreeSet::new())
    }

    pub fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }

    pub fn contains(&self, tag: &Tag) -> bool {
        self.0.contains(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The `(ServiceKey, TopicKey, Tags)` triple identifying a subscription
/// target. Immutable and used as a map key throughout the dispatch core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    pub service: ServiceKey,
    pub topic: TopicKey,
    pub tags: TagSetKey,
}

/// `TagSet` wrapped so that `Subject` can be used as a `HashMap` key: tags
/// must hash consistently, which `BTreeSet`'s deterministic iteration order
/// already guarantees, but we derive `Hash` explicitly off the sorted
/// elements rather than relying on `TagSet` itself needing `Hash`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TagSetKey(pub Vec<Tag>);

impl std::hash::Hash for TagSetKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl From<TagSet> for TagSetKey {
    fn from(set: TagSet) -> Self {
        Self(set.0.into_iter().collect())
    }
}

impl Subject {
    pub fn new(service: ServiceKey, topic: TopicKey, tags: TagSet) -> Self {
        Self {
            service,
            topic,
            tags: tags.into(),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.topic)?;
        if !self.tags.0.is_empty() {
            write!(f, "[")?;
            for (i, tag) in self.tags.0.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}", tag.as_str())?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// A small positive integer a consumer issues to stand in for a [`Subject`]
/// on the wire. Unique per connection, monotonically assigned by the client,
/// never reused within a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Alias(pub u32);

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The priority key a subscription is grouped under. `None` is the default,
/// lowest-priority group; among `Some`, ascending lexicographic string order
/// is ascending priority.
pub type PriorityKey = Option<String>;

/// Orders two priority keys per the dispatch core's fixed convention:
/// `None` sorts after every `Some`.
pub fn compare_priority_keys(a: &PriorityKey, b: &PriorityKey) -> std::cmp::Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_sorts_after_every_some() {
        let mut keys: Vec<PriorityKey> = vec![None, Some("b".to_string()), Some("a".to_string())];
        keys.sort_by(compare_priority_keys);
        assert_eq!(keys, vec![Some("a".to_string()), Some("b".to_string()), None]);
    }

    #[test]
    fn subject_equality_ignores_tag_insertion_order() {
        let t1 = TagSet::from_iter(vec![Tag::new("b"), Tag::new("a")]);
        let t2 = TagSet::from_iter(vec![Tag::new("a"), Tag::new("b")]);
        let s1 = Subject::new(ServiceKey::new("svc"), TopicKey::new("top"), t1);
        let s2 = Subject::new(ServiceKey::new("svc"), TopicKey::new("top"), t2);
        assert_eq!(s1, s2);
    }
}
