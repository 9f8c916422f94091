use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque element carried inside a [`SetState`](StreamState::Set) or
/// [`ListState`](StreamState::List). The dispatch core never interprets the
/// bytes; producers and consumers agree on their meaning out of band.
pub type Element = Vec<u8>;

/// Which end of a [`ListState`](StreamState::List) items are evicted from
/// once the configured capacity is exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvictionPolicy {
    FromHead,
    FromTail,
}

/// A single column value inside a [`DictMapState`](StreamState::DictMap).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

/// The four payload shapes a stream can carry. A `StreamState` is the
/// reconstructed value; what travels on the wire (after the first snapshot)
/// is usually a [`StreamStateTransition`] instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamState {
    String(String),
    Set {
        version: u64,
        elements: Vec<Element>,
        partial_updates: bool,
    },
    List {
        capacity: usize,
        eviction: EvictionPolicy,
        items: Vec<Element>,
    },
    DictMap {
        columns: Vec<String>,
        values: Vec<ColumnValue>,
    },
}

/// A delta to be folded into an `Option<StreamState>` to produce the next
/// state. Every variant is total over the `(transition, currentState)` pair:
/// it either applies (producing `Some(newState)`) or it doesn't apply at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamStateTransition {
    StringSet(String),
    SetSnapshot {
        version: u64,
        elements: Vec<Element>,
        partial_updates: bool,
    },
    SetDelta {
        base_version: u64,
        added: Vec<Element>,
        removed: Vec<Element>,
    },
    ListSnapshot {
        capacity: usize,
        eviction: EvictionPolicy,
        items: Vec<Element>,
    },
    ListAddAtHead(Element),
    ListAddAtTail(Element),
    ListRemoveByValue(Element),
    DictMapReplace {
        columns: Vec<String>,
        values: Vec<ColumnValue>,
    },
}

impl StreamStateTransition {
    /// Whether this transition can be folded into `current`. A transition
    /// that carries a full snapshot is always applicable, including against
    /// `None` (no base state yet); a delta is only applicable against a
    /// matching base state.
    pub fn applicable_to(&self, current: Option<&StreamState>) -> bool {
        match self {
            StreamStateTransition::StringSet(_) => true,
            StreamStateTransition::SetSnapshot { .. } => true,
            StreamStateTransition::SetDelta { base_version, .. } => matches!(
                current,
                Some(StreamState::Set { version, .. }) if version == base_version
            ),
            StreamStateTransition::ListSnapshot { .. } => true,
            StreamStateTransition::ListAddAtHead(_)
            | StreamStateTransition::ListAddAtTail(_)
            | StreamStateTransition::ListRemoveByValue(_) => matches!(current, Some(StreamState::List { .. })),
            StreamStateTransition::DictMapReplace { .. } => true,
        }
    }

    /// Whether this transition carries a complete replacement of the state
    /// rather than a delta against the current one. A bucket with no cached
    /// state always dispatches its next applicable transition as a wire
    /// snapshot; this flag is what makes that decision uniform across
    /// variants without needing a separately-typed snapshot message.
    pub fn is_snapshot(&self) -> bool {
        matches!(
            self,
            StreamStateTransition::StringSet(_)
                | StreamStateTransition::SetSnapshot { .. }
                | StreamStateTransition::ListSnapshot { .. }
                | StreamStateTransition::DictMapReplace { .. }
        )
    }

    /// Fold this transition into `current`, producing the next state. Must
    /// only be called when [`applicable_to`](Self::applicable_to) returned
    /// `true` for the same `current`; an inapplicable transition has no
    /// defined result and callers must drop it instead of applying it.
    pub fn apply(&self, current: Option<&StreamState>) -> Option<StreamState> {
        if !self.applicable_to(current) {
            return None;
        }
        Some(match self {
            StreamStateTransition::StringSet(value) => StreamState::String(value.clone()),
            StreamStateTransition::SetSnapshot {
                version,
                elements,
                partial_updates,
            } => StreamState::Set {
                version: *version,
                elements: elements.clone(),
                partial_updates: *partial_updates,
            },
            StreamStateTransition::SetDelta {
                base_version, added, removed,
            } => {
                let (elements, partial_updates) = match current {
                    Some(StreamState::Set { elements, partial_updates, .. }) => {
                        (elements.clone(), *partial_updates)
                    }
                    _ => unreachable!("applicable_to guarantees a matching Set base state"),
                };
                let mut next: Vec<Element> = elements.into_iter().filter(|e| !removed.contains(e)).collect();
                for e in added {
                    if !next.contains(e) {
                        next.push(e.clone());
                    }
                }
                StreamState::Set {
                    version: base_version + 1,
                    elements: next,
                    partial_updates,
                }
            }
            StreamStateTransition::ListSnapshot {
                capacity,
                eviction,
                items,
            } => StreamState::List {
                capacity: *capacity,
                eviction: *eviction,
                items: truncate_list(items.clone(), *capacity, *eviction),
            },
            StreamStateTransition::ListAddAtHead(item) => {
                let (capacity, eviction, mut items) = list_parts(current);
                items.insert(0, item.clone());
                StreamState::List {
                    capacity,
                    eviction,
                    items: truncate_list(items, capacity, eviction),
                }
            }
            StreamStateTransition::ListAddAtTail(item) => {
                let (capacity, eviction, mut items) = list_parts(current);
                items.push(item.clone());
                StreamState::List {
                    capacity,
                    eviction,
                    items: truncate_list(items, capacity, eviction),
                }
            }
            StreamStateTransition::ListRemoveByValue(item) => {
                let (capacity, eviction, mut items) = list_parts(current);
                if let Some(pos) = items.iter().position(|x| x == item) {
                    items.remove(pos);
                }
                StreamState::List { capacity, eviction, items }
            }
            StreamStateTransition::DictMapReplace { columns, values } => StreamState::DictMap {
                columns: columns.clone(),
                values: values.clone(),
            },
        })
    }
}

fn list_parts(current: Option<&StreamState>) -> (usize, EvictionPolicy, Vec<Element>) {
    match current {
        Some(StreamState::List { capacity, eviction, items }) => (*capacity, *eviction, items.clone()),
        _ => unreachable!("applicable_to guarantees a List base state"),
    }
}

fn truncate_list(mut items: Vec<Element>, capacity: usize, eviction: EvictionPolicy) -> Vec<Element> {
    while items.len() > capacity {
        match eviction {
            EvictionPolicy::FromHead => {
                items.remove(0);
            }
            EvictionPolicy::FromTail => {
                items.pop();
            }
        }
    }
    items
}

/// Convenience for building a [`DictMapState`](StreamState::DictMap)'s
/// column/value pairs from a map while preserving a stable column order.
pub fn dict_map_from_sorted(map: BTreeMap<String, ColumnValue>) -> (Vec<String>, Vec<ColumnValue>) {
    map.into_iter().unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_set_always_applies() {
        let t = StreamStateTransition::StringSet("v1".into());
        assert!(t.applicable_to(None));
        assert_eq!(t.apply(None), Some(StreamState::String("v1".into())));
    }

    #[test]
    fn set_delta_requires_matching_base_version() {
        let base = StreamState::Set {
            version: 5,
            elements: vec![b"a".to_vec()],
            partial_updates: true,
        };
        let matching = StreamStateTransition::SetDelta {
            base_version: 5,
            added: vec![b"b".to_vec()],
            removed: vec![],
        };
        assert!(matching.applicable_to(Some(&base)));
        let next = matching.apply(Some(&base)).unwrap();
        assert_eq!(
            next,
            StreamState::Set {
                version: 6,
                elements: vec![b"a".to_vec(), b"b".to_vec()],
                partial_updates: true,
            }
        );

        let stale = StreamStateTransition::SetDelta {
            base_version: 3,
            added: vec![],
            removed: vec![],
        };
        assert!(!stale.applicable_to(Some(&base)));
        assert_eq!(stale.apply(Some(&base)), None);
    }

    #[test]
    fn list_eviction_from_tail() {
        let snapshot = StreamStateTransition::ListSnapshot {
            capacity: 2,
            eviction: EvictionPolicy::FromTail,
            items: vec![b"a".to_vec()],
        };
        let state = snapshot.apply(None).unwrap();
        let add = StreamStateTransition::ListAddAtTail(b"b".to_vec());
        let state = add.apply(Some(&state)).unwrap();
        let add2 = StreamStateTransition::ListAddAtTail(b"c".to_vec());
        let state = add2.apply(Some(&state)).unwrap();
        match state {
            StreamState::List { items, .. } => assert_eq!(items, vec![b"b".to_vec(), b"c".to_vec()]),
            _ => panic!("expected list state"),
        }
    }

    #[test]
    fn dict_map_replace_is_always_applicable_and_a_snapshot() {
        let t = StreamStateTransition::DictMapReplace {
            columns: vec!["a".into()],
            values: vec![ColumnValue::Int(1)],
        };
        assert!(t.is_snapshot());
        assert!(t.applicable_to(None));
    }
}
