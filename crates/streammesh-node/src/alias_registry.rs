use std::collections::HashMap;
use streammesh_types::{Alias, Subject};

/// Connection-scoped `Alias <-> Subject` table. The dispatch core is
/// deliberately ignorant of aliases; this is the outer wire boundary that
/// translates between them.
#[derive(Debug, Default)]
pub struct AliasRegistry {
    forward: HashMap<Alias, Subject>,
    reverse: HashMap<Subject, Alias>,
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `alias` to `subject`. Returns `false` (an `InvalidRequest`,
    /// per the wire dialect) if `alias` is already bound.
    pub fn bind(&mut self, alias: Alias, subject: Subject) -> bool {
        if self.forward.contains_key(&alias) {
            return false;
        }
        self.reverse.insert(subject.clone(), alias);
        self.forward.insert(alias, subject);
        true
    }

    pub fn subject_for(&self, alias: Alias) -> Option<&Subject> {
        self.forward.get(&alias)
    }

    pub fn alias_for(&self, subject: &Subject) -> Option<Alias> {
        self.reverse.get(subject).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streammesh_types::{ServiceKey, TagSet, TopicKey};

    fn subj() -> Subject {
        Subject::new(ServiceKey::new("svc"), TopicKey::new("t1"), TagSet::empty())
    }

    #[test]
    fn rebinding_an_alias_is_rejected() {
        let mut registry = AliasRegistry::new();
        assert!(registry.bind(Alias(1), subj()));
        assert!(!registry.bind(Alias(1), subj()));
    }

    #[test]
    fn forward_and_reverse_lookup_agree() {
        let mut registry = AliasRegistry::new();
        registry.bind(Alias(7), subj());
        assert_eq!(registry.subject_for(Alias(7)), Some(&subj()));
        assert_eq!(registry.alias_for(&subj()), Some(Alias(7)));
    }
}
