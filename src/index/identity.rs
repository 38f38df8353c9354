//! Alternate-key index.
//!
//! One flat map resolves every lookup key to its owner(s). Ids and canonical
//! facts are single-owner keys; fact and tag pairs are multi-owner keys,
//! since many hosts legitimately share a tag value. Lookups are O(1)
//! amortized per key regardless of how many hosts are stored.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::warn;

use crate::config::ResolutionPolicy;
use crate::error::ConflictError;
use crate::host::{attribute_pairs, CanonicalFacts, Host, HostId, Namespaced};

/// A raw key in the identity index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LookupKey {
    /// The host id.
    Id(HostId),
    /// One canonical fact pair.
    Canonical {
        /// Attribute name.
        attribute: String,
        /// Attribute value.
        value: String,
    },
    /// One fact or tag pair, namespace discarded.
    Attribute {
        /// Attribute name.
        attribute: String,
        /// Attribute value.
        value: String,
    },
}

impl LookupKey {
    /// Key for a canonical fact pair.
    #[must_use]
    pub fn canonical(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Canonical {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Key for a fact or tag pair.
    #[must_use]
    pub fn attribute(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Attribute {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Returns true for keys that map to exactly one host.
    #[must_use]
    pub const fn is_single_owner(&self) -> bool {
        matches!(self, Self::Id(_) | Self::Canonical { .. })
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id={id}"),
            Self::Canonical { attribute, value } => write!(f, "canonical:{attribute}={value}"),
            Self::Attribute { attribute, value } => write!(f, "attribute:{attribute}={value}"),
        }
    }
}

#[derive(Debug, Clone)]
enum Owner {
    Single(HostId),
    Multi(HashSet<HostId>),
}

/// Result of a raw key lookup.
#[derive(Debug, Clone, Copy)]
pub enum Lookup<'a> {
    /// Nothing registered under the key.
    None,
    /// The single owner of an id or canonical key.
    Single(&'a HostId),
    /// Every host sharing a fact or tag pair.
    Multi(&'a HashSet<HostId>),
}

impl<'a> Lookup<'a> {
    /// Returns true if the lookup found nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::None => true,
            Self::Single(_) => false,
            Self::Multi(set) => set.is_empty(),
        }
    }

    /// Iterates over the hosts found.
    pub fn iter(self) -> impl Iterator<Item = &'a HostId> {
        let (single, multi) = match self {
            Self::None => (None, None),
            Self::Single(id) => (Some(id), None),
            Self::Multi(set) => (None, Some(set.iter())),
        };
        single.into_iter().chain(multi.into_iter().flatten())
    }
}

/// Maps every alternate key to the owning host(s).
#[derive(Debug, Clone, Default)]
pub struct IdentityIndex {
    keys: HashMap<LookupKey, Owner>,
}

impl IdentityIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct keys registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if no key is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Registers `id`, every canonical fact and every fact/tag pair of `host`.
    ///
    /// Nothing is inserted if any single-owner key already belongs to another
    /// host; such conflicts must be resolved by merging first.
    ///
    /// # Errors
    ///
    /// Returns `ConflictError::KeyOwned` naming the first conflicting key.
    pub fn register(&mut self, id: &HostId, host: &Host) -> Result<(), ConflictError> {
        let single_keys: Vec<LookupKey> = std::iter::once(LookupKey::Id(id.clone()))
            .chain(canonical_keys(&host.canonical_facts))
            .collect();

        for key in &single_keys {
            if let Some(owner) = self.single_owner(key) {
                if owner != id {
                    return Err(ConflictError::KeyOwned {
                        key: key.to_string(),
                        owner: owner.clone(),
                    });
                }
            }
        }

        for key in single_keys {
            self.keys.insert(key, Owner::Single(id.clone()));
        }
        self.register_attributes(id, &host.facts, &host.tags);
        Ok(())
    }

    /// Finds the stored host a candidate refers to.
    ///
    /// A non-empty id is authoritative: the id alone decides which host the
    /// candidate is, and an unknown id means a new host. Otherwise canonical
    /// facts are tried in the candidate's order. Under
    /// [`ResolutionPolicy::FirstMatch`] the first hit wins and later facts are
    /// not consulted. Under [`ResolutionPolicy::RejectAmbiguous`] every fact is
    /// checked, and it is an error for them to point at a host other than the
    /// one the candidate resolves to.
    ///
    /// # Errors
    ///
    /// Returns `ConflictError::AmbiguousIdentity` under `RejectAmbiguous`.
    pub fn resolve(
        &self,
        candidate: &Host,
        policy: ResolutionPolicy,
    ) -> Result<Option<HostId>, ConflictError> {
        let mut hits = canonical_keys(&candidate.canonical_facts)
            .filter_map(|key| self.single_owner(&key).cloned());

        if let Some(id) = candidate.id.as_ref().filter(|id| !id.is_empty()) {
            let resolved = self.single_owner(&LookupKey::Id(id.clone())).cloned();
            if policy.can_reject() {
                let mut claimed: Vec<HostId> = resolved.iter().cloned().collect();
                let before = claimed.len();
                push_distinct(&mut claimed, hits);
                if claimed.len() > before {
                    return Err(ConflictError::AmbiguousIdentity {
                        candidates: claimed,
                    });
                }
            }
            return Ok(resolved);
        }

        match policy {
            ResolutionPolicy::FirstMatch => Ok(hits.next()),
            ResolutionPolicy::RejectAmbiguous => {
                let mut distinct = Vec::new();
                push_distinct(&mut distinct, hits);
                if distinct.len() > 1 {
                    return Err(ConflictError::AmbiguousIdentity {
                        candidates: distinct,
                    });
                }
                Ok(distinct.pop())
            }
        }
    }

    /// Returns whatever is registered under a raw key.
    #[must_use]
    pub fn lookup_many(&self, key: &LookupKey) -> Lookup<'_> {
        match self.keys.get(key) {
            None => Lookup::None,
            Some(Owner::Single(id)) => Lookup::Single(id),
            Some(Owner::Multi(set)) => Lookup::Multi(set),
        }
    }

    /// Moves canonical keys of `id` from the `old` values to the `new` ones.
    ///
    /// Keys for old values are dropped only while they still point at `id`.
    /// A new key that belonged to another host is taken over; the displaced
    /// hosts are returned and stay reachable by id and their other keys.
    pub fn reindex_canonical(
        &mut self,
        id: &HostId,
        old: &CanonicalFacts,
        new: &CanonicalFacts,
    ) -> Vec<HostId> {
        for key in canonical_keys(old) {
            if self.single_owner(&key) == Some(id) {
                self.keys.remove(&key);
            }
        }

        let mut displaced = Vec::new();
        for key in canonical_keys(new) {
            let previous = self.keys.insert(key.clone(), Owner::Single(id.clone()));
            if let Some(Owner::Single(prev)) = previous {
                if &prev != id {
                    warn!(host_id = %id, previous_owner = %prev, key = %key, "canonical key taken over by merge");
                    displaced.push(prev);
                }
            }
        }
        displaced
    }

    /// Adds `id` to the owner set of every fact and tag pair.
    pub fn register_attributes(&mut self, id: &HostId, facts: &Namespaced, tags: &Namespaced) {
        for (attribute, value) in attribute_pairs(facts).chain(attribute_pairs(tags)) {
            let key = LookupKey::attribute(attribute, value);
            match self.keys.entry(key) {
                Entry::Occupied(mut slot) => {
                    if let Owner::Multi(set) = slot.get_mut() {
                        set.insert(id.clone());
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(Owner::Multi(HashSet::from([id.clone()])));
                }
            }
        }
    }

    /// Removes `id` from the owner set of every fact and tag pair, dropping
    /// sets that become empty.
    pub fn unregister_attributes(&mut self, id: &HostId, facts: &Namespaced, tags: &Namespaced) {
        for (attribute, value) in attribute_pairs(facts).chain(attribute_pairs(tags)) {
            let key = LookupKey::attribute(attribute, value);
            if let Entry::Occupied(mut slot) = self.keys.entry(key) {
                if let Owner::Multi(set) = slot.get_mut() {
                    set.remove(id);
                    if set.is_empty() {
                        slot.remove();
                    }
                }
            }
        }
    }

    fn single_owner(&self, key: &LookupKey) -> Option<&HostId> {
        match self.keys.get(key) {
            Some(Owner::Single(id)) => Some(id),
            _ => None,
        }
    }
}

fn push_distinct(out: &mut Vec<HostId>, hits: impl Iterator<Item = HostId>) {
    for hit in hits {
        if !out.contains(&hit) {
            out.push(hit);
        }
    }
}

fn canonical_keys(facts: &CanonicalFacts) -> impl Iterator<Item = LookupKey> + '_ {
    facts
        .iter()
        .map(|(attribute, value)| LookupKey::canonical(attribute, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(index: &mut IdentityIndex, host: Host) -> HostId {
        let id = HostId::generate();
        index.register(&id, &host).unwrap();
        id
    }

    #[test]
    fn register_makes_host_reachable_by_every_key() {
        let mut index = IdentityIndex::new();
        let host = Host::new()
            .canonical_fact("hostname", "a.example.com")
            .canonical_fact("insights_id", "1234")
            .fact("advisor", "cpu.count", "4")
            .tag("demo", "env", "prod");
        let id = registered(&mut index, host);

        assert!(matches!(index.lookup_many(&LookupKey::Id(id.clone())), Lookup::Single(h) if h == &id));
        assert!(matches!(
            index.lookup_many(&LookupKey::canonical("insights_id", "1234")),
            Lookup::Single(h) if h == &id
        ));
        let tagged: Vec<_> = index
            .lookup_many(&LookupKey::attribute("env", "prod"))
            .iter()
            .collect();
        assert_eq!(tagged, vec![&id]);
        assert!(!index.lookup_many(&LookupKey::attribute("cpu.count", "4")).is_empty());
        assert!(index.lookup_many(&LookupKey::attribute("cpu.count", "8")).is_empty());
    }

    #[test]
    fn register_rejects_canonical_key_owned_by_other_host() {
        let mut index = IdentityIndex::new();
        registered(&mut index, Host::new().canonical_fact("hostname", "shared"));

        let other = HostId::generate();
        let err = index
            .register(&other, &Host::new().canonical_fact("hostname", "shared").tag("a", "b", "c"))
            .unwrap_err();
        assert!(matches!(err, ConflictError::KeyOwned { .. }));
        // Nothing from the rejected host leaked in.
        assert!(index.lookup_many(&LookupKey::Id(other)).is_empty());
        assert!(index.lookup_many(&LookupKey::attribute("b", "c")).is_empty());
    }

    #[test]
    fn multi_owner_keys_collect_every_host() {
        let mut index = IdentityIndex::new();
        let a = registered(&mut index, Host::new().canonical_fact("hostname", "a").tag("t", "env", "prod"));
        let b = registered(&mut index, Host::new().canonical_fact("hostname", "b").tag("u", "env", "prod"));

        let owners: HashSet<_> = index
            .lookup_many(&LookupKey::attribute("env", "prod"))
            .iter()
            .cloned()
            .collect();
        assert_eq!(owners, HashSet::from([a, b]));
    }

    #[test]
    fn canonical_and_attribute_pairs_do_not_collide() {
        let mut index = IdentityIndex::new();
        let a = registered(&mut index, Host::new().canonical_fact("hostname", "x"));
        let b = registered(&mut index, Host::new().canonical_fact("insights_id", "2").fact("demo", "hostname", "x"));

        assert!(matches!(index.lookup_many(&LookupKey::canonical("hostname", "x")), Lookup::Single(h) if h == &a));
        let by_fact: Vec<_> = index
            .lookup_many(&LookupKey::attribute("hostname", "x"))
            .iter()
            .collect();
        assert_eq!(by_fact, vec![&b]);
    }

    #[test]
    fn resolve_prefers_id_and_does_not_fall_back() {
        let mut index = IdentityIndex::new();
        let a = registered(&mut index, Host::new().canonical_fact("hostname", "a"));

        let by_id = Host::new().id(a.clone());
        assert_eq!(index.resolve(&by_id, ResolutionPolicy::FirstMatch).unwrap(), Some(a));

        let unknown_id = Host::new().id("missing").canonical_fact("hostname", "a");
        assert_eq!(index.resolve(&unknown_id, ResolutionPolicy::FirstMatch).unwrap(), None);
    }

    #[test]
    fn resolve_first_match_follows_candidate_order() {
        let mut index = IdentityIndex::new();
        let a = registered(&mut index, Host::new().canonical_fact("hostname", "h"));
        let b = registered(&mut index, Host::new().canonical_fact("insights_id", "i"));

        let candidate = Host::new()
            .canonical_fact("insights_id", "i")
            .canonical_fact("hostname", "h");
        assert_eq!(
            index.resolve(&candidate, ResolutionPolicy::FirstMatch).unwrap(),
            Some(b.clone())
        );

        let reversed = Host::new()
            .canonical_fact("hostname", "h")
            .canonical_fact("insights_id", "i");
        assert_eq!(
            index.resolve(&reversed, ResolutionPolicy::FirstMatch).unwrap(),
            Some(a.clone())
        );

        let err = index
            .resolve(&reversed, ResolutionPolicy::RejectAmbiguous)
            .unwrap_err();
        match err {
            ConflictError::AmbiguousIdentity { candidates } => assert_eq!(candidates, vec![a, b]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn resolve_reject_ambiguous_accepts_agreeing_facts() {
        let mut index = IdentityIndex::new();
        let a = registered(
            &mut index,
            Host::new().canonical_fact("hostname", "h").canonical_fact("insights_id", "i"),
        );
        let candidate = Host::new()
            .canonical_fact("hostname", "h")
            .canonical_fact("insights_id", "i")
            .canonical_fact("bios_uuid", "new");
        assert_eq!(
            index.resolve(&candidate, ResolutionPolicy::RejectAmbiguous).unwrap(),
            Some(a)
        );
    }

    #[test]
    fn resolve_reject_ambiguous_checks_facts_of_addressed_host() {
        let mut index = IdentityIndex::new();
        let a = registered(&mut index, Host::new().canonical_fact("insights_id", "i"));
        let b = registered(&mut index, Host::new().canonical_fact("hostname", "h"));

        let candidate = Host::new().id(a.clone()).canonical_fact("hostname", "h");
        assert_eq!(
            index.resolve(&candidate, ResolutionPolicy::FirstMatch).unwrap(),
            Some(a.clone())
        );
        let err = index
            .resolve(&candidate, ResolutionPolicy::RejectAmbiguous)
            .unwrap_err();
        match err {
            ConflictError::AmbiguousIdentity { candidates } => {
                assert_eq!(candidates, vec![a.clone(), b.clone()]);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Facts the addressed host already owns are not a conflict.
        let own = Host::new().id(a.clone()).canonical_fact("insights_id", "i");
        assert_eq!(
            index.resolve(&own, ResolutionPolicy::RejectAmbiguous).unwrap(),
            Some(a)
        );

        // An unknown id whose fact belongs to a stored host is rejected too.
        let stray = Host::new().id("foreign").canonical_fact("hostname", "h");
        let err = index
            .resolve(&stray, ResolutionPolicy::RejectAmbiguous)
            .unwrap_err();
        assert!(matches!(err, ConflictError::AmbiguousIdentity { candidates } if candidates == vec![b]));
    }

    #[test]
    fn reindex_canonical_drops_stale_values() {
        let mut index = IdentityIndex::new();
        let old = Host::new().canonical_fact("hostname", "old");
        let id = registered(&mut index, old.clone());

        let mut merged = old.clone();
        merged.merge(Host::new().canonical_fact("hostname", "new"));
        let displaced = index.reindex_canonical(&id, &old.canonical_facts, &merged.canonical_facts);

        assert!(displaced.is_empty());
        assert!(index.lookup_many(&LookupKey::canonical("hostname", "old")).is_empty());
        assert!(matches!(index.lookup_many(&LookupKey::canonical("hostname", "new")), Lookup::Single(h) if h == &id));
    }

    #[test]
    fn reindex_canonical_takes_over_foreign_key() {
        let mut index = IdentityIndex::new();
        let a = registered(&mut index, Host::new().canonical_fact("insights_id", "i"));
        let b = registered(&mut index, Host::new().canonical_fact("hostname", "h"));

        let old = Host::new().canonical_fact("insights_id", "i");
        let new = Host::new().canonical_fact("insights_id", "i").canonical_fact("hostname", "h");
        let displaced = index.reindex_canonical(&a, &old.canonical_facts, &new.canonical_facts);

        assert_eq!(displaced, vec![b.clone()]);
        assert!(matches!(index.lookup_many(&LookupKey::canonical("hostname", "h")), Lookup::Single(h) if h == &a));
        assert!(matches!(index.lookup_many(&LookupKey::Id(b.clone())), Lookup::Single(h) if h == &b));
    }

    #[test]
    fn unregister_attributes_drops_empty_sets() {
        let mut index = IdentityIndex::new();
        let host = Host::new().canonical_fact("hostname", "a").tag("demo", "env", "prod");
        let id = registered(&mut index, host.clone());
        let before = index.len();

        index.unregister_attributes(&id, &host.facts, &host.tags);
        assert!(index.lookup_many(&LookupKey::attribute("env", "prod")).is_empty());
        assert_eq!(index.len(), before - 1);
    }
}
