//! Host records and their identity.
//!
//! A [`Host`] is one real machine or agent as currently known to the store.
//! It has no single primary key: any of its canonical facts identifies it,
//! and the store assigns a [`HostId`] on first insertion.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Two-level attribute mapping: namespace -> (attribute name -> value).
pub type Namespaced = BTreeMap<String, BTreeMap<String, String>>;

/// Identity attributes in the order they were supplied.
pub type CanonicalFacts = IndexMap<String, String>;

/// Opaque, globally unique host identifier.
///
/// Once assigned by the store an id never changes.
///
/// # Examples
///
/// ```
/// use hbi::HostId;
///
/// let id = HostId::generate();
/// assert_eq!(id.as_str().len(), 32);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HostId(String);

impl HostId {
    /// Creates a fresh random id (simple hex form of a v4 UUID).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the id is the empty string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for HostId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for HostId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<HostId> for String {
    fn from(id: HostId) -> Self {
        id.0
    }
}

/// A host record: either an upsert candidate or a stored, canonical host.
///
/// # Examples
///
/// ```
/// use hbi::Host;
///
/// let host = Host::new()
///     .canonical_fact("insights_id", "1234")
///     .canonical_fact("hostname", "x.example.com")
///     .fact("advisor", "cpu.count", "4");
/// assert!(host.has_identity());
/// assert!(host.id.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Assigned by the store on first insertion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<HostId>,

    /// Human readable name, not used for identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Grouping identifier. Plain data, not a security boundary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,

    /// Identity attributes used for resolution.
    #[serde(default)]
    pub canonical_facts: CanonicalFacts,

    /// Descriptive attributes per namespace.
    #[serde(default)]
    pub facts: Namespaced,

    /// Classification attributes per namespace.
    #[serde(default)]
    pub tags: Namespaced,
}

impl Host {
    /// Creates an empty candidate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a candidate from a set of canonical facts.
    #[must_use]
    pub fn with_canonical_facts<I, K, V>(facts: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            canonical_facts: facts
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Self::default()
        }
    }

    /// Sets the id the candidate refers to.
    #[must_use]
    pub fn id(mut self, id: impl Into<HostId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Adds a canonical fact.
    #[must_use]
    pub fn canonical_fact(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.canonical_facts.insert(key.into(), value.into());
        self
    }

    /// Adds a fact under `namespace`.
    #[must_use]
    pub fn fact(
        mut self,
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.facts
            .entry(namespace.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Adds a tag under `namespace`.
    #[must_use]
    pub fn tag(
        mut self,
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.tags
            .entry(namespace.into())
            .or_default()
            .insert(key.into(), value.into());
        self
    }

    /// Sets the account number.
    #[must_use]
    pub fn account_number(mut self, account: impl Into<String>) -> Self {
        self.account_number = Some(account.into());
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Returns true if the host carries an id or at least one canonical fact.
    #[must_use]
    pub fn has_identity(&self) -> bool {
        self.id.as_ref().is_some_and(|id| !id.is_empty()) || !self.canonical_facts.is_empty()
    }

    /// Looks up a fact value by namespace and key.
    #[must_use]
    pub fn fact_value(&self, namespace: &str, key: &str) -> Option<&str> {
        self.facts
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .map(String::as_str)
    }

    /// Looks up a tag value by namespace and key.
    #[must_use]
    pub fn tag_value(&self, namespace: &str, key: &str) -> Option<&str> {
        self.tags
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .map(String::as_str)
    }

    /// Folds a newer snapshot of the same host into this one.
    ///
    /// Canonical facts are unioned per attribute, facts and tags per
    /// namespace and key. Incoming values overwrite existing ones; anything
    /// only present on `self` survives. Scalars are replaced only when the
    /// incoming snapshot provides them. The id is never touched.
    ///
    /// This only updates the record. Keeping the lookup indexes in sync is
    /// the store's job.
    pub fn merge(&mut self, incoming: Host) {
        let Host {
            id: _,
            display_name,
            account_number,
            canonical_facts,
            facts,
            tags,
        } = incoming;

        self.canonical_facts.extend(canonical_facts);
        merge_namespaced(&mut self.facts, facts);
        merge_namespaced(&mut self.tags, tags);

        if display_name.is_some() {
            self.display_name = display_name;
        }
        if account_number.is_some() {
            self.account_number = account_number;
        }
    }
}

fn merge_namespaced(existing: &mut Namespaced, incoming: Namespaced) {
    for (namespace, values) in incoming {
        existing.entry(namespace).or_default().extend(values);
    }
}

/// Flattens a namespaced mapping into `(attribute, value)` pairs.
///
/// Namespaces are discarded: lookup keys only use attribute and value.
pub fn attribute_pairs(values: &Namespaced) -> impl Iterator<Item = (&str, &str)> {
    values
        .values()
        .flat_map(|ns| ns.iter().map(|(k, v)| (k.as_str(), v.as_str())))
}
