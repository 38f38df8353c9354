//! Query predicates.
//!
//! Populated fields of one [`Filter`] are ORed: a host matches if it matches
//! any criterion. A list of filters passed to a query is ANDed by sequential
//! intersection.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::host::{HostId, Namespaced};

/// A query predicate. Empty collections count as "not populated"; a filter
/// with nothing populated matches no host.
///
/// # Examples
///
/// ```
/// use hbi::Filter;
///
/// let filter = Filter::new()
///     .account_number("1")
///     .tag("demo", "env", "prod");
/// assert!(!filter.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    /// Exact id matches.
    #[serde(default)]
    pub ids: Vec<HostId>,

    /// Canonical fact pairs.
    #[serde(default)]
    pub canonical_facts: IndexMap<String, String>,

    /// Fact pairs; the namespace is not used for matching.
    #[serde(default)]
    pub facts: Namespaced,

    /// Tag pairs; the namespace is not used for matching.
    #[serde(default)]
    pub tags: Namespaced,

    /// Account identifiers.
    #[serde(default)]
    pub account_numbers: Vec<String>,
}

impl Filter {
    /// Creates a filter with no criteria.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches hosts with any of the given ids.
    #[must_use]
    pub fn ids<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<HostId>,
    {
        self.ids.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Matches hosts with the given id.
    #[must_use]
    pub fn id(mut self, id: impl Into<HostId>) -> Self {
        self.ids.push(id.into());
        self
    }

    /// Matches hosts with the given canonical fact.
    #[must_use]
    pub fn canonical_fact(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.canonical_facts.insert(key.into(), value.into());
        self
    }

    /// Matches hosts with the given fact.
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

    /// Matches hosts with the given tag.
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

    /// Matches hosts in the given account.
    #[must_use]
    pub fn account_number(mut self, account: impl Into<String>) -> Self {
        self.account_numbers.push(account.into());
        self
    }

    /// Returns true if no criterion is populated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
            && self.canonical_facts.is_empty()
            && self.facts.values().all(|ns| ns.is_empty())
            && self.tags.values().all(|ns| ns.is_empty())
            && self.account_numbers.is_empty()
    }
}
