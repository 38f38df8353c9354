//! In-memory storage backend.
//!
//! The store owns the record set and both indexes behind one `RwLock`. An
//! upsert batch runs entirely under the write guard, so readers never see a
//! host registered under its new canonical facts while still reachable by
//! stale ones.

use std::collections::HashSet;
use std::sync::RwLock;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{HbiError, HbiResult, IdentityError};
use crate::filter::Filter;
use crate::host::{attribute_pairs, CanonicalFacts, Host, HostId};
use crate::index::{AccountIndex, IdentityIndex, LookupKey};
use crate::storage::traits::HostStore;

fn lock_err(context: &'static str) -> HbiError {
    HbiError::internal(format!("poisoned lock: {context}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Upserted {
    Created,
    Merged,
}

#[derive(Debug, Clone, Default)]
struct StoreState {
    /// The unfiltered record set, in insertion order.
    hosts: IndexMap<HostId, Host>,
    identity: IdentityIndex,
    accounts: AccountIndex,
}

/// Fails on the first candidate that has neither an id nor a canonical fact.
fn validate_batch(candidates: &[Host]) -> Result<(), IdentityError> {
    match candidates.iter().position(|candidate| !candidate.has_identity()) {
        Some(index) => Err(IdentityError::MissingIdentity { index }),
        None => Ok(()),
    }
}

impl StoreState {
    fn upsert_all(
        &mut self,
        candidates: Vec<Host>,
        config: &StoreConfig,
    ) -> HbiResult<(Vec<Host>, usize)> {
        let mut out = Vec::with_capacity(candidates.len());
        let mut created = 0;
        for candidate in candidates {
            let (host, outcome) = self.upsert(candidate, config)?;
            if outcome == Upserted::Created {
                created += 1;
            }
            out.push(host);
        }
        Ok((out, created))
    }

    fn upsert(&mut self, candidate: Host, config: &StoreConfig) -> HbiResult<(Host, Upserted)> {
        let resolved = self
            .identity
            .resolve(&candidate, config.resolution)
            .map_err(|err| {
                warn!(error = %err, "upsert rejected");
                err
            })?;
        match resolved {
            Some(id) => Ok((self.merge_into(&id, candidate, config)?, Upserted::Merged)),
            None => Ok((self.insert_new(candidate)?, Upserted::Created)),
        }
    }

    fn insert_new(&mut self, mut host: Host) -> HbiResult<Host> {
        let id = HostId::generate();
        host.id = Some(id.clone());

        // A candidate carrying an unknown id skips canonical resolution, so its
        // canonical keys may belong to another host. They move to the new one.
        let displaced =
            self.identity
                .reindex_canonical(&id, &CanonicalFacts::new(), &host.canonical_facts);
        self.identity.register(&id, &host)?;
        self.accounts.insert(&id, host.account_number.as_deref());
        self.hosts.insert(id.clone(), host.clone());

        debug!(
            host_id = %id,
            canonical_facts = host.canonical_facts.len(),
            displaced = displaced.len(),
            "host created"
        );
        Ok(host)
    }

    fn merge_into(&mut self, id: &HostId, incoming: Host, config: &StoreConfig) -> HbiResult<Host> {
        let existing = self
            .hosts
            .get_mut(id)
            .ok_or_else(|| HbiError::internal(format!("index points at missing host {id}")))?;

        let old_canonical = existing.canonical_facts.clone();
        let old_account = existing.account_number.clone();
        let old_attributes = config
            .reindex_attributes_on_merge
            .then(|| (existing.facts.clone(), existing.tags.clone()));
        let (new_facts, new_tags) = (incoming.facts.clone(), incoming.tags.clone());

        existing.merge(incoming);
        let merged = existing.clone();

        let displaced =
            self.identity
                .reindex_canonical(id, &old_canonical, &merged.canonical_facts);

        match old_attributes {
            Some((old_facts, old_tags)) => {
                self.identity.unregister_attributes(id, &old_facts, &old_tags);
                self.identity.register_attributes(id, &merged.facts, &merged.tags);
            }
            // Only the incoming pairs are added; pairs the host no longer
            // carries stay indexed.
            None => self.identity.register_attributes(id, &new_facts, &new_tags),
        }

        self.accounts.reassign(
            id,
            old_account.as_deref(),
            merged.account_number.as_deref(),
        );

        debug!(host_id = %id, displaced = displaced.len(), "host merged");
        Ok(merged)
    }

    fn query(&self, filters: &[Filter]) -> Vec<Host> {
        let mut running: Option<HashSet<HostId>> = None;
        for filter in filters {
            let matched = self.apply_filter(filter, running.as_ref());
            // Intersection only shrinks: once empty, later filters cannot help.
            if matched.is_empty() {
                return Vec::new();
            }
            running = Some(matched);
        }

        match running {
            None => self.hosts.values().cloned().collect(),
            Some(ids) => self.in_insertion_order(ids),
        }
    }

    /// Union of every criterion of `filter`, restricted to `within` if given.
    fn apply_filter(&self, filter: &Filter, within: Option<&HashSet<HostId>>) -> HashSet<HostId> {
        let admit = |id: &&HostId| within.map_or(true, |set| set.contains(*id));
        let mut out = HashSet::new();

        for account in &filter.account_numbers {
            if let Some(hosts) = self.accounts.hosts(account) {
                out.extend(hosts.iter().filter(admit).cloned());
            }
        }

        let keys = filter
            .ids
            .iter()
            .map(|id| LookupKey::Id(id.clone()))
            .chain(
                filter
                    .canonical_facts
                    .iter()
                    .map(|(k, v)| LookupKey::canonical(k, v)),
            )
            .chain(
                attribute_pairs(&filter.facts)
                    .chain(attribute_pairs(&filter.tags))
                    .map(|(k, v)| LookupKey::attribute(k, v)),
            );

        for key in keys {
            out.extend(self.identity.lookup_many(&key).iter().filter(admit).cloned());
        }
        out
    }

    fn in_insertion_order(&self, ids: HashSet<HostId>) -> Vec<Host> {
        let mut found: Vec<(usize, &Host)> = ids
            .iter()
            .filter_map(|id| self.hosts.get_full(id).map(|(pos, _, host)| (pos, host)))
            .collect();
        found.sort_unstable_by_key(|(pos, _)| *pos);
        found.into_iter().map(|(_, host)| host.clone()).collect()
    }
}

/// Thread-safe in-memory host store.
///
/// # Examples
///
/// ```
/// use hbi::{Filter, Host, HostStore, InMemoryHostStore};
///
/// let store = InMemoryHostStore::new();
/// let created = store
///     .create_or_update(vec![Host::new().canonical_fact("hostname", "a.example.com")])
///     .unwrap();
/// let id = created[0].id.clone().unwrap();
///
/// let found = store.get(&[Filter::new().id(id)]).unwrap();
/// assert_eq!(found.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryHostStore {
    config: StoreConfig,
    state: RwLock<StoreState>,
}

impl InMemoryHostStore {
    /// Create a new empty store with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty store.
    #[must_use]
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            config,
            state: RwLock::default(),
        }
    }

    /// The configuration this store was built with.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

impl HostStore for InMemoryHostStore {
    fn create_or_update(&self, candidates: Vec<Host>) -> HbiResult<Vec<Host>> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        validate_batch(&candidates)?;

        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("store.create_or_update"))?;

        let batch = candidates.len();
        let (hosts, created) = if self.config.resolution.can_reject() {
            // Resolution may still fail mid-batch; stage so a failure leaves
            // the live state untouched.
            let mut staged = state.clone();
            let applied = staged.upsert_all(candidates, &self.config)?;
            *state = staged;
            applied
        } else {
            state.upsert_all(candidates, &self.config)?
        };

        info!(
            batch,
            created,
            merged = batch - created,
            total = state.hosts.len(),
            "upsert batch applied"
        );
        Ok(hosts)
    }

    fn get(&self, filters: &[Filter]) -> HbiResult<Vec<Host>> {
        let state = self.state.read().map_err(|_| lock_err("store.get"))?;
        let hosts = state.query(filters);
        debug!(filters = filters.len(), matched = hosts.len(), "query evaluated");
        Ok(hosts)
    }

    fn reset(&self) -> HbiResult<()> {
        let mut state = self.state.write().map_err(|_| lock_err("store.reset"))?;
        let discarded = state.hosts.len();
        *state = StoreState::default();
        info!(discarded, "store reset");
        Ok(())
    }

    fn len(&self) -> HbiResult<usize> {
        let state = self.state.read().map_err(|_| lock_err("store.len"))?;
        Ok(state.hosts.len())
    }
}
