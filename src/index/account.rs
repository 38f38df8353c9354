//! Account number -> hosts.

use std::collections::{HashMap, HashSet};

use crate::host::HostId;

/// O(1) lookup of every host in an account. Hosts without an account number
/// are not indexed.
#[derive(Debug, Clone, Default)]
pub struct AccountIndex {
    by_account: HashMap<String, HashSet<HostId>>,
}

impl AccountIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `id` to its account.
    pub fn insert(&mut self, id: &HostId, account: Option<&str>) {
        if let Some(account) = account {
            self.by_account
                .entry(account.to_string())
                .or_default()
                .insert(id.clone());
        }
    }

    /// Moves `id` between accounts after a merge changed its account number.
    pub fn reassign(&mut self, id: &HostId, old: Option<&str>, new: Option<&str>) {
        if old == new {
            return;
        }
        if let Some(old) = old {
            if let Some(set) = self.by_account.get_mut(old) {
                set.remove(id);
                if set.is_empty() {
                    self.by_account.remove(old);
                }
            }
        }
        self.insert(id, new);
    }

    /// Hosts registered under `account`.
    #[must_use]
    pub fn hosts(&self, account: &str) -> Option<&HashSet<HostId>> {
        self.by_account.get(account)
    }

    /// Number of accounts with at least one host.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_account.len()
    }

    /// Returns true if no account is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_account.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_groups_hosts_by_account() {
        let mut index = AccountIndex::new();
        let a = HostId::from("a");
        let b = HostId::from("b");
        index.insert(&a, Some("1"));
        index.insert(&b, Some("1"));
        index.insert(&HostId::from("c"), None);

        assert_eq!(index.hosts("1").map(HashSet::len), Some(2));
        assert!(index.hosts("2").is_none());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn reassign_moves_host_and_drops_empty_account() {
        let mut index = AccountIndex::new();
        let a = HostId::from("a");
        index.insert(&a, Some("1"));

        index.reassign(&a, Some("1"), Some("2"));
        assert!(index.hosts("1").is_none());
        assert!(index.hosts("2").is_some_and(|s| s.contains(&a)));

        index.reassign(&a, Some("2"), Some("2"));
        assert!(index.hosts("2").is_some_and(|s| s.contains(&a)));
    }
}
