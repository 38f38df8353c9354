//! Store configuration.
//!
//! Two behaviours of the store are policy decisions rather than invariants:
//! what happens when a candidate's canonical facts point at more than one
//! stored host, and whether merges rewrite the fact/tag index eagerly.
//! Defaults match the historical behaviour of the service.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HbiError, HbiResult};

/// How identity resolution treats canonical facts that hit several hosts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPolicy {
    /// The first canonical fact (in candidate order) that hits wins. Other
    /// hits are not looked at.
    #[default]
    FirstMatch,
    /// Every canonical fact is looked up, even when the candidate carries an
    /// id. Hits on two different hosts, or on a host other than the one the
    /// id names, fail the upsert with `ConflictError::AmbiguousIdentity`.
    RejectAmbiguous,
}

impl ResolutionPolicy {
    /// Returns true if resolution under this policy can fail mid-batch.
    #[must_use]
    pub const fn can_reject(self) -> bool {
        matches!(self, Self::RejectAmbiguous)
    }
}

/// Configuration for [`InMemoryHostStore`](crate::InMemoryHostStore).
///
/// # Examples
///
/// ```
/// use hbi::{ResolutionPolicy, StoreConfig};
///
/// let config = StoreConfig::from_json_str(r#"{"resolution": "reject_ambiguous"}"#).unwrap();
/// assert_eq!(config.resolution, ResolutionPolicy::RejectAmbiguous);
/// assert!(!config.reindex_attributes_on_merge);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Ambiguity policy for canonical fact resolution.
    pub resolution: ResolutionPolicy,

    /// When false (default), a merge only adds fact/tag index entries: a host
    /// stays discoverable by values it no longer carries. When true, the old
    /// fact/tag entries are removed before the merged ones are added, so
    /// queries see exactly the current state at a higher cost per merge.
    pub reindex_attributes_on_merge: bool,
}

impl StoreConfig {
    /// Parses a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `HbiError::Internal` if the document is not a valid config.
    pub fn from_json_str(raw: &str) -> HbiResult<Self> {
        serde_json::from_str(raw).map_err(|e| HbiError::internal(format!("invalid store config: {e}")))
    }

    /// Reads and parses a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns `HbiError::Internal` if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> HbiResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            HbiError::internal(format!("failed to read store config {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_historical_behaviour() {
        let config = StoreConfig::default();
        assert_eq!(config.resolution, ResolutionPolicy::FirstMatch);
        assert!(!config.reindex_attributes_on_merge);
        assert!(!config.resolution.can_reject());
    }

    #[test]
    fn empty_document_gives_defaults() {
        assert_eq!(StoreConfig::from_json_str("{}").unwrap(), StoreConfig::default());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = StoreConfig::from_json_str(r#"{"resolve": "first_match"}"#).unwrap_err();
        assert!(err.is_internal());
        assert!(err.to_string().contains("invalid store config"));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = StoreConfig::from_json_file("/nonexistent/hbi.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/hbi.json"));
    }
}
