//! Error types for hbi.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! the failing condition. None of the core errors are retryable: they are
//! either caller bugs or identity ambiguities that need a human decision.

use thiserror::Error;

use crate::host::HostId;

/// Upsert candidates that cannot be identified.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Host at position {index} has neither an id nor any canonical fact")]
    MissingIdentity {
        index: usize,
    },
}

/// Query input that cannot be turned into a list of [`Filter`](crate::Filter) values.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Filter at position {index} gives '{field}' more than one value")]
    DuplicateCriterion {
        index: usize,
        field: String,
    },
}

/// Identity keys that would attach to more than one stored host.
#[derive(Debug, Error)]
pub enum ConflictError {
    #[error("Canonical facts match {} different hosts: {}", .candidates.len(), join_ids(.candidates))]
    AmbiguousIdentity {
        candidates: Vec<HostId>,
    },

    #[error("Lookup key {key} is already owned by host {owner}")]
    KeyOwned {
        key: String,
        owner: HostId,
    },
}

fn join_ids(ids: &[HostId]) -> String {
    ids.iter()
        .map(HostId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Transport errors raised while decoding requests.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Payload too large: {what} has {actual} entries (max: {max})")]
    PayloadTooLarge {
        what: &'static str,
        actual: usize,
        max: usize,
    },
}

/// Top-level error type for hbi.
#[derive(Debug, Error)]
pub enum HbiError {
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Conflict error: {0}")]
    Conflict(#[from] ConflictError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl HbiError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is an identity error.
    #[must_use]
    pub const fn is_identity(&self) -> bool {
        matches!(self, Self::Identity(_))
    }

    /// Returns true if this is a query error.
    #[must_use]
    pub const fn is_query(&self) -> bool {
        matches!(self, Self::Query(_))
    }

    /// Returns true if this is a conflict error.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns true if this is a transport error.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if this error is retryable.
    ///
    /// Always false: none of these failures go away on retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Identity(_)
            | Self::Query(_)
            | Self::Conflict(_)
            | Self::Transport(_)
            | Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for hbi operations.
pub type HbiResult<T> = Result<T, HbiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_error_missing() {
        let err = IdentityError::MissingIdentity { index: 3 };
        let msg = format!("{err}");
        assert!(msg.contains("position 3"));
        assert!(msg.contains("canonical fact"));
    }

    #[test]
    fn test_query_error_names_field() {
        let err = QueryError::DuplicateCriterion {
            index: 2,
            field: "canonical_facts.hostname".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("position 2"));
        assert!(msg.contains("canonical_facts.hostname"));
    }

    #[test]
    fn test_conflict_error_lists_candidates() {
        let err = ConflictError::AmbiguousIdentity {
            candidates: vec![HostId::from("a"), HostId::from("b")],
        };
        let msg = format!("{err}");
        assert!(msg.contains("2 different hosts"));
        assert!(msg.contains("a, b"));
    }

    #[test]
    fn test_hbi_error_from_identity() {
        let err: HbiError = IdentityError::MissingIdentity { index: 0 }.into();
        assert!(err.is_identity());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_hbi_error_from_query() {
        let err: HbiError = QueryError::DuplicateCriterion {
            index: 1,
            field: "tags.env".to_string(),
        }
        .into();
        assert!(err.is_query());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_hbi_error_from_conflict() {
        let err: HbiError = ConflictError::KeyOwned {
            key: "hostname=x".to_string(),
            owner: HostId::from("h1"),
        }
        .into();
        assert!(err.is_conflict());
        assert!(err.to_string().contains("hostname=x"));
    }

    #[test]
    fn test_hbi_error_internal() {
        let err = HbiError::internal("poisoned lock: store.get");
        assert!(err.is_internal());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("store.get"));
    }

    #[test]
    fn test_payload_too_large_is_not_retryable() {
        let err: HbiError = TransportError::PayloadTooLarge {
            what: "hosts",
            actual: 10,
            max: 5,
        }
        .into();
        assert!(err.is_transport());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("max: 5"));
    }
}
