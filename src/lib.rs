//! # hbi - Host-Based Inventory
//!
//! An in-memory record store for hosts that have no single primary key.
//! A host is identified by any of its *canonical facts* (hostname,
//! insights_id, ...). Submitting a host that shares a canonical fact with a
//! stored one merges into it instead of creating a duplicate.
//!
//! ## Core Concepts
//!
//! - **Host**: one real machine, with canonical facts, namespaced facts and tags
//! - **Identity resolution**: finding the stored host a candidate refers to
//! - **Merge**: folding a newer snapshot into the stored host, keeping every index in sync
//! - **Filter**: a query predicate; criteria inside one filter are ORed, filters are ANDed
//!
//! ## Usage
//!
//! ```rust
//! use hbi::{Filter, Host, HostStore, InMemoryHostStore};
//!
//! let store = InMemoryHostStore::new();
//!
//! let first = store.create_or_update(vec![Host::new()
//!     .canonical_fact("insights_id", "1234")
//!     .canonical_fact("hostname", "x.example.com")])?;
//!
//! let second = store.create_or_update(vec![Host::new()
//!     .canonical_fact("hostname", "x.example.com")
//!     .fact("advisor", "cpu.count", "4")])?;
//!
//! assert_eq!(first[0].id, second[0].id);
//! assert_eq!(second[0].canonical_facts["insights_id"], "1234");
//!
//! let id = second[0].id.clone().unwrap();
//! let found = store.get(&[Filter::new().id(id)])?;
//! assert_eq!(found[0].fact_value("advisor", "cpu.count"), Some("4"));
//! # Ok::<(), hbi::HbiError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod filter;
pub mod host;
pub mod index;
pub mod storage;

/// gRPC transport (server and client).
#[cfg(feature = "transport-grpc")]
pub mod transport;

// Re-export primary types at crate root for convenience
pub use config::{ResolutionPolicy, StoreConfig};
pub use error::{ConflictError, HbiError, HbiResult, IdentityError, QueryError, TransportError};
pub use filter::Filter;
pub use host::{attribute_pairs, CanonicalFacts, Host, HostId, Namespaced};
pub use index::{AccountIndex, IdentityIndex, Lookup, LookupKey};
pub use storage::{HostStore, InMemoryHostStore};
