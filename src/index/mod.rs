//! Lookup structures behind the host store.
//!
//! Both indexes store [`HostId`](crate::HostId)s, never hosts: the record set
//! owned by the store is the single home of every host.

mod account;
mod identity;

pub use account::AccountIndex;
pub use identity::{IdentityIndex, Lookup, LookupKey};
