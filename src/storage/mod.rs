//! Host storage.
//!
//! [`HostStore`] is the interface collaborators use; [`InMemoryHostStore`] is
//! the volatile implementation that owns the record set and both indexes.

mod memory;
mod traits;

pub use memory::InMemoryHostStore;
pub use traits::HostStore;
