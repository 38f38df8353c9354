//! Abstract store interface for hbi.
//!
//! Transports and harnesses talk to the inventory through [`HostStore`] so
//! they can share one store behind `Arc<dyn HostStore>`.

use crate::error::HbiResult;
use crate::filter::Filter;
use crate::host::Host;

/// The three operations the inventory exposes to its collaborators.
///
/// # Concurrency
/// - Upsert batches and reset are serialized against everything else
/// - Queries may run concurrently with each other, never with an upsert
pub trait HostStore: Send + Sync {
    /// Creates or merges every candidate, in order.
    ///
    /// Returns one canonical host per candidate, in input order and not
    /// deduplicated: two candidates resolving to the same host both appear,
    /// each as a snapshot taken right after that candidate was applied.
    ///
    /// The batch is atomic: it is validated in full before anything is
    /// applied, and a failure leaves the store unchanged.
    ///
    /// A candidate whose id is not stored is treated as new and receives a
    /// fresh id.
    ///
    /// # Errors
    /// - `IdentityError`: a candidate has no id and no canonical fact
    /// - `ConflictError`: canonical facts point at more than one host, or at
    ///   a host other than the one named by the id, under
    ///   `ResolutionPolicy::RejectAmbiguous`
    fn create_or_update(&self, candidates: Vec<Host>) -> HbiResult<Vec<Host>>;

    /// Returns every host matching all `filters`; every host if there are none.
    ///
    /// A filter with no criteria matches nothing, so any list containing one
    /// yields an empty result.
    fn get(&self, filters: &[Filter]) -> HbiResult<Vec<Host>>;

    /// Discards all hosts and index entries.
    fn reset(&self) -> HbiResult<()>;

    /// Number of stored hosts.
    fn len(&self) -> HbiResult<usize>;

    /// Returns true if no host is stored.
    fn is_empty(&self) -> HbiResult<bool> {
        Ok(self.len()? == 0)
    }
}
