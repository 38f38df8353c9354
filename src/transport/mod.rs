//! gRPC transport layer for hbi.
//!
//! Translates `HostInventory` messages to and from [`Host`] and [`Filter`]
//! values and forwards them to a shared [`HostStore`]. Empty proto strings
//! stand for absent ids, display names and account numbers.

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::warn;

use crate::error::{HbiError, QueryError, TransportError};
use crate::filter::Filter;
use crate::host::{Host, HostId, Namespaced};
use crate::storage::HostStore;

/// Generated protobuf and gRPC types.
#[allow(missing_docs, clippy::pedantic)]
pub mod proto {
    tonic::include_proto!("hbi");
}

use proto::host_inventory_server::{HostInventory, HostInventoryServer};

// ----------------------------------------------------------------------------
// Limits (DoS protection)
// ----------------------------------------------------------------------------

/// Maximum number of hosts in one `CreateOrUpdate` batch.
pub const MAX_BATCH_HOSTS: usize = 50_000;

/// Maximum number of filters in one `Get` request.
pub const MAX_FILTERS: usize = 64;

/// gRPC service implementation for the host inventory.
pub struct HostInventoryService {
    store: Arc<dyn HostStore>,
}

impl HostInventoryService {
    /// Serves `store` over gRPC.
    #[must_use]
    pub fn new(store: Arc<dyn HostStore>) -> Self {
        Self { store }
    }

    /// Wraps the service for `tonic::transport::Server::add_service`.
    #[must_use]
    pub fn into_server(self) -> HostInventoryServer<Self> {
        HostInventoryServer::new(self)
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn insert_namespaced(target: &mut Namespaced, namespace: String, key: String, value: String) {
    target.entry(namespace).or_default().insert(key, value);
}

fn flatten_namespaced(values: Namespaced) -> impl Iterator<Item = (String, String, String)> {
    values.into_iter().flat_map(|(namespace, attrs)| {
        attrs
            .into_iter()
            .map(move |(key, value)| (namespace.clone(), key, value))
    })
}

/// Converts a wire host into a candidate.
#[must_use]
pub fn host_from_proto(msg: proto::Host) -> Host {
    let mut host = Host {
        id: non_empty(msg.id).map(HostId::from),
        display_name: non_empty(msg.display_name),
        account_number: non_empty(msg.account_number),
        ..Host::default()
    };
    for cf in msg.canonical_facts {
        host.canonical_facts.insert(cf.key, cf.value);
    }
    for f in msg.facts {
        insert_namespaced(&mut host.facts, f.namespace, f.key, f.value);
    }
    for t in msg.tags {
        insert_namespaced(&mut host.tags, t.namespace, t.key, t.value);
    }
    host
}

/// Converts a stored host into its wire form.
#[must_use]
pub fn host_to_proto(host: Host) -> proto::Host {
    proto::Host {
        id: host.id.map(String::from).unwrap_or_default(),
        display_name: host.display_name.unwrap_or_default(),
        account_number: host.account_number.unwrap_or_default(),
        canonical_facts: host
            .canonical_facts
            .into_iter()
            .map(|(key, value)| proto::CanonicalFact { key, value })
            .collect(),
        facts: flatten_namespaced(host.facts)
            .map(|(namespace, key, value)| proto::Fact {
                namespace,
                key,
                value,
            })
            .collect(),
        tags: flatten_namespaced(host.tags)
            .map(|(namespace, key, value)| proto::Tag {
                namespace,
                key,
                value,
            })
            .collect(),
    }
}

/// Converts the wire filter at position `index` into a query predicate.
///
/// A [`Filter`] holds one value per canonical fact and per namespaced fact or
/// tag key, so a wire filter giving one of them two different values cannot
/// be represented. Repeating the same value is harmless.
///
/// # Errors
///
/// Returns `QueryError::DuplicateCriterion` naming the offending field.
pub fn filter_from_proto(index: usize, msg: proto::Filter) -> Result<Filter, QueryError> {
    let mut filter = Filter {
        ids: msg.ids.into_iter().map(HostId::from).collect(),
        account_numbers: msg.account_numbers,
        ..Filter::default()
    };
    for cf in msg.canonical_facts {
        if let Some(previous) = filter.canonical_facts.insert(cf.key.clone(), cf.value.clone()) {
            if previous != cf.value {
                return Err(QueryError::DuplicateCriterion {
                    index,
                    field: format!("canonical_facts.{}", cf.key),
                });
            }
        }
    }
    for f in msg.facts {
        insert_criterion(&mut filter.facts, index, "facts", f.namespace, f.key, f.value)?;
    }
    for t in msg.tags {
        insert_criterion(&mut filter.tags, index, "tags", t.namespace, t.key, t.value)?;
    }
    Ok(filter)
}

fn insert_criterion(
    target: &mut Namespaced,
    index: usize,
    label: &str,
    namespace: String,
    key: String,
    value: String,
) -> Result<(), QueryError> {
    let attrs = target.entry(namespace.clone()).or_default();
    match attrs.get(&key) {
        Some(previous) if *previous != value => Err(QueryError::DuplicateCriterion {
            index,
            field: format!("{label}.{namespace}.{key}"),
        }),
        _ => {
            attrs.insert(key, value);
            Ok(())
        }
    }
}

fn check_len(what: &'static str, actual: usize, max: usize) -> Result<(), Status> {
    if actual > max {
        return Err(status_from_hbi_error(
            TransportError::PayloadTooLarge { what, actual, max }.into(),
        ));
    }
    Ok(())
}

fn status_from_hbi_error(err: HbiError) -> Status {
    match err {
        HbiError::Identity(e) => Status::invalid_argument(e.to_string()),
        HbiError::Query(e) => Status::invalid_argument(e.to_string()),
        HbiError::Conflict(e) => Status::failed_precondition(e.to_string()),
        HbiError::Transport(e) => Status::resource_exhausted(e.to_string()),
        HbiError::Internal { message } => {
            warn!(%message, "internal store error");
            Status::internal(message)
        }
    }
}

fn host_list(hosts: Vec<Host>) -> proto::HostList {
    proto::HostList {
        hosts: hosts.into_iter().map(host_to_proto).collect(),
    }
}

#[tonic::async_trait]
impl HostInventory for HostInventoryService {
    async fn create_or_update(
        &self,
        request: Request<proto::HostList>,
    ) -> Result<Response<proto::HostList>, Status> {
        let req = request.into_inner();
        check_len("hosts", req.hosts.len(), MAX_BATCH_HOSTS)?;

        let candidates = req.hosts.into_iter().map(host_from_proto).collect();
        let hosts = self
            .store
            .create_or_update(candidates)
            .map_err(status_from_hbi_error)?;
        Ok(Response::new(host_list(hosts)))
    }

    async fn get(
        &self,
        request: Request<proto::FilterList>,
    ) -> Result<Response<proto::HostList>, Status> {
        let req = request.into_inner();
        check_len("filters", req.filters.len(), MAX_FILTERS)?;

        let filters = req
            .filters
            .into_iter()
            .enumerate()
            .map(|(index, msg)| filter_from_proto(index, msg))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| status_from_hbi_error(err.into()))?;
        let hosts = self.store.get(&filters).map_err(status_from_hbi_error)?;
        Ok(Response::new(host_list(hosts)))
    }

    async fn reset(
        &self,
        _request: Request<proto::ResetRequest>,
    ) -> Result<Response<proto::ResetResponse>, Status> {
        self.store.reset().map_err(status_from_hbi_error)?;
        Ok(Response::new(proto::ResetResponse {}))
    }
}


pub use proto::host_inventory_client::HostInventoryClient;
