//! Endpoint registry contract.
//!
//! The registry is the persisted set of known RPC endpoints, keyed by `(service id, url)`. The
//! crate never owns the storage engine: it consumes the four operations of [`EndpointRegistry`]
//! and ships [`InMemoryRegistry`] for tests and short-lived processes.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

mod memory;

pub use memory::InMemoryRegistry;

/// Priority given to endpoints that were not configured statically.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Logical service key. For EVM networks this is the decimal chain id.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    /// Wraps an already formatted identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric chain id, when the identifier is one.
    #[must_use]
    pub fn chain_id(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl From<u64> for ServiceId {
    fn from(chain_id: u64) -> Self {
        Self(chain_id.to_string())
    }
}

impl From<&str> for ServiceId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Health classification of an endpoint.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    #[default]
    Ok,
    Slow,
    Down,
}

impl EndpointStatus {
    /// Sort rank: `Ok` < `Slow` < `Down`.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            EndpointStatus::Ok => 0,
            EndpointStatus::Slow => 1,
            EndpointStatus::Down => 2,
        }
    }
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EndpointStatus::Ok => "ok",
            EndpointStatus::Slow => "slow",
            EndpointStatus::Down => "down",
        };
        f.write_str(s)
    }
}

/// Unique key of a registry row.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EndpointKey {
    pub service_id: ServiceId,
    pub url: String,
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.service_id, self.url)
    }
}

/// One physical RPC target for one logical service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRow {
    pub service_id: ServiceId,
    pub service_name: String,
    pub url: String,
    pub status: EndpointStatus,
    /// Last measured round trip. `None` when down or never probed.
    pub latency_ms: Option<u64>,
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Lower is preferred.
    pub priority: i32,
}

impl EndpointRow {
    #[must_use]
    pub fn key(&self) -> EndpointKey {
        EndpointKey { service_id: self.service_id.clone(), url: self.url.clone() }
    }

    /// Applies a health update in place, following the registry's field-level semantics.
    pub fn apply(&mut self, update: &HealthUpdate) {
        self.status = update.status;
        self.last_checked_at = Some(update.checked_at);
        if let Some(latency_ms) = update.latency_ms {
            self.latency_ms = latency_ms;
        }
    }
}

/// Insert-if-absent payload. Health fields start at their defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewEndpoint {
    pub service_id: ServiceId,
    pub service_name: String,
    pub url: String,
    pub priority: i32,
}

impl NewEndpoint {
    #[must_use]
    pub fn key(&self) -> EndpointKey {
        EndpointKey { service_id: self.service_id.clone(), url: self.url.clone() }
    }

    #[must_use]
    pub fn into_row(self) -> EndpointRow {
        EndpointRow {
            service_id: self.service_id,
            service_name: self.service_name,
            url: self.url,
            status: EndpointStatus::Ok,
            latency_ms: None,
            last_checked_at: None,
            priority: self.priority,
        }
    }
}

/// Partial update of a row's health fields.
///
/// `latency_ms` is a patch: `None` leaves the stored latency untouched, `Some(None)` clears it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealthUpdate {
    pub status: EndpointStatus,
    pub latency_ms: Option<Option<u64>>,
    pub checked_at: DateTime<Utc>,
}

impl HealthUpdate {
    /// Result of a full probe: status and latency are both rewritten.
    #[must_use]
    pub fn probed(status: EndpointStatus, latency_ms: Option<u64>) -> Self {
        Self { status, latency_ms: Some(latency_ms), checked_at: Utc::now() }
    }

    /// Status-only refresh used by request-path verification.
    #[must_use]
    pub fn status(status: EndpointStatus) -> Self {
        Self { status, latency_ms: None, checked_at: Utc::now() }
    }
}

/// Read/update contract of the persisted endpoint store.
///
/// Writes are idempotent health refreshes, so implementations need no row locking: concurrent
/// writers on the same row may resolve last-write-wins.
pub trait EndpointRegistry: Send + Sync + 'static {
    /// All rows of one service, in storage order.
    fn find_by_service(
        &self,
        service_id: &ServiceId,
    ) -> impl Future<Output = Result<Vec<EndpointRow>, RegistryError>> + Send;

    /// Every row of every service.
    fn find_all(&self) -> impl Future<Output = Result<Vec<EndpointRow>, RegistryError>> + Send;

    /// Inserts the row unless its key already exists. Returns `true` when a row was created.
    ///
    /// An existing row is never modified.
    fn insert_if_absent(
        &self,
        endpoint: NewEndpoint,
    ) -> impl Future<Output = Result<bool, RegistryError>> + Send;

    /// Applies a health update to an existing row.
    fn update(
        &self,
        key: &EndpointKey,
        update: HealthUpdate,
    ) -> impl Future<Output = Result<(), RegistryError>> + Send;
}

/// Distinct `(service id, display name)` pairs known to the registry, ordered by service id.
///
/// Numeric ids sort numerically, so chain `10` follows chain `8`.
pub async fn known_services<R: EndpointRegistry>(
    registry: &R,
) -> Result<Vec<(ServiceId, String)>, RegistryError> {
    let rows = registry.find_all().await?;

    let mut services: BTreeMap<(u64, ServiceId), String> = BTreeMap::new();
    for row in rows {
        let numeric = row.service_id.chain_id().unwrap_or(u64::MAX);
        services.entry((numeric, row.service_id)).or_insert(row.service_name);
    }

    Ok(services.into_iter().map(|((_, id), name)| (id, name)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_endpoint(service: u64, name: &str, url: &str) -> NewEndpoint {
        NewEndpoint {
            service_id: service.into(),
            service_name: name.into(),
            url: url.into(),
            priority: DEFAULT_PRIORITY,
        }
    }

    #[test]
    fn status_rank_orders_ok_slow_down() {
        assert!(EndpointStatus::Ok.rank() < EndpointStatus::Slow.rank());
        assert!(EndpointStatus::Slow.rank() < EndpointStatus::Down.rank());
    }

    #[test]
    fn status_only_update_keeps_latency() {
        let mut row = new_endpoint(1, "Ethereum", "https://a").into_row();
        row.apply(&HealthUpdate::probed(EndpointStatus::Slow, Some(1800)));
        assert_eq!(row.latency_ms, Some(1800));

        row.apply(&HealthUpdate::status(EndpointStatus::Down));
        assert_eq!(row.status, EndpointStatus::Down);
        assert_eq!(row.latency_ms, Some(1800));
        assert!(row.last_checked_at.is_some());
    }

    #[test]
    fn probed_down_clears_latency() {
        let mut row = new_endpoint(1, "Ethereum", "https://a").into_row();
        row.apply(&HealthUpdate::probed(EndpointStatus::Ok, Some(90)));
        row.apply(&HealthUpdate::probed(EndpointStatus::Down, None));
        assert_eq!(row.latency_ms, None);
    }

    #[tokio::test]
    async fn known_services_are_distinct_and_numerically_sorted() {
        let registry = InMemoryRegistry::new();
        for endpoint in [
            new_endpoint(137, "Polygon", "https://p1"),
            new_endpoint(10, "Optimism", "https://o1"),
            new_endpoint(137, "Polygon", "https://p2"),
            new_endpoint(8, "Ubiq", "https://u1"),
        ] {
            registry.insert_if_absent(endpoint).await.unwrap();
        }

        let services = known_services(&registry).await.unwrap();
        let ids: Vec<_> = services.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["8", "10", "137"]);
        assert_eq!(services[2].1, "Polygon");
    }
}
