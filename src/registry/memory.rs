//! In-memory registry backend.
//!
//! Rows live in RAM and are lost when the process exits. Insertion order is kept so
//! `find_by_service` returns rows in the order they were seeded.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{
    error::RegistryError,
    registry::{EndpointKey, EndpointRegistry, EndpointRow, HealthUpdate, NewEndpoint, ServiceId},
};

/// Registry kept in a mutex-guarded vector.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    rows: Mutex<Vec<EndpointRow>>,
}

impl InMemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry that already holds `rows`.
    #[must_use]
    pub fn with_rows(rows: impl IntoIterator<Item = EndpointRow>) -> Self {
        Self { rows: Mutex::new(rows.into_iter().collect()) }
    }

    /// Number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of a single row.
    #[must_use]
    pub fn get(&self, key: &EndpointKey) -> Option<EndpointRow> {
        self.lock()
            .iter()
            .find(|row| row.service_id == key.service_id && row.url == key.url)
            .cloned()
    }

    // Writes are whole-field assignments, so rows behind a poisoned lock are still consistent.
    fn lock(&self) -> MutexGuard<'_, Vec<EndpointRow>> {
        self.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EndpointRegistry for InMemoryRegistry {
    async fn find_by_service(
        &self,
        service_id: &ServiceId,
    ) -> Result<Vec<EndpointRow>, RegistryError> {
        Ok(self.lock().iter().filter(|row| &row.service_id == service_id).cloned().collect())
    }

    async fn find_all(&self) -> Result<Vec<EndpointRow>, RegistryError> {
        Ok(self.lock().clone())
    }

    async fn insert_if_absent(&self, endpoint: NewEndpoint) -> Result<bool, RegistryError> {
        let mut rows = self.lock();
        let exists = rows
            .iter()
            .any(|row| row.service_id == endpoint.service_id && row.url == endpoint.url);
        if exists {
            return Ok(false);
        }
        rows.push(endpoint.into_row());
        Ok(true)
    }

    async fn update(&self, key: &EndpointKey, update: HealthUpdate) -> Result<(), RegistryError> {
        let mut rows = self.lock();
        let row = rows
            .iter_mut()
            .find(|row| row.service_id == key.service_id && row.url == key.url)
            .ok_or_else(|| RegistryError::NotFound(key.clone()))?;
        row.apply(&update);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{DEFAULT_PRIORITY, EndpointStatus};

    fn endpoint(url: &str, priority: i32) -> NewEndpoint {
        NewEndpoint {
            service_id: 1u64.into(),
            service_name: "Ethereum".into(),
            url: url.into(),
            priority,
        }
    }

    #[tokio::test]
    async fn insert_if_absent_never_overwrites() {
        let registry = InMemoryRegistry::new();
        assert!(registry.insert_if_absent(endpoint("https://a", 1)).await.unwrap());

        let key = endpoint("https://a", 1).key();
        let update = HealthUpdate::probed(EndpointStatus::Slow, Some(2000));
        registry.update(&key, update).await.unwrap();

        assert!(!registry.insert_if_absent(endpoint("https://a", DEFAULT_PRIORITY)).await.unwrap());

        let row = registry.get(&key).unwrap();
        assert_eq!(row.priority, 1);
        assert_eq!(row.status, EndpointStatus::Slow);
        assert_eq!(row.latency_ms, Some(2000));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn same_url_on_different_services_is_two_rows() {
        let registry = InMemoryRegistry::new();
        registry.insert_if_absent(endpoint("https://shared", 1)).await.unwrap();
        let mut other = endpoint("https://shared", 1);
        other.service_id = 10u64.into();
        assert!(registry.insert_if_absent(other).await.unwrap());

        assert_eq!(registry.find_by_service(&1u64.into()).await.unwrap().len(), 1);
        assert_eq!(registry.find_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_of_missing_row_is_not_found() {
        let registry = InMemoryRegistry::new();
        let key = endpoint("https://missing", 1).key();

        let result = registry.update(&key, HealthUpdate::status(EndpointStatus::Down)).await;
        assert!(matches!(result, Err(RegistryError::NotFound(k)) if k == key));
    }
}
