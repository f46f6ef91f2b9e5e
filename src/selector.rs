//! Request-path failover between the endpoints of one service.

use std::{collections::HashSet, sync::Arc};

use crate::{
    config::SelectorConfig,
    connection::{Connector, EndpointConnection, fetch_head},
    error::{ConnectionError, SelectError},
    health::rank_rows,
    registry::{EndpointRegistry, EndpointRow, EndpointStatus, HealthUpdate, ServiceId},
};

/// Hands out verified connections, best-ranked endpoint first.
///
/// Stored health is only a ranking hint: every candidate gets a short live head check before it
/// is returned, and a candidate failing that check is marked `Down` on the spot.
pub struct EndpointSelector<R, C> {
    registry: Arc<R>,
    connector: Arc<C>,
    config: SelectorConfig,
}

impl<R, C> Clone for EndpointSelector<R, C> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            connector: Arc::clone(&self.connector),
            config: self.config.clone(),
        }
    }
}

impl<R: EndpointRegistry, C: Connector> EndpointSelector<R, C> {
    #[must_use]
    pub fn new(registry: Arc<R>, connector: Arc<C>, config: SelectorConfig) -> Self {
        Self { registry, connector, config }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    /// Return a connection to the first candidate that passes the live check.
    ///
    /// Candidates are tried in [`rank_rows`](crate::health::rank_rows) order, skipping rows
    /// already `Down`. When a pass is exhausted the row set is re-read once, since a background
    /// probe may have revived an endpoint in the meantime. Rows demoted during this call are not
    /// tried again.
    ///
    /// # Errors
    ///
    /// * [`SelectError::NotConfigured`] if the service has no rows at all.
    /// * [`SelectError::NoHealthyEndpoint`] if both passes are exhausted.
    /// * [`SelectError::Registry`] if the row set cannot be read.
    pub async fn select(&self, service_id: &ServiceId) -> Result<EndpointConnection, SelectError> {
        let mut rows = self.registry.find_by_service(service_id).await?;
        if rows.is_empty() {
            return Err(SelectError::NotConfigured(service_id.clone()));
        }

        let mut demoted = HashSet::new();
        for pass in 0..2 {
            if pass > 0 {
                debug!(service_id = %service_id, "Candidates exhausted, re-reading registry");
                rows = self.registry.find_by_service(service_id).await?;
            }

            rank_rows(&mut rows);
            for row in &rows {
                if row.status == EndpointStatus::Down || demoted.contains(&row.url) {
                    continue;
                }
                match self.verify(row).await {
                    Ok(connection) => return Ok(connection),
                    Err(e) => {
                        warn!(
                            service_id = %service_id,
                            url = %row.url,
                            error = %e,
                            "Live check failed, marking endpoint down"
                        );
                        self.persist(row, EndpointStatus::Down).await;
                        demoted.insert(row.url.clone());
                    }
                }
            }
        }

        error!(service_id = %service_id, "No healthy RPC endpoint");
        Err(SelectError::NoHealthyEndpoint(service_id.clone()))
    }

    async fn verify(&self, row: &EndpointRow) -> Result<EndpointConnection, ConnectionError> {
        let provider = self.connector.connect(row).await?;
        let head = fetch_head(&provider, self.config.live_check_timeout).await?;
        debug!(service_id = %row.service_id, url = %row.url, head = head, "Endpoint verified");

        // A single success never upgrades `Slow`; only the background prober does.
        let status = match row.status {
            EndpointStatus::Ok => EndpointStatus::Ok,
            EndpointStatus::Slow | EndpointStatus::Down => EndpointStatus::Slow,
        };
        self.persist(row, status).await;

        Ok(EndpointConnection::new(provider, row.key(), &self.config.connection))
    }

    async fn persist(&self, row: &EndpointRow, status: EndpointStatus) {
        if let Err(e) = self.registry.update(&row.key(), HealthUpdate::status(status)).await {
            warn!(url = %row.url, error = %e, "Failed to persist endpoint status");
        }
    }
}
