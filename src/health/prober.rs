use std::{sync::Arc, time::Duration};

use tokio::time::Instant;

use crate::{
    config::HealthConfig,
    connection::{Connector, fetch_head},
    error::{ConnectionError, RegistryError},
    registry::{EndpointKey, EndpointRegistry, EndpointRow, EndpointStatus, HealthUpdate},
};

/// Result of probing one endpoint. Always persisted before it is returned.
#[derive(Clone, Debug)]
pub enum ProbeOutcome {
    /// The head fetch answered within the probe timeout.
    Up { status: EndpointStatus, latency: Duration, head: u64 },
    /// Timeout, transport failure or an unusable connection string.
    Down { error: ConnectionError },
}

impl ProbeOutcome {
    /// Status written to the registry for this outcome.
    #[must_use]
    pub fn status(&self) -> EndpointStatus {
        match self {
            ProbeOutcome::Up { status, .. } => *status,
            ProbeOutcome::Down { .. } => EndpointStatus::Down,
        }
    }

    #[must_use]
    pub fn is_up(&self) -> bool {
        matches!(self, ProbeOutcome::Up { .. })
    }
}

/// Per-row entry of [`HealthProber::probe_all`].
#[derive(Clone, Debug)]
pub struct ProbeReport {
    pub endpoint: EndpointKey,
    pub outcome: ProbeOutcome,
}

/// Measures liveness and latency of registry rows and writes the result back.
pub struct HealthProber<R, C> {
    registry: Arc<R>,
    connector: Arc<C>,
    config: HealthConfig,
}

impl<R, C> Clone for HealthProber<R, C> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            connector: Arc::clone(&self.connector),
            config: self.config.clone(),
        }
    }
}

impl<R: EndpointRegistry, C: Connector> HealthProber<R, C> {
    #[must_use]
    pub fn new(registry: Arc<R>, connector: Arc<C>, config: HealthConfig) -> Self {
        Self { registry, connector, config }
    }

    #[must_use]
    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Probe one endpoint and persist the outcome.
    ///
    /// A head fetch answered in under `slow_threshold` is `Ok`, anything slower but inside
    /// `probe_timeout` is `Slow`, everything else is `Down` with its latency cleared. Failures
    /// never propagate; a failed registry write is logged and the outcome is still returned.
    pub async fn probe(&self, row: &EndpointRow) -> ProbeOutcome {
        let started = Instant::now();
        let outcome = match self.fetch(row).await {
            Ok(head) => {
                let latency = started.elapsed();
                let status = if latency < self.config.slow_threshold {
                    EndpointStatus::Ok
                } else {
                    EndpointStatus::Slow
                };
                ProbeOutcome::Up { status, latency, head }
            }
            Err(error) => ProbeOutcome::Down { error },
        };

        let update = match &outcome {
            ProbeOutcome::Up { status, latency, .. } => {
                HealthUpdate::probed(*status, Some(millis(*latency)))
            }
            ProbeOutcome::Down { .. } => HealthUpdate::probed(EndpointStatus::Down, None),
        };
        if let Err(e) = self.registry.update(&row.key(), update).await {
            error!(
                service_id = %row.service_id,
                url = %row.url,
                error = %e,
                "Failed to persist probe result"
            );
        }

        outcome
    }

    /// Probe every registry row, one after another.
    ///
    /// # Errors
    ///
    /// Only reading the row set can fail; individual probe failures are part of the report.
    pub async fn probe_all(&self) -> Result<Vec<ProbeReport>, RegistryError> {
        let rows = self.registry.find_all().await?;
        debug!(rows = rows.len(), "Refreshing endpoint health");

        let mut reports = Vec::with_capacity(rows.len());
        for row in rows {
            let outcome = self.probe(&row).await;
            match &outcome {
                ProbeOutcome::Up { status, latency, .. } => {
                    info!(
                        service_id = %row.service_id,
                        url = %row.url,
                        status = %status,
                        latency_ms = millis(*latency),
                        "Endpoint up"
                    );
                }
                ProbeOutcome::Down { error } => {
                    warn!(
                        service_id = %row.service_id,
                        url = %row.url,
                        error = %error,
                        "Endpoint down"
                    );
                }
            }
            reports.push(ProbeReport { endpoint: row.key(), outcome });
        }
        Ok(reports)
    }

    async fn fetch(&self, row: &EndpointRow) -> Result<u64, ConnectionError> {
        let provider = self.connector.connect(row).await?;
        fetch_head(&provider, self.config.probe_timeout).await
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        registry::InMemoryRegistry,
        test_utils::{MockConnector, endpoint_row, push_failure, push_head},
    };

    fn prober(
        rows: Vec<EndpointRow>,
        config: HealthConfig,
    ) -> (HealthProber<InMemoryRegistry, MockConnector>, Arc<InMemoryRegistry>, Arc<MockConnector>)
    {
        let registry = Arc::new(InMemoryRegistry::with_rows(rows));
        let connector = Arc::new(MockConnector::new());
        let prober = HealthProber::new(Arc::clone(&registry), Arc::clone(&connector), config);
        (prober, registry, connector)
    }

    #[tokio::test]
    async fn fast_answer_is_ok_with_latency() {
        let row = endpoint_row(1u64, "https://a", EndpointStatus::Down, None, 1);
        let (prober, registry, connector) = prober(vec![row.clone()], HealthConfig::default());
        push_head(&connector.endpoint("https://a"), 42);

        let outcome = prober.probe(&row).await;
        assert!(matches!(outcome, ProbeOutcome::Up { status: EndpointStatus::Ok, head: 42, .. }));

        let stored = registry.get(&row.key()).unwrap();
        assert_eq!(stored.status, EndpointStatus::Ok);
        assert!(stored.latency_ms.is_some());
        assert!(stored.last_checked_at.is_some());
    }

    #[tokio::test]
    async fn answer_at_threshold_is_slow() {
        let row = endpoint_row(1u64, "https://a", EndpointStatus::Ok, None, 1);
        let config = HealthConfig::default().slow_threshold(Duration::ZERO);
        let (prober, registry, connector) = prober(vec![row.clone()], config);
        push_head(&connector.endpoint("https://a"), 42);

        assert_eq!(prober.probe(&row).await.status(), EndpointStatus::Slow);
        assert_eq!(registry.get(&row.key()).unwrap().status, EndpointStatus::Slow);
    }

    #[tokio::test]
    async fn failure_marks_down_and_clears_latency() {
        let row = endpoint_row(1u64, "https://a", EndpointStatus::Ok, Some(80), 1);
        let (prober, registry, connector) = prober(vec![row.clone()], HealthConfig::default());
        push_failure(&connector.endpoint("https://a"), "upstream unavailable");

        let outcome = prober.probe(&row).await;
        assert!(matches!(outcome, ProbeOutcome::Down { error: ConnectionError::Rpc(_) }));

        let stored = registry.get(&row.key()).unwrap();
        assert_eq!(stored.status, EndpointStatus::Down);
        assert_eq!(stored.latency_ms, None);
        assert!(stored.last_checked_at.is_some());
    }

    #[tokio::test]
    async fn probe_all_reports_every_row() {
        let rows = vec![
            endpoint_row(1u64, "https://a", EndpointStatus::Ok, None, 1),
            endpoint_row(137u64, "https://b", EndpointStatus::Ok, None, 100),
        ];
        let (prober, registry, connector) = prober(rows, HealthConfig::default());
        push_head(&connector.endpoint("https://a"), 7);

        let reports = prober.probe_all().await.unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports[0].outcome.is_up());
        assert!(!reports[1].outcome.is_up());

        let down = registry.find_by_service(&137u64.into()).await.unwrap();
        assert_eq!(down[0].status, EndpointStatus::Down);
    }
}
