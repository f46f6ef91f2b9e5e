use std::time::Duration;

use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};
use tokio_util::sync::CancellationToken;

use crate::{
    connection::Connector,
    health::HealthProber,
    registry::EndpointRegistry,
};

const MIN_RECHECK_INTERVAL: Duration = Duration::from_millis(1);

/// Background task re-probing every registry row at the recheck interval.
///
/// The first refresh starts immediately. Refreshes never overlap: a refresh that outlasts the
/// interval delays the next one.
#[derive(Debug)]
pub struct HealthMonitor {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl HealthMonitor {
    /// Spawn the refresh loop on the current runtime. It runs until `token` is cancelled.
    pub fn spawn<R, C>(prober: HealthProber<R, C>, token: CancellationToken) -> Self
    where
        R: EndpointRegistry,
        C: Connector,
    {
        let period = prober.config().recheck_interval.max(MIN_RECHECK_INTERVAL);
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_secs = period.as_secs(), "Health monitor started");

            loop {
                tokio::select! {
                    () = task_token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    () = task_token.cancelled() => break,
                    result = prober.probe_all() => match result {
                        Ok(reports) => {
                            let up = reports.iter().filter(|r| r.outcome.is_up()).count();
                            debug!(total = reports.len(), up = up, "Health refresh finished");
                        }
                        Err(e) => error!(error = %e, "Health refresh could not read the registry"),
                    }
                }
            }

            info!("Health monitor stopped");
        });

        Self { token, handle }
    }

    /// Request the loop to stop. An in-flight probe is abandoned.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel the loop and wait for the task to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            error!(error = %e, "Health monitor task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::HealthConfig,
        registry::{EndpointStatus, InMemoryRegistry},
        test_utils::{MockConnector, endpoint_row, push_failure, push_head},
    };

    async fn wait_for(condition: impl Fn() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not met in time");
    }

    #[tokio::test]
    async fn first_refresh_runs_immediately() {
        let row = endpoint_row(1u64, "https://a", EndpointStatus::Down, None, 1);
        let registry = Arc::new(InMemoryRegistry::with_rows([row.clone()]));
        let connector = Arc::new(MockConnector::new());
        push_head(&connector.endpoint("https://a"), 1);

        let prober = HealthProber::new(
            Arc::clone(&registry),
            Arc::clone(&connector),
            HealthConfig::default(),
        );
        let monitor = HealthMonitor::spawn(prober, CancellationToken::new());

        let key = row.key();
        wait_for(|| registry.get(&key).is_some_and(|r| r.status == EndpointStatus::Ok)).await;

        monitor.shutdown().await;
        assert_eq!(connector.attempts_for("https://a"), 1);
    }

    #[tokio::test]
    async fn refresh_repeats_until_cancelled() {
        let row = endpoint_row(1u64, "https://a", EndpointStatus::Ok, None, 1);
        let registry = Arc::new(InMemoryRegistry::with_rows([row.clone()]));
        let connector = Arc::new(MockConnector::new());
        let asserter = connector.endpoint("https://a");
        push_head(&asserter, 1);
        for _ in 0..100 {
            push_failure(&asserter, "upstream unavailable");
        }

        let config = HealthConfig::default().recheck_interval(Duration::from_millis(20));
        let prober = HealthProber::new(Arc::clone(&registry), Arc::clone(&connector), config);
        let token = CancellationToken::new();
        let monitor = HealthMonitor::spawn(prober, token.clone());

        // Every refresh after the first fails.
        let key = row.key();
        wait_for(|| registry.get(&key).is_some_and(|r| r.status == EndpointStatus::Down)).await;
        assert!(connector.attempts_for("https://a") >= 2);

        token.cancel();
        wait_for(|| monitor.is_finished()).await;
    }
}
