mod common;

use std::{sync::Arc, time::Duration};

use approval_scanner::{
    ConnectionConfig, ConnectionError, EndpointSelector, EndpointStatus, HealthConfig,
    HealthProber, InMemoryRegistry, ProbeOutcome, SelectorConfig,
    test_utils::{MockConnector, endpoint_row, push_failure, push_head},
};

use crate::common::{BACKUP, PRIMARY};

#[tokio::test]
async fn refresh_reorders_selection() -> anyhow::Result<()> {
    let registry = Arc::new(InMemoryRegistry::with_rows([
        endpoint_row(1u64, PRIMARY, EndpointStatus::Ok, Some(10), 1),
        endpoint_row(1u64, BACKUP, EndpointStatus::Down, None, 100),
    ]));
    let connector = Arc::new(MockConnector::new());
    push_failure(&connector.endpoint(PRIMARY), "service unavailable");
    push_head(&connector.endpoint(BACKUP), 500);

    let prober = HealthProber::new(
        Arc::clone(&registry),
        Arc::clone(&connector),
        HealthConfig::default().probe_timeout(Duration::from_secs(1)),
    );
    let reports = prober.probe_all().await?;
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].outcome.status(), EndpointStatus::Down);
    assert_eq!(reports[1].outcome.status(), EndpointStatus::Ok);

    push_head(&connector.endpoint(BACKUP), 501);
    let selector = EndpointSelector::new(
        Arc::clone(&registry),
        Arc::clone(&connector),
        SelectorConfig::default().connection(ConnectionConfig::fragile()),
    );
    let connection = selector.select(&1u64.into()).await?;

    assert_eq!(connection.endpoint().url, BACKUP);
    assert_eq!(connector.attempts_for(PRIMARY), 1);
    Ok(())
}

#[tokio::test]
async fn probe_latency_is_recorded() -> anyhow::Result<()> {
    let row = endpoint_row(56u64, PRIMARY, EndpointStatus::Down, None, 1);
    let registry = Arc::new(InMemoryRegistry::with_rows([row.clone()]));
    let connector = Arc::new(MockConnector::new());
    push_head(&connector.endpoint(PRIMARY), 1);

    let prober = HealthProber::new(Arc::clone(&registry), connector, HealthConfig::default());
    let outcome = prober.probe(&row).await;
    assert!(outcome.is_up());

    let stored = registry.get(&row.key()).expect("row exists");
    assert_eq!(stored.status, EndpointStatus::Ok);
    assert!(stored.latency_ms.is_some_and(|ms| ms < 1500));
    Ok(())
}

#[tokio::test]
async fn probe_timeout_marks_endpoint_down() -> anyhow::Result<()> {
    let connector = Arc::new(MockConnector::new());
    let url = connector.unresponsive_endpoint()?;
    let row = endpoint_row(1u64, &url, EndpointStatus::Ok, Some(40), 1);
    let registry = Arc::new(InMemoryRegistry::with_rows([row.clone()]));

    let prober = HealthProber::new(
        Arc::clone(&registry),
        connector,
        HealthConfig::default().probe_timeout(Duration::from_millis(200)),
    );
    let outcome = prober.probe(&row).await;
    assert!(matches!(outcome, ProbeOutcome::Down { error: ConnectionError::Timeout }));

    let stored = registry.get(&row.key()).expect("row exists");
    assert_eq!(stored.status, EndpointStatus::Down);
    assert_eq!(stored.latency_ms, None);
    assert!(stored.last_checked_at.is_some());
    Ok(())
}
