use std::{env, sync::Arc};

use alloy::primitives::Address;
use approval_scanner::{
    ApprovalScanner, BootstrapLoader, Config, EndpointSelector, HealthMonitor, HealthProber,
    HttpConnector, HttpDirectory, InMemoryRegistry, ScanEvent, ServiceId,
    default_static_services,
};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// Usage: scan_approvals <owner address> [chain id]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).try_init();

    let mut args = env::args().skip(1);
    let owner: Address = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: scan_approvals <owner address> [chain id]"))?
        .parse()?;
    let service_id = ServiceId::new(args.next().unwrap_or_else(|| "1".to_owned()));

    let config = Config::from_env()?;
    let registry = Arc::new(InMemoryRegistry::new());
    let connector = Arc::new(HttpConnector);

    let static_services =
        default_static_services().into_iter().map(|service| service.resolve_from_env()).collect();
    let report = BootstrapLoader::new(
        Arc::clone(&registry),
        HttpDirectory::new(&config.bootstrap)?,
        config.bootstrap.clone(),
    )
    .with_static_services(static_services)
    .seed()
    .await?;
    info!("Seeded {} endpoints ({} already known)", report.inserted, report.existing);

    let prober = HealthProber::new(Arc::clone(&registry), Arc::clone(&connector), config.health);
    let monitor = HealthMonitor::spawn(prober, CancellationToken::new());

    let selector = EndpointSelector::new(registry, connector, config.selector);
    let scanner = ApprovalScanner::new(selector, config.scan)?;

    match scanner.scan(&service_id, owner).await {
        Ok(mut subscription) => {
            while let Some(event) = subscription.next().await {
                if let ScanEvent::Error { message, .. } = &event {
                    error!("Scan error: {message}");
                }
                println!("{}", serde_json::to_string(&event)?);
            }
        }
        Err(e) => error!("Scan could not start: {e}"),
    }

    monitor.shutdown().await;
    Ok(())
}
