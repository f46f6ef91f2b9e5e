//! Registry seeding from static configuration and a public network directory.
//!
//! Seeding only ever inserts missing `(service id, url)` pairs, so it is safe to run on every
//! start: existing rows keep their priority and health fields.

use std::{collections::HashSet, env, sync::Arc, time::Duration};

use serde::Deserialize;
use serde_json::Value;

use crate::{
    config::{BootstrapConfig, STATIC_PRIORITY},
    error::{DirectoryError, RegistryError},
    registry::{DEFAULT_PRIORITY, EndpointRegistry, NewEndpoint, ServiceId},
};

/// Well-known networks: chain id, display name, environment variable holding the endpoint.
pub const STATIC_SERVICES: [(u64, &str, &str); 8] = [
    (1, "Ethereum", "ETHEREUM_RPC"),
    (56, "BSC", "BSC_RPC"),
    (137, "Polygon", "POLYGON_RPC"),
    (42161, "Arbitrum", "ARBITRUM_RPC"),
    (10, "Optimism", "OPTIMISM_RPC"),
    (43114, "Avalanche", "AVALANCHE_RPC"),
    (8453, "Base", "BASE_RPC"),
    (250, "Fantom", "FANTOM_RPC"),
];

/// An operator-configured service. Only services with an endpoint are seeded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticService {
    pub service_id: ServiceId,
    pub name: String,
    pub env_var: String,
    pub endpoint: Option<String>,
}

impl StaticService {
    #[must_use]
    pub fn new(
        service_id: impl Into<ServiceId>,
        name: impl Into<String>,
        env_var: impl Into<String>,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            name: name.into(),
            env_var: env_var.into(),
            endpoint: None,
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Fill the endpoint from the service's environment variable.
    #[must_use]
    pub fn resolve_from_env(self) -> Self {
        self.resolve_with(|var| env::var(var).ok())
    }

    /// Fill the endpoint from `lookup`. Unset and blank values leave the service unconfigured.
    #[must_use]
    pub fn resolve_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        self.endpoint = lookup(&self.env_var)
            .map(|url| url.trim().to_owned())
            .filter(|url| !url.is_empty());
        self
    }
}

/// The [`STATIC_SERVICES`] table, without endpoints.
#[must_use]
pub fn default_static_services() -> Vec<StaticService> {
    STATIC_SERVICES
        .iter()
        .map(|&(chain_id, name, env_var)| StaticService::new(chain_id, name, env_var))
        .collect()
}

/// One service listed by the public directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub service_id: ServiceId,
    pub name: Option<String>,
    pub candidate_urls: Vec<String>,
}

/// Source of publicly known services.
pub trait DirectorySource: Send + Sync {
    /// Fetch every listed service.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing cannot be retrieved or is not a JSON array.
    fn fetch(&self) -> impl Future<Output = Result<Vec<DirectoryEntry>, DirectoryError>> + Send;
}

/// Fixed listing, used when no network directory is wanted.
#[derive(Clone, Debug, Default)]
pub struct StaticDirectory(pub Vec<DirectoryEntry>);

impl DirectorySource for StaticDirectory {
    async fn fetch(&self) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        Ok(self.0.clone())
    }
}

/// A chainid.network style `chains.json` served over HTTP.
#[derive(Clone, Debug)]
pub struct HttpDirectory {
    client: reqwest::Client,
    url: String,
}

impl HttpDirectory {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &BootstrapConfig) -> Result<Self, DirectoryError> {
        Self::with_timeout(config.directory_url.clone(), config.directory_timeout)
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url: url.into() })
    }
}

impl DirectorySource for HttpDirectory {
    async fn fetch(&self) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        debug!(url = %self.url, "Fetching service directory");
        let body: Value =
            self.client.get(&self.url).send().await?.error_for_status()?.json().await?;
        parse_directory(body)
    }
}

#[derive(Deserialize)]
struct RawChain {
    #[serde(rename = "chainId", default)]
    chain_id: Value,
    #[serde(default)]
    name: Value,
    #[serde(default)]
    rpc: Value,
}

/// Parse a `chains.json` document.
///
/// Entries without a positive numeric `chainId` or without an `rpc` array are skipped, as are
/// non-string URLs.
///
/// # Errors
///
/// Returns [`DirectoryError::Malformed`] if the document is not a JSON array.
pub fn parse_directory(body: Value) -> Result<Vec<DirectoryEntry>, DirectoryError> {
    let Value::Array(items) = body else {
        return Err(DirectoryError::Malformed);
    };

    let entries = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<RawChain>(item).ok())
        .filter_map(|raw| {
            let chain_id = raw.chain_id.as_u64().filter(|id| *id > 0)?;
            let Value::Array(rpc) = raw.rpc else {
                return None;
            };
            Some(DirectoryEntry {
                service_id: chain_id.into(),
                name: raw.name.as_str().map(str::to_owned).filter(|name| !name.is_empty()),
                candidate_urls: rpc
                    .into_iter()
                    .filter_map(|url| match url {
                        Value::String(url) => Some(url),
                        _ => None,
                    })
                    .collect(),
            })
        })
        .collect();
    Ok(entries)
}

/// Public, key-free HTTPS endpoints from `urls`: deduplicated in listing order, at most `max`.
#[must_use]
pub fn select_candidate_urls(urls: &[String], max: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.iter()
        .filter(|url| url.starts_with("https://") && !url.contains("${"))
        .filter(|url| seen.insert(*url))
        .take(max)
        .cloned()
        .collect()
}

/// Counts from one [`BootstrapLoader::seed`] run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Rows created by this run.
    pub inserted: usize,
    /// Candidates that were already present and left untouched.
    pub existing: usize,
}

/// Seeds the registry.
pub struct BootstrapLoader<R, D> {
    registry: Arc<R>,
    directory: D,
    static_services: Vec<StaticService>,
    config: BootstrapConfig,
}

impl<R: EndpointRegistry, D: DirectorySource> BootstrapLoader<R, D> {
    #[must_use]
    pub fn new(registry: Arc<R>, directory: D, config: BootstrapConfig) -> Self {
        Self { registry, directory, static_services: Vec::new(), config }
    }

    /// Operator-configured services, seeded ahead of the directory at [`STATIC_PRIORITY`].
    #[must_use]
    pub fn with_static_services(mut self, services: Vec<StaticService>) -> Self {
        self.static_services = services;
        self
    }

    /// Insert every missing static and discovered endpoint.
    ///
    /// A failed directory fetch is logged and treated as an empty listing.
    ///
    /// # Errors
    ///
    /// Returns an error only if the registry rejects an insert.
    pub async fn seed(&self) -> Result<SeedReport, RegistryError> {
        let mut report = SeedReport::default();

        for service in &self.static_services {
            let Some(url) = &service.endpoint else {
                continue;
            };
            self.insert(
                NewEndpoint {
                    service_id: service.service_id.clone(),
                    service_name: service.name.clone(),
                    url: url.clone(),
                    priority: STATIC_PRIORITY,
                },
                &mut report,
            )
            .await?;
        }

        let entries = match self.directory.fetch().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Service directory fetch failed, continuing without it");
                Vec::new()
            }
        };

        for entry in entries {
            let urls =
                select_candidate_urls(&entry.candidate_urls, self.config.max_endpoints_per_service);
            if urls.is_empty() {
                continue;
            }
            let name = entry.name.unwrap_or_else(|| format!("Chain {}", entry.service_id));
            for url in urls {
                self.insert(
                    NewEndpoint {
                        service_id: entry.service_id.clone(),
                        service_name: name.clone(),
                        url,
                        priority: DEFAULT_PRIORITY,
                    },
                    &mut report,
                )
                .await?;
            }
        }

        info!(inserted = report.inserted, existing = report.existing, "Registry seeded");
        Ok(report)
    }

    async fn insert(
        &self,
        endpoint: NewEndpoint,
        report: &mut SeedReport,
    ) -> Result<(), RegistryError> {
        if self.registry.insert_if_absent(endpoint).await? {
            report.inserted += 1;
        } else {
            report.existing += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::registry::{EndpointStatus, HealthUpdate, InMemoryRegistry};

    struct FailingDirectory;

    impl DirectorySource for FailingDirectory {
        async fn fetch(&self) -> Result<Vec<DirectoryEntry>, DirectoryError> {
            Err(DirectoryError::Malformed)
        }
    }

    fn entry(chain_id: u64, name: Option<&str>, urls: &[&str]) -> DirectoryEntry {
        DirectoryEntry {
            service_id: chain_id.into(),
            name: name.map(str::to_owned),
            candidate_urls: urls.iter().map(|u| (*u).to_owned()).collect(),
        }
    }

    #[test]
    fn candidate_urls_are_https_public_unique_and_capped() {
        let urls: Vec<String> = [
            "http://plain.example",
            "https://a.example",
            "https://mainnet.infura.io/v3/${INFURA_API_KEY}",
            "wss://socket.example",
            "https://a.example",
            "https://b.example",
            "https://c.example",
            "https://d.example",
            "https://e.example",
            "https://f.example",
        ]
        .iter()
        .map(|u| (*u).to_owned())
        .collect();

        assert_eq!(
            select_candidate_urls(&urls, 5),
            [
                "https://a.example",
                "https://b.example",
                "https://c.example",
                "https://d.example",
                "https://e.example"
            ]
        );
    }

    #[test]
    fn directory_parsing_skips_unusable_entries() {
        let body = json!([
            {"chainId": 1, "name": "Ethereum Mainnet", "rpc": ["https://eth.example", 42, null]},
            {"chainId": "oops", "name": "Bad id", "rpc": ["https://x.example"]},
            {"name": "No id", "rpc": ["https://y.example"]},
            {"chainId": 5, "name": "No rpc list"},
            {"chainId": 10, "rpc": []},
        ]);

        let entries = parse_directory(body).unwrap();
        assert_eq!(
            entries,
            [
                entry(1, Some("Ethereum Mainnet"), &["https://eth.example"]),
                entry(10, None, &[]),
            ]
        );
    }

    #[test]
    fn directory_must_be_an_array() {
        assert!(matches!(parse_directory(json!({"chains": []})), Err(DirectoryError::Malformed)));
    }

    #[test]
    fn static_services_resolve_from_lookup() {
        let services: Vec<_> = default_static_services()
            .into_iter()
            .map(|s| {
                s.resolve_with(|var| match var {
                    "POLYGON_RPC" => Some(" https://polygon.example ".into()),
                    "BSC_RPC" => Some(String::new()),
                    _ => None,
                })
            })
            .collect();

        assert_eq!(services.len(), 8);
        let configured: Vec<_> = services.iter().filter(|s| s.endpoint.is_some()).collect();
        assert_eq!(configured.len(), 1);
        assert_eq!(configured[0].service_id.as_str(), "137");
        assert_eq!(configured[0].endpoint.as_deref(), Some("https://polygon.example"));
    }

    #[tokio::test]
    async fn seed_is_idempotent_and_preserves_health() {
        let registry = Arc::new(InMemoryRegistry::new());
        let directory = StaticDirectory(vec![
            entry(1, Some("Ethereum Mainnet"), &["https://eth.example", "https://public.example"]),
            entry(8453, None, &["https://base.example"]),
        ]);
        let loader =
            BootstrapLoader::new(Arc::clone(&registry), directory, BootstrapConfig::default())
                .with_static_services(vec![
                    StaticService::new(1u64, "Ethereum", "ETHEREUM_RPC")
                        .with_endpoint("https://eth.example"),
                    StaticService::new(56u64, "BSC", "BSC_RPC"),
                ]);

        let first = loader.seed().await.unwrap();
        assert_eq!(first, SeedReport { inserted: 3, existing: 1 });

        let key = registry.find_all().await.unwrap()[0].key();
        let update = HealthUpdate::probed(EndpointStatus::Slow, Some(1700));
        registry.update(&key, update).await.unwrap();
        let before = registry.find_all().await.unwrap();

        let second = loader.seed().await.unwrap();
        assert_eq!(second, SeedReport { inserted: 0, existing: 4 });
        assert_eq!(registry.find_all().await.unwrap(), before);
    }

    #[tokio::test]
    async fn static_endpoints_outrank_discovered_ones() {
        let registry = Arc::new(InMemoryRegistry::new());
        let directory = StaticDirectory(vec![entry(8453, None, &["https://base.example"])]);
        BootstrapLoader::new(Arc::clone(&registry), directory, BootstrapConfig::default())
            .with_static_services(vec![
                StaticService::new(8453u64, "Base", "BASE_RPC")
                    .with_endpoint("https://private-base.example"),
            ])
            .seed()
            .await
            .unwrap();

        let rows = registry.find_by_service(&8453u64.into()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].priority, STATIC_PRIORITY);
        assert_eq!(rows[0].service_name, "Base");
        assert_eq!(rows[1].priority, DEFAULT_PRIORITY);
        assert_eq!(rows[1].service_name, "Chain 8453");
    }

    #[tokio::test]
    async fn directory_failure_still_seeds_static_services() {
        let registry = Arc::new(InMemoryRegistry::new());
        let config = BootstrapConfig::default();
        let report = BootstrapLoader::new(Arc::clone(&registry), FailingDirectory, config)
            .with_static_services(vec![
                StaticService::new(1u64, "Ethereum", "ETHEREUM_RPC")
                    .with_endpoint("https://eth.example"),
            ])
            .seed()
            .await
            .unwrap();

        assert_eq!(report, SeedReport { inserted: 1, existing: 0 });
        assert_eq!(registry.len(), 1);
    }
}
