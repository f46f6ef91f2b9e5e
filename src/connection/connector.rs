use std::time::Duration;

use alloy::{
    providers::{Provider, RootProvider},
    transports::http::reqwest::Url,
};
use tokio::time::timeout;

use crate::{error::ConnectionError, registry::EndpointRow};

/// Opens an Alloy provider for a registry row.
///
/// Opening is cheap and performs no I/O for HTTP endpoints; liveness is established separately
/// by a head fetch.
pub trait Connector: Send + Sync + 'static {
    /// Build a provider talking to `row.url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string cannot be used.
    fn connect(
        &self,
        row: &EndpointRow,
    ) -> impl Future<Output = Result<RootProvider, ConnectionError>> + Send;
}

/// Plain JSON-RPC over HTTP(S).
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpConnector;

impl Connector for HttpConnector {
    async fn connect(&self, row: &EndpointRow) -> Result<RootProvider, ConnectionError> {
        let url = row.url.parse::<Url>().map_err(|e| ConnectionError::InvalidUrl {
            url: row.url.clone(),
            reason: e.to_string(),
        })?;
        Ok(RootProvider::new_http(url))
    }
}

/// Single-attempt `eth_blockNumber` bounded by `budget`.
pub(crate) async fn fetch_head(
    provider: &RootProvider,
    budget: Duration,
) -> Result<u64, ConnectionError> {
    Ok(timeout(budget, provider.get_block_number()).await??)
}
