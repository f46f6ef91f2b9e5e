use std::{fmt::Display, time::Duration};

use alloy::{
    providers::{Provider, RootProvider},
    rpc::types::{Filter, Log},
    transports::{RpcError, TransportErrorKind},
};
use backon::{ExponentialBuilder, Retryable};
use tokio::time::timeout;

use crate::{
    config::ConnectionConfig,
    error::{ConnectionError, ProbeFailed},
    registry::EndpointKey,
};

/// A verified connection to one endpoint.
///
/// General calls (`get_block_number`, `get_logs`) are retried with exponential backoff, and the
/// whole operation, retries included, is bounded by the call timeout. Capability probes go
/// through [`EndpointConnection::try_call`] and are never retried.
#[derive(Clone, Debug)]
pub struct EndpointConnection {
    pub(crate) provider: RootProvider,
    pub(crate) endpoint: EndpointKey,
    pub(crate) call_timeout: Duration,
    pub(crate) max_retries: usize,
    pub(crate) min_delay: Duration,
}

impl EndpointConnection {
    pub(crate) fn new(
        provider: RootProvider,
        endpoint: EndpointKey,
        config: &ConnectionConfig,
    ) -> Self {
        Self {
            provider,
            endpoint,
            call_timeout: config.call_timeout,
            max_retries: config.max_retries,
            min_delay: config.min_delay,
        }
    }

    /// The underlying provider.
    #[must_use]
    pub fn provider(&self) -> &RootProvider {
        &self.provider
    }

    /// Registry key of the endpoint this connection talks to.
    #[must_use]
    pub fn endpoint(&self) -> &EndpointKey {
        &self.endpoint
    }

    /// Fetch the latest block number with retry and timeout.
    pub async fn get_block_number(&self) -> Result<u64, ConnectionError> {
        debug!(url = %self.endpoint.url, "eth_blockNumber called");
        let result = self
            .call_with_retry(|provider| async move { provider.get_block_number().await })
            .await;
        if let Err(e) = &result {
            error!(url = %self.endpoint.url, error = %e, "eth_blockNumber failed");
        }
        result
    }

    /// Fetch logs for the given [`Filter`] with retry and timeout.
    pub async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ConnectionError> {
        debug!(url = %self.endpoint.url, "eth_getLogs called");
        let result = self
            .call_with_retry(move |provider| async move { provider.get_logs(filter).await })
            .await;
        if let Err(e) = &result {
            error!(url = %self.endpoint.url, error = %e, "eth_getLogs failed");
        }
        result
    }

    /// Run a speculative read-only call and report failure as a value.
    ///
    /// The call gets one attempt under the call timeout. Any error, including a timeout, becomes
    /// [`ProbeFailed`] tagged with `probe`.
    pub async fn try_call<T, E, Fut>(
        &self,
        probe: &'static str,
        call: Fut,
    ) -> Result<T, ProbeFailed>
    where
        E: Display,
        Fut: IntoFuture<Output = Result<T, E>>,
    {
        match timeout(self.call_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                trace!(probe = probe, error = %e, "probe call failed");
                Err(ProbeFailed { probe, reason: e.to_string() })
            }
            Err(_) => {
                trace!(probe = probe, "probe call timed out");
                Err(ProbeFailed { probe, reason: ConnectionError::Timeout.to_string() })
            }
        }
    }

    /// Execute `operation` with exponential backoff under a total timeout.
    ///
    /// # Errors
    ///
    /// * [`ConnectionError::Timeout`] if `call_timeout` elapses, including time spent between
    ///   retries.
    /// * The last [`RpcError<TransportErrorKind>`] once `max_retries` is exhausted.
    pub(crate) async fn call_with_retry<T, F, Fut>(
        &self,
        operation: F,
    ) -> Result<T, ConnectionError>
    where
        F: Fn(RootProvider) -> Fut,
        Fut: Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        let retry_strategy = ExponentialBuilder::default()
            .with_max_times(self.max_retries)
            .with_min_delay(self.min_delay);

        timeout(
            self.call_timeout,
            (|| operation(self.provider.clone()))
                .retry(retry_strategy)
                .notify(|err: &RpcError<TransportErrorKind>, dur: Duration| {
                    info!(error = %err, "RPC error retrying after {:?}", dur);
                })
                .sleep(tokio::time::sleep),
        )
        .await
        .map_err(ConnectionError::from)?
        .map_err(ConnectionError::from)
    }
}
