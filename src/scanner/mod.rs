//! Chunked historical scan for approvals granted by one address.
//!
//! A scan selects a verified connection, fixes its window from the current head, and then walks
//! the window oldest-first in fixed-size chunks on a background task. Everything after setup is
//! reported through the event stream: a failed log query becomes an error event and the scan
//! moves on, so a started scan always ends with its completion event unless it is cancelled or
//! its receiver is dropped.
//!
//! ```ignore
//! let scanner = ApprovalScanner::new(selector, ScanConfig::default())?;
//! let mut subscription = scanner.scan(&1u64.into(), owner).await?;
//!
//! while let Some(event) = subscription.next().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! ```

mod classify;
mod filter;
mod range_iterator;

use std::{
    ops::RangeInclusive,
    panic,
    pin::Pin,
    task::{Context, Poll},
};

use alloy::primitives::{Address, BlockNumber, U256};
use serde::Serialize;
use tokio::{
    sync::mpsc,
    task::{JoinHandle, JoinSet},
};
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tokio_util::sync::CancellationToken;

use crate::{
    config::ScanConfig,
    connection::{Connector, EndpointConnection},
    contracts::IERC20,
    error::ScanError,
    registry::{EndpointRegistry, ServiceId},
    selector::EndpointSelector,
    types::{ScanEvent, TryEmit},
};

use range_iterator::ChunkIterator;

/// Decimals assumed by [`ApprovalScanner::check_allowance`] when the token does not report them.
pub const FALLBACK_DECIMALS: u8 = 18;

/// The inclusive block window of one scan.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScanWindow {
    pub from_block: BlockNumber,
    pub to_block: BlockNumber,
}

impl ScanWindow {
    /// The `lookback` blocks before `head`, clamped at genesis.
    #[must_use]
    pub const fn ending_at(head: BlockNumber, lookback: u64) -> Self {
        Self { from_block: head.saturating_sub(lookback), to_block: head }
    }
}

/// Result of a manual ERC-20 allowance read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AllowanceInfo {
    #[serde(serialize_with = "crate::types::decimal")]
    pub allowance: U256,
    pub decimals: u8,
    pub symbol: String,
}

/// Starts approval scans on connections handed out by an [`EndpointSelector`].
pub struct ApprovalScanner<R, C> {
    selector: EndpointSelector<R, C>,
    config: ScanConfig,
}

impl<R, C> Clone for ApprovalScanner<R, C> {
    fn clone(&self) -> Self {
        Self { selector: self.selector.clone(), config: self.config.clone() }
    }
}

impl<R: EndpointRegistry, C: Connector> ApprovalScanner<R, C> {
    /// # Errors
    ///
    /// * [`ScanError::InvalidChunkSize`] if the chunk size is 0.
    /// * [`ScanError::InvalidBufferCapacity`] if the event buffer capacity is 0.
    pub fn new(selector: EndpointSelector<R, C>, config: ScanConfig) -> Result<Self, ScanError> {
        if config.chunk_size == 0 {
            return Err(ScanError::InvalidChunkSize);
        }
        if config.buffer_capacity == 0 {
            return Err(ScanError::InvalidBufferCapacity);
        }
        Ok(Self { selector, config })
    }

    #[must_use]
    pub fn selector(&self) -> &EndpointSelector<R, C> {
        &self.selector
    }

    /// Start a scan of `service_id` for approvals granted by `owner`.
    ///
    /// # Errors
    ///
    /// Fails before any event is produced if no connection can be selected or the head cannot be
    /// read.
    pub async fn scan(
        &self,
        service_id: &ServiceId,
        owner: Address,
    ) -> Result<ScanSubscription, ScanError> {
        self.scan_with_cancel(service_id, owner, CancellationToken::new()).await
    }

    /// Like [`ApprovalScanner::scan`], stopping before the next chunk once `token` is cancelled.
    ///
    /// # Errors
    ///
    /// See [`ApprovalScanner::scan`].
    pub async fn scan_with_cancel(
        &self,
        service_id: &ServiceId,
        owner: Address,
        token: CancellationToken,
    ) -> Result<ScanSubscription, ScanError> {
        let connection = self.selector.select(service_id).await?;
        let head = connection.get_block_number().await?;
        let window = ScanWindow::ending_at(head, self.config.lookback_blocks);

        info!(
            service_id = %service_id,
            url = %connection.endpoint().url,
            from_block = window.from_block,
            to_block = window.to_block,
            "Starting approval scan"
        );

        let (sender, receiver) = mpsc::channel(self.config.buffer_capacity);
        let task = ScanTask {
            connection,
            service_id: service_id.clone(),
            owner,
            window,
            chunk_size: self.config.chunk_size,
            token: token.clone(),
            sender,
        };
        let handle = tokio::spawn(task.run());

        Ok(ScanSubscription { stream: ReceiverStream::new(receiver), window, token, handle })
    }

    /// Start one independent scan per service.
    ///
    /// Setups run concurrently, so a service whose endpoints hang does not delay the others.
    /// Results come back in input order; setup failures are returned per service.
    pub async fn scan_many(
        &self,
        service_ids: impl IntoIterator<Item = ServiceId>,
        owner: Address,
    ) -> Vec<(ServiceId, Result<ScanSubscription, ScanError>)> {
        let service_ids: Vec<ServiceId> = service_ids.into_iter().collect();

        let mut setups = JoinSet::new();
        for (index, service_id) in service_ids.iter().cloned().enumerate() {
            let scanner = self.clone();
            setups.spawn(async move { (index, scanner.scan(&service_id, owner).await) });
        }

        let mut results: Vec<Option<Result<ScanSubscription, ScanError>>> =
            service_ids.iter().map(|_| None).collect();
        while let Some(joined) = setups.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) if e.is_panic() => panic::resume_unwind(e.into_panic()),
                Err(e) => error!(error = %e, "Scan setup task failed"),
            }
        }

        service_ids
            .into_iter()
            .zip(results)
            .map(|(service_id, result)| {
                let result = result.unwrap_or(Err(ScanError::SetupAborted));
                if let Err(e) = &result {
                    warn!(service_id = %service_id, error = %e, "Scan could not start");
                }
                (service_id, result)
            })
            .collect()
    }

    /// Read the current ERC-20 allowance `owner` gave `spender` on `token`.
    ///
    /// Decimals fall back to [`FALLBACK_DECIMALS`] and the symbol to an empty string when the
    /// token does not report them.
    ///
    /// # Errors
    ///
    /// Fails if no connection can be selected or the allowance read fails.
    pub async fn check_allowance(
        &self,
        service_id: &ServiceId,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<AllowanceInfo, ScanError> {
        let connection = self.selector.select(service_id).await?;
        let erc20 = IERC20::new(token, connection.provider().clone());

        let allowance =
            connection.try_call("allowance", erc20.allowance(owner, spender).call()).await?;
        let decimals = connection
            .try_call("decimals", erc20.decimals().call())
            .await
            .unwrap_or(FALLBACK_DECIMALS);
        let symbol = connection.try_call("symbol", erc20.symbol().call()).await.unwrap_or_default();

        Ok(AllowanceInfo { allowance, decimals, symbol })
    }
}

/// The event stream of one running scan.
///
/// Dropping the subscription stops the scan at its next emission.
#[derive(Debug)]
pub struct ScanSubscription {
    stream: ReceiverStream<ScanEvent>,
    window: ScanWindow,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScanSubscription {
    #[must_use]
    pub fn window(&self) -> ScanWindow {
        self.window
    }

    /// Stop the scan before its next chunk. Queries of the current chunk still complete.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Whether the scan task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// The raw event stream. The scan keeps running in the background.
    #[must_use]
    pub fn into_stream(self) -> ReceiverStream<ScanEvent> {
        self.stream
    }
}

impl Stream for ScanSubscription {
    type Item = ScanEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.stream).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.stream.size_hint()
    }
}

struct ScanTask {
    connection: EndpointConnection,
    service_id: ServiceId,
    owner: Address,
    window: ScanWindow,
    chunk_size: u64,
    token: CancellationToken,
    sender: mpsc::Sender<ScanEvent>,
}

impl ScanTask {
    async fn run(self) {
        let ScanWindow { from_block, to_block } = self.window;
        if !self.emit_info(format!("Scan blocks {from_block}..{to_block}")).await {
            return;
        }

        for range in ChunkIterator::new(from_block, to_block, self.chunk_size) {
            if self.token.is_cancelled() {
                info!(service_id = %self.service_id, "Scan cancelled");
                return;
            }
            if !self.scan_chunk(range).await {
                return;
            }
        }

        if self.emit_info("Scan complete.").await {
            info!(service_id = %self.service_id, "Scan complete");
        }
    }

    /// Returns `false` once the receiver is gone.
    async fn scan_chunk(&self, range: RangeInclusive<BlockNumber>) -> bool {
        debug!(service_id = %self.service_id, block_range = ?range, "Scanning chunk");
        if !self.emit_info(format!("Range {}..{}", range.start(), range.end())).await {
            return false;
        }

        let approvals =
            match self.connection.get_logs(&filter::approvals(self.owner, &range)).await {
                Ok(logs) => logs,
                Err(e) => {
                    let message = format!("getLogs Approval error: {e}");
                    if !self.sender.try_emit(ScanEvent::error(&self.service_id, message)).await {
                        return false;
                    }
                    Vec::new()
                }
            };
        let approvals_for_all =
            match self.connection.get_logs(&filter::approvals_for_all(self.owner, &range)).await {
                Ok(logs) => logs,
                Err(e) => {
                    let message = format!("getLogs ApprovalForAll error: {e}");
                    if !self.sender.try_emit(ScanEvent::error(&self.service_id, message)).await {
                        return false;
                    }
                    Vec::new()
                }
            };

        for log in &approvals {
            let Some(details) = classify::approval(&self.connection, self.owner, log).await else {
                continue;
            };
            let event = ScanEvent::found(&self.service_id, log.address(), details);
            if !self.sender.try_emit(event).await {
                return false;
            }
        }

        for log in &approvals_for_all {
            let Some(details) =
                classify::approval_for_all(&self.connection, self.owner, log).await
            else {
                continue;
            };
            let event = ScanEvent::found(&self.service_id, log.address(), details);
            if !self.sender.try_emit(event).await {
                return false;
            }
        }

        true
    }

    async fn emit_info(&self, message: impl Into<String>) -> bool {
        self.sender.try_emit(ScanEvent::info(&self.service_id, message)).await
    }
}
