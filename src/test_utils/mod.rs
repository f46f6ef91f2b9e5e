//! Helpers for exercising selection and scanning without a network.
//!
//! Each mocked endpoint is an Alloy [`Asserter`]: a FIFO of canned JSON-RPC responses consumed
//! one per request, regardless of method. Tests push responses in the exact order the code under
//! test issues calls.

mod macros;

use std::{
    collections::HashMap,
    io,
    net::TcpListener,
    sync::{Mutex, PoisonError},
};

use alloy::{
    primitives::{Address, B256, Bytes, LogData, U64, U256},
    providers::{RootProvider, mock::Asserter},
    rpc::{client::RpcClient, types::Log},
    sol_types::{SolCall, SolEvent},
};
use chrono::Utc;

use crate::{
    connection::{Connector, HttpConnector},
    contracts::{IERC20, IERC721},
    error::ConnectionError,
    registry::{EndpointRow, EndpointStatus, ServiceId},
};

/// [`Connector`] backed by per-URL asserters.
///
/// Connecting to a URL without a registered asserter fails, which stands in for an unreachable
/// endpoint. URLs from [`MockConnector::unresponsive_endpoint`] get a real HTTP provider instead.
#[derive(Debug, Default)]
pub struct MockConnector {
    endpoints: Mutex<HashMap<String, Asserter>>,
    unresponsive: Mutex<HashMap<String, TcpListener>>,
    attempts: Mutex<Vec<String>>,
}

impl MockConnector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The asserter serving `url`, created on first use.
    pub fn endpoint(&self, url: &str) -> Asserter {
        self.endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(url.to_owned())
            .or_default()
            .clone()
    }

    /// Local HTTP endpoint that accepts connections and never answers a request.
    ///
    /// The listener is never polled: the kernel completes handshakes into its backlog, so every
    /// call against the returned URL runs until its timeout. It lives as long as the connector.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub fn unresponsive_endpoint(&self) -> io::Result<String> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let url = format!("http://{}", listener.local_addr()?);
        self.unresponsive
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.clone(), listener);
        Ok(url)
    }

    /// URLs passed to `connect`, in call order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of `connect` calls made for `url`.
    pub fn attempts_for(&self, url: &str) -> usize {
        self.attempts().iter().filter(|attempt| attempt.as_str() == url).count()
    }
}

impl Connector for MockConnector {
    async fn connect(&self, row: &EndpointRow) -> Result<RootProvider, ConnectionError> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner).push(row.url.clone());
        let unresponsive =
            self.unresponsive.lock().unwrap_or_else(PoisonError::into_inner).contains_key(&row.url);
        if unresponsive {
            return HttpConnector.connect(row).await;
        }
        let asserter =
            self.endpoints.lock().unwrap_or_else(PoisonError::into_inner).get(&row.url).cloned();
        match asserter {
            Some(asserter) => Ok(RootProvider::new(RpcClient::mocked(asserter))),
            None => Err(ConnectionError::InvalidUrl {
                url: row.url.clone(),
                reason: "no mock registered".into(),
            }),
        }
    }
}

/// Queue an `eth_blockNumber` response.
pub fn push_head(asserter: &Asserter, head: u64) {
    asserter.push_success(&U64::from(head));
}

/// Queue an `eth_getLogs` response.
pub fn push_logs(asserter: &Asserter, logs: &[Log]) {
    asserter.push_success(&logs);
}

/// Queue the ABI-encoded return value of an `eth_call` to `C`.
pub fn push_return<C: SolCall>(asserter: &Asserter, value: &C::Return) {
    asserter.push_success(&Bytes::from(C::abi_encode_returns(value)));
}

/// Queue a JSON-RPC error response.
pub fn push_failure(asserter: &Asserter, message: &'static str) {
    asserter.push_failure_msg(message);
}

/// A registry row with explicit health fields.
#[must_use]
pub fn endpoint_row(
    service_id: impl Into<ServiceId>,
    url: &str,
    status: EndpointStatus,
    latency_ms: Option<u64>,
    priority: i32,
) -> EndpointRow {
    let service_id = service_id.into();
    EndpointRow {
        service_name: format!("Chain {service_id}"),
        service_id,
        url: url.to_owned(),
        status,
        latency_ms,
        last_checked_at: latency_ms.map(|_| Utc::now()),
        priority,
    }
}

/// An `Approval(owner, spender, value)` log emitted by `contract`, with `data` as payload.
#[must_use]
pub fn approval_log(
    contract: Address,
    owner: Address,
    spender: Address,
    data: impl Into<Bytes>,
    block_number: u64,
) -> Log {
    log(
        contract,
        vec![IERC20::Approval::SIGNATURE_HASH, owner.into_word(), spender.into_word()],
        data.into(),
        block_number,
    )
}

/// An ERC-721 style `Approval(owner, approved, tokenId)` log with the token id indexed.
#[must_use]
pub fn indexed_token_approval_log(
    contract: Address,
    owner: Address,
    spender: Address,
    token_id: u64,
    block_number: u64,
) -> Log {
    log(
        contract,
        vec![
            IERC20::Approval::SIGNATURE_HASH,
            owner.into_word(),
            spender.into_word(),
            B256::from(U256::from(token_id)),
        ],
        Bytes::new(),
        block_number,
    )
}

/// An `ApprovalForAll(owner, operator, approved)` log emitted by `contract`.
#[must_use]
pub fn approval_for_all_log(
    contract: Address,
    owner: Address,
    operator: Address,
    approved: bool,
    block_number: u64,
) -> Log {
    let mut data = [0u8; 32];
    data[31] = u8::from(approved);
    log(
        contract,
        vec![IERC721::ApprovalForAll::SIGNATURE_HASH, owner.into_word(), operator.into_word()],
        Bytes::copy_from_slice(&data),
        block_number,
    )
}

fn log(contract: Address, topics: Vec<B256>, data: Bytes, block_number: u64) -> Log {
    Log {
        inner: alloy::primitives::Log {
            address: contract,
            data: LogData::new_unchecked(topics, data),
        },
        block_number: Some(block_number),
        ..Default::default()
    }
}
