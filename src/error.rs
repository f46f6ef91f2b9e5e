use std::sync::Arc;

use alloy::transports::{RpcError, TransportErrorKind};
use thiserror::Error;

use crate::registry::{EndpointKey, ServiceId};

/// Failure of a single call against one endpoint.
#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    /// The underlying RPC transport returned an error.
    #[error("RPC error: {0}")]
    Rpc(Arc<RpcError<TransportErrorKind>>),

    /// A timeout elapsed while waiting for an RPC response.
    #[error("Operation timed out")]
    Timeout,

    /// The endpoint's connection string could not be used.
    #[error("invalid endpoint url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl From<RpcError<TransportErrorKind>> for ConnectionError {
    fn from(error: RpcError<TransportErrorKind>) -> Self {
        ConnectionError::Rpc(Arc::new(error))
    }
}

impl From<tokio::time::error::Elapsed> for ConnectionError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ConnectionError::Timeout
    }
}

/// Errors surfaced by an [`EndpointRegistry`](crate::registry::EndpointRegistry) backend.
#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    #[error("registry backend error: {0}")]
    Backend(String),

    #[error("endpoint {0} not found")]
    NotFound(EndpointKey),
}

/// Reasons the selector could not hand out a connection.
#[derive(Error, Debug, Clone)]
pub enum SelectError {
    /// The registry has no rows at all for the service.
    #[error("no RPC endpoint configured for service {0}")]
    NotConfigured(ServiceId),

    /// Every candidate failed verification, including after one re-read of the registry.
    #[error("no healthy RPC endpoint for service {0}")]
    NoHealthyEndpoint(ServiceId),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Fatal failures of a scan or of scanner construction.
///
/// Anything that happens after the scan window is known is reported inside the event stream
/// instead.
#[derive(Error, Debug, Clone)]
pub enum ScanError {
    #[error(transparent)]
    Select(#[from] SelectError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// A required contract read did not produce a value.
    #[error(transparent)]
    Probe(#[from] ProbeFailed),

    /// The configured chunk size is invalid (must be greater than zero).
    #[error("Chunk size must be greater than 0")]
    InvalidChunkSize,

    /// The configured event buffer capacity is invalid (must be greater than zero).
    #[error("Event buffer capacity must be greater than 0")]
    InvalidBufferCapacity,

    /// A concurrent setup task was cancelled before reporting.
    #[error("Scan setup was aborted")]
    SetupAborted,
}

/// A capability probe that did not produce a value.
///
/// Probe failures are expected for contracts that do not implement the probed interface and are
/// never reported as scan errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{probe} probe failed: {reason}")]
pub struct ProbeFailed {
    pub probe: &'static str,
    pub reason: String,
}

/// Failures while fetching the public service directory.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("directory request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("directory response is not a JSON array")]
    Malformed,
}

/// Invalid configuration input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue { var: &'static str, value: String, reason: String },
}
