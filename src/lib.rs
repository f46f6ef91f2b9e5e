//! Approval-Scanner finds token approvals granted by an address on EVM networks, tolerating slow,
//! rate-limited and unreachable RPC endpoints.
//!
//! The crate has two halves:
//!
//! - An **endpoint pool**. Known endpoints live in an [`EndpointRegistry`], seeded by a
//!   [`BootstrapLoader`] and kept fresh by a [`HealthMonitor`] running a [`HealthProber`]. On
//!   demand, an [`EndpointSelector`] ranks a service's endpoints and hands out a live-checked
//!   [`EndpointConnection`], demoting every candidate that fails the check.
//! - A **scan pipeline**. [`ApprovalScanner::scan`] walks the most recent blocks of a service in
//!   fixed-size chunks, queries `Approval` and `ApprovalForAll` logs owned by the scanned address,
//!   and classifies each matched contract as ERC-20, ERC-721 or unknown with best-effort view
//!   calls.
//!
//! # Stream items
//!
//! A started scan yields [`ScanEvent`] values in order: an info event announcing the window, an
//! info event per chunk followed by that chunk's error and found events, and a final
//! `"Scan complete."` info event. Events serialise to JSON with `serde`.
//!
//! # Failure model
//!
//! Only setup can fail a scan: no rows for the service, no endpoint passing the live check, or an
//! unreadable head. After that, a failed log query becomes an [`ScanEvent::Error`] and the scan
//! continues; a failed capability probe only changes which [`FindingKind`] is reported.
//!
//! # Backpressure and cancellation
//!
//! Each scan owns a bounded channel. A slow consumer slows the scan down; a dropped
//! [`ScanSubscription`] or a cancelled token stops it before its next chunk.

#[macro_use]
mod logging;

pub mod bootstrap;
pub mod config;
pub mod contracts;
pub mod health;
pub mod registry;
pub mod scanner;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

mod connection;
mod error;
mod selector;
mod types;

pub use bootstrap::{
    BootstrapLoader, DirectoryEntry, DirectorySource, HttpDirectory, SeedReport, StaticDirectory,
    StaticService, default_static_services,
};
pub use config::{
    BootstrapConfig, Config, ConnectionConfig, HealthConfig, ScanConfig, SelectorConfig,
};
pub use connection::{Connector, EndpointConnection, HttpConnector};
pub use error::{
    ConfigError, ConnectionError, DirectoryError, ProbeFailed, RegistryError, ScanError,
    SelectError,
};
pub use health::{HealthMonitor, HealthProber, ProbeOutcome, ProbeReport};
pub use registry::{
    EndpointKey, EndpointRegistry, EndpointRow, EndpointStatus, HealthUpdate, InMemoryRegistry,
    NewEndpoint, ServiceId, known_services,
};
pub use scanner::{AllowanceInfo, ApprovalScanner, ScanSubscription, ScanWindow};
pub use selector::EndpointSelector;
pub use types::{FindingDetails, FindingKind, ScanEvent};
