//! Connections to individual RPC endpoints.
//!
//! A [`Connector`] turns a registry row into an Alloy
//! [`RootProvider`](alloy::providers::RootProvider); an [`EndpointConnection`] is the verified
//! handle the selector gives out. Every call made through it runs under an explicit timeout and
//! resolves to a value or an error.

mod connector;
mod endpoint;

pub use connector::{Connector, HttpConnector};
pub use endpoint::EndpointConnection;

pub(crate) use connector::fetch_head;
