#![allow(dead_code)]

use std::sync::Arc;

use alloy::primitives::{Address, address};
use approval_scanner::{
    ApprovalScanner, ConnectionConfig, EndpointRow, EndpointSelector, EndpointStatus,
    InMemoryRegistry, ScanConfig, SelectorConfig, test_utils::MockConnector,
};

pub const OWNER: Address = address!("0x0000000000000000000000000000000000000abc");
pub const SPENDER: Address = address!("0x00000000000000000000000000000000000000bb");
pub const TOKEN: Address = address!("0x00000000000000000000000000000000000000aa");
pub const NFT: Address = address!("0x00000000000000000000000000000000000000cc");

pub const PRIMARY: &str = "https://primary.example";
pub const BACKUP: &str = "https://backup.example";

pub type TestScanner = ApprovalScanner<InMemoryRegistry, MockConnector>;

pub struct ScannerSetup {
    pub registry: Arc<InMemoryRegistry>,
    pub connector: Arc<MockConnector>,
    pub scanner: TestScanner,
}

/// Scanner over `rows` whose connections never retry, so every mocked response is consumed by
/// exactly one call.
pub fn setup_scanner(rows: Vec<EndpointRow>, config: ScanConfig) -> anyhow::Result<ScannerSetup> {
    let registry = Arc::new(InMemoryRegistry::with_rows(rows));
    let connector = Arc::new(MockConnector::new());
    let selector = EndpointSelector::new(
        Arc::clone(&registry),
        Arc::clone(&connector),
        SelectorConfig::default().connection(ConnectionConfig::fragile()),
    );
    let scanner = ApprovalScanner::new(selector, config)?;
    Ok(ScannerSetup { registry, connector, scanner })
}

/// One healthy endpoint for service 1 at [`PRIMARY`].
pub fn primary_only() -> Vec<EndpointRow> {
    vec![approval_scanner::test_utils::endpoint_row(1u64, PRIMARY, EndpointStatus::Ok, Some(50), 1)]
}

/// The window used by the chunking scenarios: head 100000, 40000 blocks back, 20000 per chunk.
pub fn window_config() -> ScanConfig {
    ScanConfig::default().lookback_blocks(40_000).chunk_size(20_000)
}
