//! Explicit configuration values handed to each component at construction.
//!
//! Every knob has a `DEFAULT_*` constant and a builder-style setter. [`Config::from_env`] reads
//! the historical environment variables once, at startup, into a plain value.

use std::{env, str::FromStr, time::Duration};

use crate::error::ConfigError;

/// Default total budget of a general RPC call (log queries, view calls, head fetches).
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
/// Default maximum number of retry attempts of a general RPC call.
pub const DEFAULT_MAX_RETRIES: usize = 3;
/// Default base delay between retries.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_secs(1);

/// Default budget of a background health probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(7000);
/// Probes at or above this latency classify the endpoint as slow.
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_millis(1500);
/// Default period of the background health refresh.
pub const DEFAULT_RECHECK_INTERVAL: Duration = Duration::from_secs(300);

/// Default budget of the request-path liveness check done by the selector.
pub const DEFAULT_LIVE_CHECK_TIMEOUT: Duration = Duration::from_millis(2500);

/// Default number of most recent blocks a scan covers.
pub const DEFAULT_LOOKBACK_BLOCKS: u64 = 300_000;
/// Default number of blocks queried per log request.
pub const DEFAULT_CHUNK_SIZE: u64 = 20_000;
/// Default capacity of a scan's event channel.
pub const DEFAULT_EVENT_BUFFER_CAPACITY: usize = 128;

/// Default public directory of EVM networks.
pub const DEFAULT_DIRECTORY_URL: &str = "https://chainid.network/chains.json";
/// Default budget of the directory fetch.
pub const DEFAULT_DIRECTORY_TIMEOUT: Duration = Duration::from_secs(20);
/// Default cap of discovered endpoints kept per service.
pub const DEFAULT_MAX_ENDPOINTS_PER_SERVICE: usize = 5;
/// Priority of statically configured endpoints.
pub const STATIC_PRIORITY: i32 = 1;

/// Timeout and retry policy of calls made through an established connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub(crate) call_timeout: Duration,
    pub(crate) max_retries: usize,
    pub(crate) min_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            min_delay: DEFAULT_MIN_DELAY,
        }
    }
}

impl ConnectionConfig {
    /// No retries, only the call timeout.
    #[must_use]
    pub fn fragile() -> Self {
        Self::default().max_retries(0).min_delay(Duration::ZERO)
    }

    /// Set the total budget of one call, retries included.
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the maximum number of retry attempts.
    #[must_use]
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay for exponential backoff retries.
    #[must_use]
    pub fn min_delay(mut self, min_delay: Duration) -> Self {
        self.min_delay = min_delay;
        self
    }
}

/// Background health probing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealthConfig {
    pub(crate) probe_timeout: Duration,
    pub(crate) slow_threshold: Duration,
    pub(crate) recheck_interval: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            slow_threshold: DEFAULT_SLOW_THRESHOLD,
            recheck_interval: DEFAULT_RECHECK_INTERVAL,
        }
    }
}

impl HealthConfig {
    #[must_use]
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    #[must_use]
    pub fn slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    #[must_use]
    pub fn recheck_interval(mut self, interval: Duration) -> Self {
        self.recheck_interval = interval;
        self
    }
}

/// Request-path endpoint selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectorConfig {
    pub(crate) live_check_timeout: Duration,
    pub(crate) connection: ConnectionConfig,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            live_check_timeout: DEFAULT_LIVE_CHECK_TIMEOUT,
            connection: ConnectionConfig::default(),
        }
    }
}

impl SelectorConfig {
    /// Budget of the liveness check done on a candidate before it is handed out.
    #[must_use]
    pub fn live_check_timeout(mut self, timeout: Duration) -> Self {
        self.live_check_timeout = timeout;
        self
    }

    /// Policy applied to calls made through the returned connection.
    #[must_use]
    pub fn connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = connection;
        self
    }
}

/// Historical approval scan.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanConfig {
    pub(crate) lookback_blocks: u64,
    pub(crate) chunk_size: u64,
    pub(crate) buffer_capacity: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            lookback_blocks: DEFAULT_LOOKBACK_BLOCKS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            buffer_capacity: DEFAULT_EVENT_BUFFER_CAPACITY,
        }
    }
}

impl ScanConfig {
    /// Number of most recent blocks to cover.
    #[must_use]
    pub fn lookback_blocks(mut self, blocks: u64) -> Self {
        self.lookback_blocks = blocks;
        self
    }

    /// Number of blocks per log query. Must be greater than 0.
    #[must_use]
    pub fn chunk_size(mut self, blocks: u64) -> Self {
        self.chunk_size = blocks;
        self
    }

    /// Capacity of the per-scan event channel. Must be greater than 0.
    #[must_use]
    pub fn buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }
}

/// Registry seeding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapConfig {
    pub(crate) directory_url: String,
    pub(crate) directory_timeout: Duration,
    pub(crate) max_endpoints_per_service: usize,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            directory_url: DEFAULT_DIRECTORY_URL.to_owned(),
            directory_timeout: DEFAULT_DIRECTORY_TIMEOUT,
            max_endpoints_per_service: DEFAULT_MAX_ENDPOINTS_PER_SERVICE,
        }
    }
}

impl BootstrapConfig {
    #[must_use]
    pub fn directory_url(mut self, url: impl Into<String>) -> Self {
        self.directory_url = url.into();
        self
    }

    #[must_use]
    pub fn directory_timeout(mut self, timeout: Duration) -> Self {
        self.directory_timeout = timeout;
        self
    }

    #[must_use]
    pub fn max_endpoints_per_service(mut self, max: usize) -> Self {
        self.max_endpoints_per_service = max;
        self
    }
}

/// Configuration of every component, as one value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    pub health: HealthConfig,
    pub selector: SelectorConfig,
    pub scan: ScanConfig,
    pub bootstrap: BootstrapConfig,
}

impl Config {
    /// Defaults overridden by the process environment.
    ///
    /// Recognised variables: `RPC_TIMEOUT_MS`, `RPC_RECHECK_INTERVAL_SEC`, `SCAN_CHUNK_BLOCKS`,
    /// `DEFAULT_LOOKBACK_BLOCKS`. Unset variables keep their default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Same as [`Config::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(ms) = parse_var::<u64>(&lookup, "RPC_TIMEOUT_MS")? {
            config.health.probe_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "RPC_RECHECK_INTERVAL_SEC")? {
            config.health.recheck_interval = Duration::from_secs(secs);
        }
        if let Some(blocks) = parse_var::<u64>(&lookup, "SCAN_CHUNK_BLOCKS")? {
            if blocks == 0 {
                return Err(ConfigError::InvalidValue {
                    var: "SCAN_CHUNK_BLOCKS",
                    value: blocks.to_string(),
                    reason: "must be greater than 0".into(),
                });
            }
            config.scan.chunk_size = blocks;
        }
        if let Some(blocks) = parse_var::<u64>(&lookup, "DEFAULT_LOOKBACK_BLOCKS")? {
            config.scan.lookback_blocks = blocks;
        }

        Ok(config)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    raw.trim().parse().map(Some).map_err(|e: T::Err| ConfigError::InvalidValue {
        var,
        value: raw.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.health.probe_timeout, Duration::from_millis(7000));
        assert_eq!(config.health.slow_threshold, Duration::from_millis(1500));
        assert_eq!(config.selector.live_check_timeout, Duration::from_millis(2500));
        assert_eq!(config.scan.lookback_blocks, 300_000);
        assert_eq!(config.scan.chunk_size, 20_000);
        assert_eq!(config.bootstrap.max_endpoints_per_service, 5);
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("RPC_TIMEOUT_MS", "5000"),
            ("SCAN_CHUNK_BLOCKS", "1000"),
            ("DEFAULT_LOOKBACK_BLOCKS", "40000"),
            ("RPC_RECHECK_INTERVAL_SEC", "60"),
        ]))
        .unwrap();

        assert_eq!(config.health.probe_timeout, Duration::from_millis(5000));
        assert_eq!(config.health.recheck_interval, Duration::from_secs(60));
        assert_eq!(config.scan.chunk_size, 1000);
        assert_eq!(config.scan.lookback_blocks, 40_000);
    }

    #[test]
    fn unparsable_value_is_rejected() {
        let err = Config::from_lookup(lookup(&[("SCAN_CHUNK_BLOCKS", "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "SCAN_CHUNK_BLOCKS", .. }));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let err = Config::from_lookup(lookup(&[("SCAN_CHUNK_BLOCKS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "SCAN_CHUNK_BLOCKS", .. }));
    }

    #[test]
    fn builder_last_call_wins() {
        let scan = ScanConfig::default().chunk_size(10).chunk_size(50).lookback_blocks(7);
        assert_eq!(scan.chunk_size, 50);
        assert_eq!(scan.lookback_blocks, 7);
    }
}
