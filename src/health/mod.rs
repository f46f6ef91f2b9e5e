//! Endpoint health: the single-row probe, the background refresh loop, and the ranking used to
//! order candidates.

mod monitor;
mod prober;
mod ranking;

pub use monitor::HealthMonitor;
pub use prober::{HealthProber, ProbeOutcome, ProbeReport};
pub use ranking::{compare_rows, rank_rows};
