//! Flow tracking engine
//!
//! Correlates packet events into bidirectional flows, keyed by the
//! canonical (sorted address pair, protocol) tuple, and emits matured
//! flows once they go idle.

pub mod table;
pub mod tracker;

pub use table::FlowTable;
pub use tracker::FlowTracker;

use serde::{Deserialize, Serialize};

/// Configuration for flow tracking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Seconds of inactivity after which a flow is complete
    pub idle_timeout_secs: u64,
    /// Minimum packets before a flow is eligible for feature emission
    pub min_packets: u64,
    /// Maximum concurrent flows before oldest-by-last-seen eviction
    pub table_size: usize,
    /// Seconds between expiry sweeps
    pub check_interval_secs: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 60,
            min_packets: 5,
            table_size: 100_000,
            check_interval_secs: 10,
        }
    }
}

/// Flow tracking statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerStats {
    /// Packets folded into flows
    pub packets_tracked: u64,
    /// Packets dropped for missing addresses
    pub packets_unkeyed: u64,
    /// Flows created
    pub flows_created: u64,
    /// Mature flows drained on expiry
    pub flows_expired: u64,
    /// Flows evicted by the capacity policy
    pub flows_evicted: u64,
    /// Current active flows
    pub active_flows: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FlowConfig::default();
        assert_eq!(config.idle_timeout_secs, 60);
        assert_eq!(config.min_packets, 5);
        assert_eq!(config.table_size, 100_000);
    }
}
