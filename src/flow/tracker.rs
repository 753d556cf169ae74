//! Flow tracker
//!
//! Facade over the flow table: folds packet events into per-flow
//! aggregates and drains matured flows once idle.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::core::flow::{FlowKey, FlowRecord};
use crate::core::packet::PacketEvent;

use super::table::FlowTable;
use super::{FlowConfig, TrackerStats};

/// Main flow tracking engine
pub struct FlowTracker {
    config: FlowConfig,
    table: FlowTable,
    stats: TrackerStats,
}

impl FlowTracker {
    /// Create a new flow tracker
    pub fn new(config: FlowConfig) -> Self {
        info!(
            "Initializing flow tracker (table_size={}, idle_timeout={}s, min_packets={})",
            config.table_size, config.idle_timeout_secs, config.min_packets
        );

        Self {
            table: FlowTable::new(config.table_size),
            config,
            stats: TrackerStats::default(),
        }
    }

    /// Fold a packet event into its flow. Events without both addresses
    /// are dropped from flow tracking (they still reach the signature
    /// path upstream).
    pub fn ingest(&mut self, evt: &PacketEvent) {
        let Some(key) = FlowKey::from_event(evt) else {
            self.stats.packets_unkeyed += 1;
            return;
        };

        if self.table.upsert(key, evt) {
            self.stats.flows_created += 1;
        }
        self.stats.packets_tracked += 1;
        self.stats.active_flows = self.table.len();
    }

    /// Remove and return every mature flow idle for longer than the
    /// configured window, relative to `now`.
    pub fn drain_expired(&mut self, now: DateTime<Utc>) -> Vec<FlowRecord> {
        let expired = self.table.drain_expired(
            now,
            self.config.idle_timeout_secs as f64,
            self.config.min_packets,
        );

        if !expired.is_empty() {
            debug!("Drained {} expired flows", expired.len());
            self.stats.flows_expired += expired.len() as u64;
        }
        self.stats.flows_evicted = self.table.evictions;
        self.stats.active_flows = self.table.len();
        expired
    }

    /// Look up a live flow
    pub fn get_flow(&self, key: &FlowKey) -> Option<&FlowRecord> {
        self.table.get(key)
    }

    /// Current active flow count
    pub fn active_flows(&self) -> usize {
        self.table.len()
    }

    /// Tracker statistics
    pub fn stats(&self) -> &TrackerStats {
        &self.stats
    }

    /// Configured expiry sweep cadence
    pub fn check_interval_secs(&self) -> u64 {
        self.config.check_interval_secs
    }
}
