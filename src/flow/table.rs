//! Keyed flow storage with capacity eviction and idle expiry
//!
//! Owned exclusively by the flow worker; no external locking.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::core::flow::{FlowKey, FlowRecord};
use crate::core::packet::PacketEvent;

/// Hash table for live flow records
pub struct FlowTable {
    flows: HashMap<FlowKey, FlowRecord>,
    max_size: usize,
    /// Flows evicted by the capacity policy
    pub evictions: u64,
}

impl FlowTable {
    /// Create a table bounded to `max_size` flows
    pub fn new(max_size: usize) -> Self {
        Self {
            flows: HashMap::with_capacity(max_size.min(10_000)),
            max_size,
            evictions: 0,
        }
    }

    /// Insert-or-update the record for `key` with a packet event.
    /// Returns true when a new flow was created.
    pub fn upsert(&mut self, key: FlowKey, evt: &PacketEvent) -> bool {
        if let Some(record) = self.flows.get_mut(&key) {
            record.update(evt);
            return false;
        }

        if self.flows.len() >= self.max_size {
            self.evict_oldest();
        }
        self.flows.insert(key.clone(), FlowRecord::new(key, evt));
        true
    }

    /// Get a record by key
    pub fn get(&self, key: &FlowKey) -> Option<&FlowRecord> {
        self.flows.get(key)
    }

    /// Current flow count
    pub fn len(&self) -> usize {
        self.flows.len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }

    /// Remove and return every mature flow idle for more than
    /// `idle_threshold_secs`. Immature flows stay in the table regardless
    /// of idle time; only the capacity policy removes them.
    pub fn drain_expired(
        &mut self,
        now: DateTime<Utc>,
        idle_threshold_secs: f64,
        min_packets: u64,
    ) -> Vec<FlowRecord> {
        let expired_keys: Vec<FlowKey> = self
            .flows
            .iter()
            .filter(|(_, rec)| {
                rec.packet_count >= min_packets && rec.idle_secs(now) > idle_threshold_secs
            })
            .map(|(key, _)| key.clone())
            .collect();

        let mut expired = Vec::with_capacity(expired_keys.len());
        for key in expired_keys {
            if let Some(rec) = self.flows.remove(&key) {
                expired.push(rec);
            }
        }
        expired
    }

    /// Evict the flow with the oldest last-seen time
    fn evict_oldest(&mut self) {
        if let Some(oldest_key) = self
            .flows
            .iter()
            .min_by_key(|(_, rec)| rec.last_seen)
            .map(|(k, _)| k.clone())
        {
            self.flows.remove(&oldest_key);
            self.evictions += 1;
        }
    }
}
