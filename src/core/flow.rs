//! Flow keys and per-flow aggregates
//!
//! A flow is a bidirectional conversation between two endpoints over one
//! protocol. Both directions map to the same key.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::packet::PacketEvent;

/// Canonical flow identifier: address pair sorted so that `(A,B,proto)` and
/// `(B,A,proto)` collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowKey {
    pub addr_lo: IpAddr,
    pub addr_hi: IpAddr,
    pub protocol: u8,
}

impl FlowKey {
    /// Build a key from an endpoint pair, order-independent
    pub fn new(a: IpAddr, b: IpAddr, protocol: u8) -> Self {
        if a <= b {
            Self { addr_lo: a, addr_hi: b, protocol }
        } else {
            Self { addr_lo: b, addr_hi: a, protocol }
        }
    }

    /// Derive the key for a packet event. `None` when either address is
    /// missing; such packets are dropped from flow tracking.
    pub fn from_event(evt: &PacketEvent) -> Option<Self> {
        match (evt.src_ip, evt.dst_ip) {
            (Some(src), Some(dst)) => {
                Some(Self::new(src, dst, evt.protocol.unwrap_or(0)))
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for FlowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}_{}", self.addr_lo, self.addr_hi, self.protocol)
    }
}

/// Mutable per-flow aggregate, owned by the flow table while the flow is
/// live and destroyed on expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowRecord {
    /// Flow key
    pub key: FlowKey,
    /// Packets observed
    pub packet_count: u64,
    /// Cumulative bytes
    pub byte_count: u64,
    /// First packet time
    pub first_seen: DateTime<Utc>,
    /// Most recent packet time
    pub last_seen: DateTime<Utc>,
    /// Inter-arrival intervals in seconds, arrival order
    pub intervals: Vec<f64>,
    /// Packet sizes in bytes, arrival order
    pub packet_sizes: Vec<usize>,
}

impl FlowRecord {
    /// Initialize from the first packet of a flow
    pub fn new(key: FlowKey, evt: &PacketEvent) -> Self {
        Self {
            key,
            packet_count: 1,
            byte_count: evt.length as u64,
            first_seen: evt.timestamp,
            last_seen: evt.timestamp,
            intervals: Vec::new(),
            packet_sizes: vec![evt.length],
        }
    }

    /// Fold a subsequent packet into the aggregate.
    ///
    /// A non-monotonic or duplicate timestamp yields a zero interval,
    /// never a negative one.
    pub fn update(&mut self, evt: &PacketEvent) {
        let gap = (evt.timestamp - self.last_seen)
            .num_microseconds()
            .map(|us| us as f64 / 1_000_000.0)
            .unwrap_or(0.0);
        self.intervals.push(gap.max(0.0));

        self.packet_count += 1;
        self.byte_count += evt.length as u64;
        self.last_seen = evt.timestamp;
        self.packet_sizes.push(evt.length);
    }

    /// Flow duration in seconds (last seen minus first seen)
    pub fn duration_secs(&self) -> f64 {
        (self.last_seen - self.first_seen)
            .num_microseconds()
            .map(|us| us as f64 / 1_000_000.0)
            .unwrap_or(0.0)
    }

    /// Seconds this flow has been idle relative to `now`
    pub fn idle_secs(&self, now: DateTime<Utc>) -> f64 {
        (now - self.last_seen)
            .num_microseconds()
            .map(|us| us as f64 / 1_000_000.0)
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::net::Ipv4Addr;

    fn addr(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_flow_key_symmetry() {
        let k1 = FlowKey::new(addr(1), addr(2), 6);
        let k2 = FlowKey::new(addr(2), addr(1), 6);
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_flow_key_protocol_distinguishes() {
        let tcp = FlowKey::new(addr(1), addr(2), 6);
        let udp = FlowKey::new(addr(1), addr(2), 17);
        assert_ne!(tcp, udp);
    }

    #[test]
    fn test_flow_key_requires_both_addresses() {
        let evt = PacketEvent {
            timestamp: at(0),
            src_ip: Some(addr(1)),
            dst_ip: None,
            protocol: Some(6),
            length: 60,
            payload: None,
        };
        assert!(FlowKey::from_event(&evt).is_none());
    }

    #[test]
    fn test_record_update() {
        let e0 = PacketEvent::new(at(0), addr(1), addr(2), 6, 100);
        let key = FlowKey::from_event(&e0).unwrap();
        let mut rec = FlowRecord::new(key, &e0);

        rec.update(&PacketEvent::new(at(1), addr(2), addr(1), 6, 150));
        rec.update(&PacketEvent::new(at(2), addr(1), addr(2), 6, 120));

        assert_eq!(rec.packet_count, 3);
        assert_eq!(rec.byte_count, 370);
        assert_eq!(rec.intervals, vec![1.0, 1.0]);
        assert_eq!(rec.duration_secs(), 2.0);
    }

    #[test]
    fn test_non_monotonic_interval_clamped() {
        let e0 = PacketEvent::new(at(10), addr(1), addr(2), 6, 100);
        let key = FlowKey::from_event(&e0).unwrap();
        let mut rec = FlowRecord::new(key, &e0);

        // Timestamp goes backwards
        rec.update(&PacketEvent::new(at(5), addr(1), addr(2), 6, 100));

        assert_eq!(rec.intervals, vec![0.0]);
        // last_seen still moves to the event time
        assert_eq!(rec.last_seen, at(5));
    }
}
