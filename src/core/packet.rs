//! Packet events
//!
//! The input record for the whole pipeline. Produced by a capture or replay
//! source, consumed by the signature and flow paths.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single observed packet, reduced to the fields the detectors need.
///
/// Addresses, protocol, and payload are optional: a truncated or non-IP
/// frame still carries a timestamp and a length. Once constructed the event
/// is immutable and is moved (not shared) from stage to stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketEvent {
    /// Capture timestamp
    pub timestamp: DateTime<Utc>,
    /// Source address, if the IP layer was parsed
    pub src_ip: Option<IpAddr>,
    /// Destination address, if the IP layer was parsed
    pub dst_ip: Option<IpAddr>,
    /// IP protocol number (6 = TCP, 17 = UDP, ...)
    pub protocol: Option<u8>,
    /// Total packet length in bytes
    pub length: usize,
    /// Best-effort payload view; absent when capture did not include it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,
}

impl PacketEvent {
    /// Create an event with both endpoints known
    pub fn new(
        timestamp: DateTime<Utc>,
        src_ip: IpAddr,
        dst_ip: IpAddr,
        protocol: u8,
        length: usize,
    ) -> Self {
        Self {
            timestamp,
            src_ip: Some(src_ip),
            dst_ip: Some(dst_ip),
            protocol: Some(protocol),
            length,
            payload: None,
        }
    }

    /// Attach a payload view
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    /// True when both endpoint addresses were parsed
    pub fn has_endpoints(&self) -> bool {
        self.src_ip.is_some() && self.dst_ip.is_some()
    }

    /// Payload decoded as best-effort text (invalid bytes replaced)
    pub fn payload_text(&self) -> Option<String> {
        self.payload
            .as_deref()
            .map(|p| String::from_utf8_lossy(p).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn addr(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn test_endpoints() {
        let evt = PacketEvent::new(Utc::now(), addr(1), addr(2), 6, 100);
        assert!(evt.has_endpoints());

        let partial = PacketEvent {
            timestamp: Utc::now(),
            src_ip: Some(addr(1)),
            dst_ip: None,
            protocol: Some(6),
            length: 60,
            payload: None,
        };
        assert!(!partial.has_endpoints());
    }

    #[test]
    fn test_payload_text_lossy() {
        let evt = PacketEvent::new(Utc::now(), addr(1), addr(2), 6, 100)
            .with_payload(vec![b'G', b'E', b'T', 0xFF, b'/']);
        let text = evt.payload_text().unwrap();
        assert!(text.starts_with("GET"));
        assert!(text.ends_with('/'));
    }
}
