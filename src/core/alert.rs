//! Alerts
//!
//! Closed record types per alert kind. Once emitted, an alert is owned by
//! the sink.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::flow::FlowKey;
use crate::ml::features::FeatureVector;

/// Which detector produced the alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    Signature,
    Anomaly,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::Signature => write!(f, "SIGNATURE"),
            AlertKind::Anomaly => write!(f, "ANOMALY"),
        }
    }
}

/// Kind-specific alert context
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertContext {
    /// A rule's declared conditions matched a single packet
    Signature {
        rule_id: String,
        src_ip: Option<IpAddr>,
        dst_ip: Option<IpAddr>,
        protocol: Option<u8>,
    },
    /// The model flagged a matured flow as statistically unusual
    Anomaly {
        flow_key: FlowKey,
        features: FeatureVector,
    },
}

/// An alert raised by either detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Unique alert ID
    pub id: Uuid,
    /// When the triggering traffic was observed
    pub timestamp: DateTime<Utc>,
    /// Detector kind
    pub alert_type: AlertKind,
    /// Confidence / score magnitude
    pub confidence: f64,
    /// Human-readable description
    pub description: String,
    /// Kind-specific context
    pub context: AlertContext,
}

impl Alert {
    /// Build a signature alert for a matched rule
    pub fn signature(
        timestamp: DateTime<Utc>,
        rule_id: String,
        description: String,
        confidence: f64,
        src_ip: Option<IpAddr>,
        dst_ip: Option<IpAddr>,
        protocol: Option<u8>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            alert_type: AlertKind::Signature,
            confidence,
            description,
            context: AlertContext::Signature { rule_id, src_ip, dst_ip, protocol },
        }
    }

    /// Build an anomaly alert carrying the flagged feature snapshot
    pub fn anomaly(features: FeatureVector, score: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: features.timestamp,
            alert_type: AlertKind::Anomaly,
            confidence: score,
            description: "Anomalous network flow detected".to_string(),
            context: AlertContext::Anomaly {
                flow_key: features.flow_key.clone(),
                features,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_signature_alert() {
        let alert = Alert::signature(
            Utc::now(),
            "r-001".to_string(),
            "Suspicious payload".to_string(),
            0.9,
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))),
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))),
            Some(6),
        );

        assert_eq!(alert.alert_type, AlertKind::Signature);
        match alert.context {
            AlertContext::Signature { ref rule_id, protocol, .. } => {
                assert_eq!(rule_id, "r-001");
                assert_eq!(protocol, Some(6));
            }
            _ => panic!("wrong context"),
        }
    }

    #[test]
    fn test_alert_serializes() {
        let alert = Alert::signature(
            Utc::now(),
            "r-002".to_string(),
            "test".to_string(),
            1.0,
            None,
            None,
            None,
        );
        let json = serde_json::to_string(&alert).unwrap();
        assert!(json.contains("SIGNATURE"));
    }
}
