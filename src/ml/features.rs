//! Feature extraction from matured flows
//!
//! Converts a flow record into the fixed numeric schema consumed by the
//! anomaly detector. The schema is a wire-stable contract: the named
//! numeric fields below plus the non-numeric `flow_key`/`timestamp`
//! metadata, which the detector excludes from the numeric matrix.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::flow::{FlowKey, FlowRecord};

/// Names of the numeric features, in matrix column order
pub const NUMERIC_FEATURE_NAMES: &[&str] = &[
    "packet_count",
    "byte_count",
    "duration",
    "packets_per_second",
    "bytes_per_second",
    "mean_packet_size",
    "std_packet_size",
    "min_packet_size",
    "max_packet_size",
    "mean_interval",
    "std_interval",
];

/// Number of numeric features
pub const NUM_FEATURES: usize = 11;

/// Fixed-schema numeric summary of a matured flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Flow this vector summarizes (metadata, not a model input)
    pub flow_key: FlowKey,
    /// Reference timestamp: last packet of the flow (metadata)
    pub timestamp: DateTime<Utc>,

    pub packet_count: u64,
    pub byte_count: u64,
    pub duration: f64,
    pub packets_per_second: f64,
    pub bytes_per_second: f64,
    pub mean_packet_size: f64,
    pub std_packet_size: f64,
    pub min_packet_size: f64,
    pub max_packet_size: f64,
    pub mean_interval: f64,
    pub std_interval: f64,
}

impl FeatureVector {
    /// The numeric fields as a matrix row, in `NUMERIC_FEATURE_NAMES`
    /// order. Excludes `flow_key` and `timestamp`.
    pub fn to_numeric(&self) -> Vec<f64> {
        vec![
            self.packet_count as f64,
            self.byte_count as f64,
            self.duration,
            self.packets_per_second,
            self.bytes_per_second,
            self.mean_packet_size,
            self.std_packet_size,
            self.min_packet_size,
            self.max_packet_size,
            self.mean_interval,
            self.std_interval,
        ]
    }

    /// Get a numeric feature by name
    pub fn get(&self, name: &str) -> Option<f64> {
        NUMERIC_FEATURE_NAMES
            .iter()
            .position(|&n| n == name)
            .map(|idx| self.to_numeric()[idx])
    }
}

/// Extract a feature vector from a flow record.
///
/// Returns `None` below 2 packets (no interval statistics possible).
/// Rates are defined as 0 when the duration is not positive.
pub fn extract(record: &FlowRecord) -> Option<FeatureVector> {
    if record.packet_count < 2 {
        return None;
    }

    let (mean_size, std_size) = mean_std(
        &record.packet_sizes.iter().map(|&s| s as f64).collect::<Vec<_>>(),
    );
    let min_size = record.packet_sizes.iter().copied().min().unwrap_or(0) as f64;
    let max_size = record.packet_sizes.iter().copied().max().unwrap_or(0) as f64;

    let (mean_interval, std_interval) = if record.intervals.is_empty() {
        (0.0, 0.0)
    } else {
        mean_std(&record.intervals)
    };

    let duration = record.duration_secs();
    let (pps, bps) = if duration > 0.0 {
        (
            record.packet_count as f64 / duration,
            record.byte_count as f64 / duration,
        )
    } else {
        (0.0, 0.0)
    };

    Some(FeatureVector {
        flow_key: record.key.clone(),
        timestamp: record.last_seen,
        packet_count: record.packet_count,
        byte_count: record.byte_count,
        duration,
        packets_per_second: pps,
        bytes_per_second: bps,
        mean_packet_size: mean_size,
        std_packet_size: std_size,
        min_packet_size: min_size,
        max_packet_size: max_size,
        mean_interval,
        std_interval,
    })
}

/// Population mean and standard deviation (denominator N), matching the
/// scaling used on the training side.
fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / values.len() as f64;
    (mean, variance.sqrt())
}
