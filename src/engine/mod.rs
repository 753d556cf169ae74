//! Pipeline coordinator
//!
//! Wires the detectors into a staged pipeline over bounded channels:
//!
//! ```text
//! packets -> fan-out -+-> signature worker ----------------+-> alert worker -> sink
//!                     +-> flow worker -> anomaly worker ---+
//! ```
//!
//! Each stage runs on its own thread and polls its queue with a short
//! timeout so the stop flag is observed promptly. A full queue either
//! blocks the producer or drops the item, per the configured policy.

pub mod workers;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::alert::AlertSink;
use crate::core::PacketEvent;
use crate::flow::FlowTracker;
use crate::ml::AnomalyEngine;
use crate::signatures::SignatureEngine;

/// What to do when a bounded stage queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Block the producer until the queue has room
    Block,
    /// Drop the item and count it
    Drop,
}

/// Pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of each stage queue
    pub queue_capacity: usize,
    /// Behavior when a stage queue is full
    pub backpressure: BackpressurePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            backpressure: BackpressurePolicy::Block,
        }
    }
}

/// Shared pipeline counters
#[derive(Debug, Default)]
pub(crate) struct StatsInner {
    pub packets_in: AtomicU64,
    pub packets_dropped: AtomicU64,
    pub signature_alerts: AtomicU64,
    pub anomaly_alerts: AtomicU64,
    pub feature_batches: AtomicU64,
    pub alerts_emitted: AtomicU64,
}

/// Point-in-time pipeline statistics
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub packets_in: u64,
    pub packets_dropped: u64,
    pub signature_alerts: u64,
    pub anomaly_alerts: u64,
    pub feature_batches: u64,
    pub alerts_emitted: u64,
}

impl StatsInner {
    fn snapshot(&self) -> EngineStats {
        EngineStats {
            packets_in: self.packets_in.load(Ordering::Relaxed),
            packets_dropped: self.packets_dropped.load(Ordering::Relaxed),
            signature_alerts: self.signature_alerts.load(Ordering::Relaxed),
            anomaly_alerts: self.anomaly_alerts.load(Ordering::Relaxed),
            feature_batches: self.feature_batches.load(Ordering::Relaxed),
            alerts_emitted: self.alerts_emitted.load(Ordering::Relaxed),
        }
    }
}

/// Producer handle for feeding packets into the pipeline.
/// Cheap to clone; honors the configured backpressure policy.
#[derive(Clone)]
pub struct PacketSender {
    tx: Sender<PacketEvent>,
    policy: BackpressurePolicy,
    stats: Arc<StatsInner>,
}

impl PacketSender {
    /// Submit one packet. Returns false when the pipeline has shut down
    /// or the packet was dropped under the drop policy.
    pub fn send(&self, event: PacketEvent) -> bool {
        self.stats.packets_in.fetch_add(1, Ordering::Relaxed);
        match self.policy {
            BackpressurePolicy::Block => self.tx.send(event).is_ok(),
            BackpressurePolicy::Drop => match self.tx.try_send(event) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    self.stats.packets_dropped.fetch_add(1, Ordering::Relaxed);
                    false
                }
                Err(TrySendError::Disconnected(_)) => false,
            },
        }
    }
}

/// A running pipeline. Dropping it without calling [`Engine::stop`]
/// detaches the workers; call `stop` for an orderly shutdown.
pub struct Engine {
    packet_tx: Sender<PacketEvent>,
    stop: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<StatsInner>,
    policy: BackpressurePolicy,
}

impl Engine {
    /// Spawn all pipeline workers and return the running engine
    pub fn start(
        config: EngineConfig,
        signatures: SignatureEngine,
        tracker: FlowTracker,
        anomaly: AnomalyEngine,
        sink: Box<dyn AlertSink>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(StatsInner::default());

        let cap = config.queue_capacity;
        let (packet_tx, packet_rx) = bounded::<PacketEvent>(cap);
        let (sig_tx, sig_rx) = bounded::<PacketEvent>(cap);
        let (flow_tx, flow_rx) = bounded::<PacketEvent>(cap);
        let (feature_tx, feature_rx) = bounded(cap);
        let (alert_tx, alert_rx) = bounded(cap);

        let mut workers = Vec::with_capacity(5);

        {
            let stop = stop.clone();
            let stats = stats.clone();
            let policy = config.backpressure;
            workers.push(
                std::thread::Builder::new()
                    .name("fanout".into())
                    .spawn(move || {
                        workers::fanout_worker(packet_rx, sig_tx, flow_tx, policy, stop, stats)
                    })
                    .expect("spawn fanout worker"),
            );
        }
        {
            let stop = stop.clone();
            let stats = stats.clone();
            let alert_tx = alert_tx.clone();
            workers.push(
                std::thread::Builder::new()
                    .name("signatures".into())
                    .spawn(move || {
                        workers::signature_worker(sig_rx, alert_tx, signatures, stop, stats)
                    })
                    .expect("spawn signature worker"),
            );
        }
        {
            let stop = stop.clone();
            let stats = stats.clone();
            workers.push(
                std::thread::Builder::new()
                    .name("flows".into())
                    .spawn(move || {
                        workers::flow_worker(flow_rx, feature_tx, tracker, stop, stats)
                    })
                    .expect("spawn flow worker"),
            );
        }
        {
            let stop = stop.clone();
            let stats = stats.clone();
            workers.push(
                std::thread::Builder::new()
                    .name("anomaly".into())
                    .spawn(move || {
                        workers::anomaly_worker(feature_rx, alert_tx, anomaly, stop, stats)
                    })
                    .expect("spawn anomaly worker"),
            );
        }
        {
            let stop = stop.clone();
            let stats = stats.clone();
            workers.push(
                std::thread::Builder::new()
                    .name("alerts".into())
                    .spawn(move || workers::alert_worker(alert_rx, sink, stop, stats))
                    .expect("spawn alert worker"),
            );
        }

        info!("Pipeline started with {} workers", workers.len());

        Self {
            packet_tx,
            stop,
            workers,
            stats,
            policy: config.backpressure,
        }
    }

    /// Producer handle for packet sources
    pub fn sender(&self) -> PacketSender {
        PacketSender {
            tx: self.packet_tx.clone(),
            policy: self.policy,
            stats: self.stats.clone(),
        }
    }

    /// Current pipeline counters
    pub fn stats(&self) -> EngineStats {
        self.stats.snapshot()
    }

    /// Signal shutdown and join every worker. Queued items still in
    /// flight are processed before the workers exit.
    pub fn stop(self) {
        info!("Stopping pipeline");
        let Self { packet_tx, stop, workers, stats, .. } = self;
        stop.store(true, Ordering::SeqCst);
        // closing the ingest channel lets the fan-out drain and exit
        drop(packet_tx);
        for handle in workers {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                warn!("Worker {name} panicked during shutdown");
            }
        }
        let stats = stats.snapshot();
        info!(
            packets = stats.packets_in,
            dropped = stats.packets_dropped,
            alerts = stats.alerts_emitted,
            "Pipeline stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.queue_capacity, 10_000);
        assert_eq!(config.backpressure, BackpressurePolicy::Block);
    }

    #[test]
    fn test_policy_deserializes() {
        let config: EngineConfig =
            toml::from_str("queue_capacity = 64\nbackpressure = \"drop\"").unwrap();
        assert_eq!(config.queue_capacity, 64);
        assert_eq!(config.backpressure, BackpressurePolicy::Drop);
    }
}
