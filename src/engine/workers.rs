//! Stage worker loops
//!
//! Every worker polls its queue with a short timeout so it can notice the
//! stop flag, and exits once its upstream channel disconnects and drains.
//! A bad item is logged and skipped; a worker never dies on input.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, trace};

use crate::alert::AlertSink;
use crate::core::{Alert, PacketEvent};
use crate::flow::FlowTracker;
use crate::ml::{self, AnomalyEngine, FeatureVector};
use crate::signatures::SignatureEngine;

use super::{BackpressurePolicy, StatsInner};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Forward one item downstream under the given policy. Returns false only
/// when the receiver is gone.
fn forward<T>(
    tx: &Sender<T>,
    item: T,
    policy: BackpressurePolicy,
    stats: &StatsInner,
) -> bool {
    match policy {
        BackpressurePolicy::Block => tx.send(item).is_ok(),
        BackpressurePolicy::Drop => match tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                stats.packets_dropped.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        },
    }
}

/// Clones each packet to the signature and flow queues
pub(super) fn fanout_worker(
    rx: Receiver<PacketEvent>,
    sig_tx: Sender<PacketEvent>,
    flow_tx: Sender<PacketEvent>,
    policy: BackpressurePolicy,
    stop: Arc<AtomicBool>,
    stats: Arc<StatsInner>,
) {
    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(event) => {
                if !forward(&sig_tx, event.clone(), policy, &stats) {
                    break;
                }
                if !forward(&flow_tx, event, policy, &stats) {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Fan-out worker exiting");
}

/// Evaluates each packet against the active rule set
pub(super) fn signature_worker(
    rx: Receiver<PacketEvent>,
    alert_tx: Sender<Alert>,
    signatures: SignatureEngine,
    stop: Arc<AtomicBool>,
    stats: Arc<StatsInner>,
) {
    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(event) => {
                let alerts = signatures.evaluate(&event);
                stats
                    .signature_alerts
                    .fetch_add(alerts.len() as u64, Ordering::Relaxed);
                for alert in alerts {
                    if alert_tx.send(alert).is_err() {
                        return;
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Signature worker exiting");
}

/// Tracks flows and, on the configured cadence, turns expired mature
/// flows into one feature-vector batch
pub(super) fn flow_worker(
    rx: Receiver<PacketEvent>,
    feature_tx: Sender<Vec<FeatureVector>>,
    mut tracker: FlowTracker,
    stop: Arc<AtomicBool>,
    stats: Arc<StatsInner>,
) {
    let check_interval = Duration::from_secs(tracker.check_interval_secs());
    let mut last_check = Instant::now();

    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(event) => tracker.ingest(&event),
            Err(RecvTimeoutError::Timeout) => {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if last_check.elapsed() >= check_interval {
            last_check = Instant::now();
            let expired = tracker.drain_expired(Utc::now());
            if expired.is_empty() {
                continue;
            }
            trace!("Expired {} flows", expired.len());
            let batch: Vec<FeatureVector> =
                expired.iter().filter_map(ml::extract).collect();
            if batch.is_empty() {
                continue;
            }
            stats.feature_batches.fetch_add(1, Ordering::Relaxed);
            if feature_tx.send(batch).is_err() {
                break;
            }
        }
    }
    let flow_stats = tracker.stats();
    debug!(
        tracked = flow_stats.packets_tracked,
        created = flow_stats.flows_created,
        expired = flow_stats.flows_expired,
        evicted = flow_stats.flows_evicted,
        active = flow_stats.active_flows,
        "Flow worker exiting"
    );
}

/// Feeds feature batches through the anomaly engine
pub(super) fn anomaly_worker(
    rx: Receiver<Vec<FeatureVector>>,
    alert_tx: Sender<Alert>,
    mut anomaly: AnomalyEngine,
    stop: Arc<AtomicBool>,
    stats: Arc<StatsInner>,
) {
    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(batch) => {
                let alerts = anomaly.process_batch(batch);
                stats
                    .anomaly_alerts
                    .fetch_add(alerts.len() as u64, Ordering::Relaxed);
                for alert in alerts {
                    if alert_tx.send(alert).is_err() {
                        return;
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    let ml_stats = anomaly.stats();
    debug!(
        vectors = ml_stats.vectors_seen,
        corpus = ml_stats.corpus_size,
        fits = ml_stats.fits_completed,
        flagged = ml_stats.anomalies_flagged,
        "Anomaly worker exiting"
    );
}

/// Delivers alerts from both detectors to the sink
pub(super) fn alert_worker(
    rx: Receiver<Alert>,
    sink: Box<dyn AlertSink>,
    stop: Arc<AtomicBool>,
    stats: Arc<StatsInner>,
) {
    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(alert) => {
                stats.alerts_emitted.fetch_add(1, Ordering::Relaxed);
                sink.emit(alert);
            }
            Err(RecvTimeoutError::Timeout) => {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Alert worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_forward_drop_policy_counts_drops() {
        let stats = StatsInner::default();
        let (tx, _rx) = bounded::<u32>(1);

        assert!(forward(&tx, 1, BackpressurePolicy::Drop, &stats));
        // queue is full now; the item is dropped but forwarding continues
        assert!(forward(&tx, 2, BackpressurePolicy::Drop, &stats));
        assert_eq!(stats.packets_dropped.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_forward_detects_disconnect() {
        let stats = StatsInner::default();
        let (tx, rx) = bounded::<u32>(1);
        drop(rx);
        assert!(!forward(&tx, 1, BackpressurePolicy::Drop, &stats));
    }
}
