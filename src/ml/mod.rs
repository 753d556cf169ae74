//! Anomaly detection engine
//!
//! Consumes feature-vector batches from the flow path. Grows a bounded
//! training corpus from unlabeled traffic, fits an isolation forest plus
//! feature scaler once enough data accumulates, and scores new batches
//! against the current model.
//!
//! The `(forest, scaler)` pair from one fit always travels together: they
//! are bundled in a single [`TrainedModel`] behind one swapped `Arc`, so a
//! concurrent reader sees either the old fit or the new one, never a mix.

pub mod features;
pub mod forest;
pub mod scaler;
pub mod storage;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::alert::Alert;

pub use features::{extract, FeatureVector, NUMERIC_FEATURE_NAMES, NUM_FEATURES};
pub use forest::{ForestConfig, IsolationForest};
pub use scaler::StandardScaler;
pub use storage::ModelPaths;

/// Anomaly engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Maximum feature vectors kept in the training corpus. The corpus is
    /// closed once full; no eviction.
    pub corpus_capacity: usize,
    /// Corpus size that triggers the first fit
    pub min_train_samples: usize,
    /// Train from live traffic even when a model already exists, and
    /// suppress scoring
    pub learning_mode: bool,
    /// Base path for the persisted scorer/scaler pair
    pub model_path: Option<PathBuf>,
    /// Forest hyperparameters
    pub forest: ForestConfig,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            corpus_capacity: 10_000,
            min_train_samples: 1_000,
            learning_mode: false,
            model_path: None,
            forest: ForestConfig::default(),
        }
    }
}

/// Model lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelState {
    /// No model, corpus below the training threshold
    Untrained,
    /// Corpus large enough to fit, no model yet
    TrainingEligible,
    /// A fitted model is live
    Trained,
}

/// One fit's scorer and scaler, swapped atomically as a unit
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub forest: IsolationForest,
    pub scaler: StandardScaler,
    pub trained_at: DateTime<Utc>,
    pub sample_count: usize,
}

/// Anomaly engine statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnomalyStats {
    pub vectors_seen: u64,
    pub corpus_size: usize,
    pub fits_completed: u64,
    pub anomalies_flagged: u64,
}

/// Online-trained anomaly detector
pub struct AnomalyEngine {
    config: AnomalyConfig,
    corpus: Vec<FeatureVector>,
    model: Arc<RwLock<Option<Arc<TrainedModel>>>>,
    stats: AnomalyStats,
}

impl AnomalyEngine {
    /// Create an engine; loads a persisted model pair if one exists at
    /// the configured base path, otherwise starts untrained.
    pub fn new(config: AnomalyConfig) -> Self {
        let mut engine = Self {
            corpus: Vec::with_capacity(config.min_train_samples.min(config.corpus_capacity)),
            model: Arc::new(RwLock::new(None)),
            stats: AnomalyStats::default(),
            config,
        };

        if let Some(base) = engine.config.model_path.clone() {
            let paths = ModelPaths::from_base(&base);
            if paths.exist() {
                match storage::load(&paths) {
                    Ok((forest, scaler)) => {
                        info!("Loaded persisted anomaly model from {:?}", paths.model);
                        *engine.model.write() = Some(Arc::new(TrainedModel {
                            forest,
                            scaler,
                            trained_at: Utc::now(),
                            sample_count: 0,
                        }));
                    }
                    Err(e) => warn!("Failed to load persisted model, starting untrained: {e}"),
                }
            }
        }

        engine
    }

    /// Current lifecycle state
    pub fn state(&self) -> ModelState {
        if self.model.read().is_some() {
            ModelState::Trained
        } else if self.corpus.len() >= self.config.min_train_samples {
            ModelState::TrainingEligible
        } else {
            ModelState::Untrained
        }
    }

    /// Handle to the swapped model reference, for concurrent scorers
    pub fn model_handle(&self) -> Arc<RwLock<Option<Arc<TrainedModel>>>> {
        self.model.clone()
    }

    /// Engine statistics
    pub fn stats(&self) -> AnomalyStats {
        AnomalyStats {
            corpus_size: self.corpus.len(),
            ..self.stats.clone()
        }
    }

    /// Process one feature-vector batch. Grows the corpus, fits when the
    /// trigger condition holds, and scores when a model is live and the
    /// engine is not in pure learning mode. Returns anomaly alerts.
    pub fn process_batch(&mut self, batch: Vec<FeatureVector>) -> Vec<Alert> {
        if batch.is_empty() {
            return Vec::new();
        }
        self.stats.vectors_seen += batch.len() as u64;

        // Corpus growth: closed once full
        if self.corpus.len() < self.config.corpus_capacity {
            let room = self.config.corpus_capacity - self.corpus.len();
            self.corpus.extend(batch.iter().take(room).cloned());

            let should_train = self.corpus.len() >= self.config.min_train_samples
                && (self.model.read().is_none() || self.config.learning_mode);
            if should_train {
                self.train();
            }
        }

        // Pre-model batches only grow the corpus; pure learning mode
        // never scores.
        let model = match (self.config.learning_mode, self.model.read().clone()) {
            (false, Some(model)) => model,
            _ => return Vec::new(),
        };

        let mut alerts = Vec::new();
        for fv in batch {
            let row = model.scaler.transform_row(&fv.to_numeric());
            if model.forest.predict_outlier(&row) {
                let score = model.forest.score(&row);
                debug!(flow = %fv.flow_key, score, "flow scored as outlier");
                self.stats.anomalies_flagged += 1;
                alerts.push(Alert::anomaly(fv, score));
            }
        }
        alerts
    }

    /// Fit a new `(forest, scaler)` pair over the corpus and swap it in.
    /// The model lock is held only for the swap, not during the fit.
    fn train(&mut self) {
        info!("Training anomaly model on {} samples", self.corpus.len());

        let matrix: Vec<Vec<f64>> = self.corpus.iter().map(|fv| fv.to_numeric()).collect();
        let scaler = StandardScaler::fit(&matrix);
        let scaled = scaler.transform(&matrix);
        let forest = IsolationForest::fit(&scaled, &self.config.forest);

        let model = Arc::new(TrainedModel {
            forest,
            scaler,
            trained_at: Utc::now(),
            sample_count: self.corpus.len(),
        });

        if let Some(base) = &self.config.model_path {
            let paths = ModelPaths::from_base(base);
            if let Err(e) = storage::save(&paths, &model.forest, &model.scaler) {
                warn!("Failed to persist anomaly model: {e}");
            }
        }

        *self.model.write() = Some(model);
        self.stats.fits_completed += 1;
        info!("Anomaly model training complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::flow::FlowKey;
    use std::net::{IpAddr, Ipv4Addr};

    fn make_vector(seed: u64) -> FeatureVector {
        let jitter = (seed % 13) as f64;
        FeatureVector {
            flow_key: FlowKey::new(
                IpAddr::V4(Ipv4Addr::new(10, 0, (seed / 256) as u8, (seed % 256) as u8)),
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
                6,
            ),
            timestamp: Utc::now(),
            packet_count: 10 + seed % 5,
            byte_count: 1_000 + seed % 300,
            duration: 5.0 + jitter * 0.1,
            packets_per_second: 2.0 + jitter * 0.05,
            bytes_per_second: 200.0 + jitter,
            mean_packet_size: 100.0 + jitter,
            std_packet_size: 10.0 + jitter * 0.2,
            min_packet_size: 60.0,
            max_packet_size: 1500.0,
            mean_interval: 0.5 + jitter * 0.01,
            std_interval: 0.05,
        }
    }

    fn small_config() -> AnomalyConfig {
        AnomalyConfig {
            min_train_samples: 50,
            corpus_capacity: 200,
            forest: ForestConfig { num_trees: 20, sample_size: 32, contamination: 0.05 },
            ..AnomalyConfig::default()
        }
    }

    #[test]
    fn test_bootstrap_threshold() {
        let config = AnomalyConfig {
            min_train_samples: 1_000,
            forest: ForestConfig { num_trees: 10, sample_size: 64, contamination: 0.05 },
            ..AnomalyConfig::default()
        };
        let mut engine = AnomalyEngine::new(config);

        // 999 vectors: still untrained
        engine.process_batch((0..999).map(make_vector).collect());
        assert_eq!(engine.state(), ModelState::Untrained);

        // The 1,000th triggers the fit
        engine.process_batch(vec![make_vector(999)]);
        assert_eq!(engine.state(), ModelState::Trained);
    }

    #[test]
    fn test_empty_batch_noop() {
        let mut engine = AnomalyEngine::new(small_config());
        let alerts = engine.process_batch(Vec::new());
        assert!(alerts.is_empty());
        assert_eq!(engine.stats().vectors_seen, 0);
    }

    #[test]
    fn test_pre_model_batches_never_scored() {
        let mut engine = AnomalyEngine::new(small_config());
        // Below the training threshold no alert can come out
        let alerts = engine.process_batch((0..10).map(make_vector).collect());
        assert!(alerts.is_empty());
        assert_eq!(engine.stats().corpus_size, 10);
    }

    #[test]
    fn test_learning_mode_suppresses_scoring() {
        let mut config = small_config();
        config.learning_mode = true;
        let mut engine = AnomalyEngine::new(config);

        engine.process_batch((0..60).map(make_vector).collect());
        assert_eq!(engine.state(), ModelState::Trained);

        // Trained but still learning: outliers are not reported
        let mut wild = make_vector(0);
        wild.bytes_per_second = 1e9;
        wild.packets_per_second = 1e6;
        assert!(engine.process_batch(vec![wild]).is_empty());
    }

    #[test]
    fn test_outlier_vector_alerts() {
        let mut engine = AnomalyEngine::new(small_config());
        engine.process_batch((0..60).map(make_vector).collect());
        assert_eq!(engine.state(), ModelState::Trained);

        let mut wild = make_vector(0);
        wild.bytes_per_second = 1e9;
        wild.packets_per_second = 1e6;
        wild.byte_count = u64::MAX / 2;

        let alerts = engine.process_batch(vec![wild]);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, crate::core::alert::AlertKind::Anomaly);
        assert!(alerts[0].confidence > 0.0);
    }

    #[test]
    fn test_model_swap_keeps_fits_whole() {
        let mut config = small_config();
        config.learning_mode = true;
        let mut engine = AnomalyEngine::new(config);

        engine.process_batch((0..60).map(make_vector).collect());
        let handle = engine.model_handle();
        let first_fit = handle.read().clone().unwrap();
        assert_eq!(first_fit.sample_count, 60);

        // learning mode retrains on the next batch; a reader holding the
        // old Arc keeps the old forest and scaler as one unit
        engine.process_batch((60..80).map(make_vector).collect());
        assert_eq!(first_fit.sample_count, 60);

        let second_fit = handle.read().clone().unwrap();
        assert_eq!(second_fit.sample_count, 80);
        assert_eq!(
            second_fit.scaler.n_features(),
            first_fit.scaler.n_features()
        );
    }

    #[test]
    fn test_corpus_closed_once_full() {
        let mut config = small_config();
        config.corpus_capacity = 80;
        let mut engine = AnomalyEngine::new(config);

        engine.process_batch((0..200).map(make_vector).collect());
        assert_eq!(engine.stats().corpus_size, 80);
    }
}
