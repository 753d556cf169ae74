//! Isolation forest
//!
//! Unsupervised outlier scoring: anomalies are easier to isolate with
//! random axis-aligned splits and therefore sit at shorter path depths.
//! The outlier threshold is taken from the training-score quantile implied
//! by the configured expected-anomaly fraction, so `predict` flags roughly
//! that share of traffic resembling the training corpus.

use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Forest hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    /// Number of trees in the ensemble
    pub num_trees: usize,
    /// Sub-sample size per tree
    pub sample_size: usize,
    /// Expected fraction of anomalies in the training corpus
    pub contamination: f64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            num_trees: 100,
            sample_size: 256,
            contamination: 0.05,
        }
    }
}

/// Fitted isolation forest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    sample_size: usize,
    /// c(sample_size) normalization factor
    avg_path_length: f64,
    /// Score threshold derived from the training-score quantile
    threshold: f64,
}

impl IsolationForest {
    /// Fit a forest over pre-scaled row vectors
    pub fn fit(rows: &[Vec<f64>], config: &ForestConfig) -> Self {
        let mut rng = rand::rng();
        let n_features = rows.first().map(|r| r.len()).unwrap_or(0);
        let sample_size = config.sample_size.min(rows.len()).max(2);

        let mut trees = Vec::with_capacity(config.num_trees);
        let max_depth = (sample_size as f64).log2().ceil() as usize;
        for _ in 0..config.num_trees {
            let sample: Vec<&[f64]> = (0..sample_size)
                .map(|_| rows[rng.random_range(0..rows.len())].as_slice())
                .collect();
            trees.push(IsolationTree::build(&sample, n_features, max_depth, &mut rng));
        }

        let mut forest = Self {
            trees,
            sample_size,
            avg_path_length: average_path_length(sample_size),
            threshold: 0.5,
        };

        // Threshold at the (1 - contamination) quantile so the configured
        // fraction of training-like traffic scores as outlier.
        let mut scores: Vec<f64> = rows.iter().map(|r| forest.score(r)).collect();
        scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let idx = ((1.0 - config.contamination.clamp(0.0, 1.0)) * (scores.len() - 1) as f64)
            .round() as usize;
        forest.threshold = scores[idx.min(scores.len() - 1)];

        forest
    }

    /// Anomaly score in (0, 1): `2^(-E[h(x)] / c(n))`
    pub fn score(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() || self.avg_path_length <= 0.0 {
            return 0.5;
        }

        let total: f64 = self.trees.iter().map(|t| t.path_length(row)).sum();
        let avg_path = total / self.trees.len() as f64;
        2.0_f64.powf(-avg_path / self.avg_path_length)
    }

    /// Whether the row scores above the fitted outlier threshold
    pub fn predict_outlier(&self, row: &[f64]) -> bool {
        self.score(row) > self.threshold
    }

    /// Fitted outlier threshold
    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

/// Expected path length of an unsuccessful BST search, c(n)
fn average_path_length(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * ((n - 1.0).ln() + 0.5772156649) - 2.0 * (n - 1.0) / n
}

/// A single isolation tree
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IsolationTree {
    root: Node,
}

impl IsolationTree {
    fn build<R: Rng>(
        samples: &[&[f64]],
        n_features: usize,
        max_depth: usize,
        rng: &mut R,
    ) -> Self {
        Self {
            root: Node::build(samples, n_features, 0, max_depth, rng),
        }
    }

    fn path_length(&self, row: &[f64]) -> f64 {
        self.root.path_length(row, 0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Split {
        feature: usize,
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

impl Node {
    fn build<R: Rng>(
        samples: &[&[f64]],
        n_features: usize,
        depth: usize,
        max_depth: usize,
        rng: &mut R,
    ) -> Self {
        if depth >= max_depth || samples.len() <= 1 || n_features == 0 {
            return Node::Leaf { size: samples.len() };
        }

        let feature = rng.random_range(0..n_features);
        let mut min_val = f64::MAX;
        let mut max_val = f64::MIN;
        for row in samples {
            let v = row.get(feature).copied().unwrap_or(0.0);
            min_val = min_val.min(v);
            max_val = max_val.max(v);
        }

        if (max_val - min_val).abs() < f64::EPSILON {
            return Node::Leaf { size: samples.len() };
        }

        let value = rng.random_range(min_val..max_val);
        let (left, right): (Vec<&[f64]>, Vec<&[f64]>) = samples
            .iter()
            .copied()
            .partition(|row| row.get(feature).copied().unwrap_or(0.0) < value);

        Node::Split {
            feature,
            value,
            left: Box::new(Node::build(&left, n_features, depth + 1, max_depth, rng)),
            right: Box::new(Node::build(&right, n_features, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, row: &[f64], depth: usize) -> f64 {
        match self {
            Node::Leaf { size } => depth as f64 + average_path_length(*size),
            Node::Split { feature, value, left, right } => {
                let v = row.get(*feature).copied().unwrap_or(0.0);
                let next = if v < *value { left } else { right };
                next.path_length(row, depth + 1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn training_rows() -> Vec<Vec<f64>> {
        // Values spread between 40 and 60 across 4 dimensions
        (0..500)
            .map(|i| {
                let v = 50.0 + ((i % 21) as f64) - 10.0;
                vec![v, v * 0.5, v + 1.0, 10.0 + (i % 7) as f64]
            })
            .collect()
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert!(average_path_length(100) > average_path_length(10));
    }

    #[test]
    fn test_fit_and_score_range() {
        let rows = training_rows();
        let forest = IsolationForest::fit(&rows, &ForestConfig::default());

        for row in rows.iter().take(20) {
            let s = forest.score(row);
            assert!((0.0..=1.0).contains(&s));
        }
    }

    #[test]
    fn test_outlier_scores_above_inlier() {
        let rows = training_rows();
        let forest = IsolationForest::fit(&rows, &ForestConfig::default());

        let inlier = vec![50.0, 25.0, 51.0, 13.0];
        let outlier = vec![5000.0, -900.0, 8000.0, 400.0];

        assert!(forest.score(&outlier) > forest.score(&inlier));
        assert!(forest.predict_outlier(&outlier));
    }

    #[test]
    fn test_threshold_from_contamination() {
        let rows = training_rows();
        let forest = IsolationForest::fit(
            &rows,
            &ForestConfig { contamination: 0.05, ..ForestConfig::default() },
        );

        // Roughly the contamination share of training rows predict as
        // outliers; allow slack for tie-heavy score distributions.
        let flagged = rows.iter().filter(|r| forest.predict_outlier(r)).count();
        assert!(flagged < rows.len() / 4, "flagged {} of {}", flagged, rows.len());
    }
}
