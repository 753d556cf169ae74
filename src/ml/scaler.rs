//! Per-feature standard scaling
//!
//! Fitted over the training corpus and persisted alongside the model it
//! trained; a scaler is never mixed with a forest from a different fit.

use serde::{Deserialize, Serialize};

/// Column-wise (x - mean) / std scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Vec<f64>,
    stds: Vec<f64>,
}

impl StandardScaler {
    /// Fit scaling parameters over a matrix of row vectors.
    /// Uses population statistics. Zero-variance columns scale by 1.
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let n_cols = rows.first().map(|r| r.len()).unwrap_or(0);
        let n = rows.len().max(1) as f64;

        let mut means = vec![0.0; n_cols];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v;
            }
        }
        for m in &mut means {
            *m /= n;
        }

        let mut stds = vec![0.0; n_cols];
        for row in rows {
            for ((s, v), m) in stds.iter_mut().zip(row).zip(&means) {
                let d = v - m;
                *s += d * d;
            }
        }
        for s in &mut stds {
            *s = (*s / n).sqrt();
            if *s < f64::EPSILON {
                *s = 1.0;
            }
        }

        Self { means, stds }
    }

    /// Scale one row in place semantics (returns a new row)
    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }

    /// Scale a whole matrix
    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }

    /// Number of feature columns this scaler was fitted on
    pub fn n_features(&self) -> usize {
        self.means.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_transform() {
        let rows = vec![vec![1.0, 10.0], vec![3.0, 10.0]];
        let scaler = StandardScaler::fit(&rows);

        let scaled = scaler.transform(&rows);
        // Column 0: mean 2, std 1 -> [-1, 1]
        assert!((scaled[0][0] + 1.0).abs() < 1e-9);
        assert!((scaled[1][0] - 1.0).abs() < 1e-9);
        // Column 1 is constant: zero-variance guard keeps it finite
        assert_eq!(scaled[0][1], 0.0);
        assert_eq!(scaled[1][1], 0.0);
    }

    #[test]
    fn test_transform_centers_mean() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let scaler = StandardScaler::fit(&rows);
        let scaled = scaler.transform(&rows);

        let sum: f64 = scaled.iter().map(|r| r[0]).sum();
        assert!(sum.abs() < 1e-9);
    }
}
