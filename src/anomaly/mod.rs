//! Anomaly detection
//!
//! Unsupervised detectors that learn a decision threshold from an expected
//! outlier fraction (contamination). Labels follow the `1` inlier / `-1`
//! outlier convention.

pub mod isolation_forest;

pub use isolation_forest::{IsolationForest, IsolationTree};

use crate::error::{DetectError, Result};
use ndarray::{Array1, Array2};

/// Label assigned to inliers
pub const INLIER: i32 = 1;
/// Label assigned to outliers
pub const OUTLIER: i32 = -1;

/// Common interface for anomaly detectors
pub trait AnomalyDetector {
    /// Learn the model and its decision threshold from training data
    fn fit(&mut self, x: &Array2<f64>) -> Result<()>;

    /// Anomaly score per row in `[0, 1]`; higher is more anomalous
    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Score above which a row is labelled an outlier
    fn threshold(&self) -> Option<f64>;

    /// Label already computed scores against the fitted threshold
    fn label_scores(&self, scores: &Array1<f64>) -> Result<Array1<i32>> {
        let threshold = self.threshold().ok_or(DetectError::ModelNotFitted)?;
        Ok(scores.mapv(|s| if s > threshold { OUTLIER } else { INLIER }))
    }

    /// `OUTLIER` or `INLIER` per row
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<i32>> {
        let scores = self.score_samples(x)?;
        self.label_scores(&scores)
    }
}
