//! Isolation Forest anomaly detection

use crate::anomaly::AnomalyDetector;
use crate::error::{DetectError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand::seq::index;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Euler–Mascheroni constant
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Isolation Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IsolationTree {
    /// Internal node with split
    Internal {
        /// Feature index for split
        feature: usize,
        /// Split threshold
        threshold: f64,
        /// Left subtree (values < threshold)
        left: Box<IsolationTree>,
        /// Right subtree (values >= threshold)
        right: Box<IsolationTree>,
    },
    /// External (leaf) node
    External {
        /// Number of samples in this node
        size: usize,
    },
}

impl IsolationTree {
    /// Build an isolation tree over the rows of `x` listed in `indices`
    pub fn build(
        x: &Array2<f64>,
        indices: &[usize],
        height: usize,
        max_height: usize,
        rng: &mut impl Rng,
    ) -> Self {
        let n_samples = indices.len();

        if height >= max_height || n_samples <= 1 {
            return IsolationTree::External { size: n_samples };
        }

        let feature = rng.gen_range(0..x.ncols());

        let (min_val, max_val) = indices.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY),
            |(lo, hi), &i| (lo.min(x[[i, feature]]), hi.max(x[[i, feature]])),
        );

        // Constant on this feature
        if (max_val - min_val).abs() < 1e-10 {
            return IsolationTree::External { size: n_samples };
        }

        let threshold = rng.gen_range(min_val..max_val);

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature]] < threshold);

        if left_indices.is_empty() || right_indices.is_empty() {
            return IsolationTree::External { size: n_samples };
        }

        let left = Box::new(Self::build(x, &left_indices, height + 1, max_height, rng));
        let right = Box::new(Self::build(x, &right_indices, height + 1, max_height, rng));

        IsolationTree::Internal {
            feature,
            threshold,
            left,
            right,
        }
    }

    /// Path length for a sample, with the unresolved-leaf correction `c(size)`
    pub fn path_length(&self, sample: &ArrayView1<f64>, current_height: usize) -> f64 {
        match self {
            IsolationTree::External { size } => current_height as f64 + average_path_length(*size),
            IsolationTree::Internal {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] < *threshold {
                    left.path_length(sample, current_height + 1)
                } else {
                    right.path_length(sample, current_height + 1)
                }
            }
        }
    }

    /// Depth of the deepest leaf
    pub fn depth(&self) -> usize {
        match self {
            IsolationTree::External { .. } => 0,
            IsolationTree::Internal { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Average path length of an unsuccessful BST search over `n` points:
/// `c(n) = 2 H(n-1) - 2(n-1)/n`, with `H(i) ≈ ln(i) + γ`
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n_f = n as f64;
            2.0 * ((n_f - 1.0).ln() + EULER_GAMMA) - 2.0 * (n_f - 1.0) / n_f
        }
    }
}

/// Linear-interpolated quantile of unsorted values, `q` in `[0, 1]`
fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Isolation Forest anomaly detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    /// Number of trees
    n_estimators: usize,
    /// Maximum samples per tree
    max_samples: usize,
    /// Contamination ratio (expected proportion of outliers)
    contamination: f64,
    /// Random seed
    seed: Option<u64>,
    /// Fitted trees
    trees: Option<Vec<IsolationTree>>,
    /// Decision threshold
    threshold: Option<f64>,
    /// Number of samples drawn per tree at fit time
    n_samples: Option<usize>,
    /// Width of the training matrix
    n_features: Option<usize>,
}

impl IsolationForest {
    /// Create new Isolation Forest
    pub fn new() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.1,
            seed: None,
            trees: None,
            threshold: None,
            n_samples: None,
            n_features: None,
        }
    }

    /// Set number of trees
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n.max(1);
        self
    }

    /// Set maximum samples per tree
    pub fn with_max_samples(mut self, n: usize) -> Self {
        self.max_samples = n.max(1);
        self
    }

    /// Set contamination ratio; validated in `fit`
    pub fn with_contamination(mut self, c: f64) -> Self {
        self.contamination = c;
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        match self.n_features {
            Some(d) if d != x.ncols() => Err(DetectError::ShapeError {
                expected: format!("{} features", d),
                actual: format!("{} features", x.ncols()),
            }),
            _ => Ok(()),
        }
    }

    /// Compute anomaly score for samples.
    /// Score is between 0 and 1, higher means more anomalous
    fn compute_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let trees = self.trees.as_ref().ok_or(DetectError::ModelNotFitted)?;
        self.check_width(x)?;

        let c_n = average_path_length(self.n_samples.unwrap_or(self.max_samples)).max(1e-12);

        let scores: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let sample = x.row(i);
                let avg_path_length: f64 = trees
                    .iter()
                    .map(|tree| tree.path_length(&sample, 0))
                    .sum::<f64>()
                    / trees.len() as f64;

                // s(x, n) = 2^(-E[h(x)] / c(n))
                2.0_f64.powf(-avg_path_length / c_n)
            })
            .collect();

        Ok(Array1::from_vec(scores))
    }
}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalyDetector for IsolationForest {
    fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        let n_samples = x.nrows();
        if n_samples == 0 || x.ncols() == 0 {
            return Err(DetectError::ValidationError(
                "cannot fit isolation forest on an empty matrix".to_string(),
            ));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(DetectError::InvalidParameter {
                name: "contamination".to_string(),
                value: self.contamination.to_string(),
                reason: "must be in (0, 0.5]".to_string(),
            });
        }

        let samples_per_tree = self.max_samples.min(n_samples);
        let max_height = (samples_per_tree as f64).log2().ceil() as usize;

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        // Per-tree seeds are drawn up front so parallel growth stays reproducible
        let tree_seeds: Vec<u64> = (0..self.n_estimators).map(|_| rng.gen()).collect();

        let trees: Vec<IsolationTree> = tree_seeds
            .par_iter()
            .map(|&seed| {
                let mut tree_rng = StdRng::seed_from_u64(seed);
                let indices = index::sample(&mut tree_rng, n_samples, samples_per_tree).into_vec();
                IsolationTree::build(x, &indices, 0, max_height, &mut tree_rng)
            })
            .collect();

        self.trees = Some(trees);
        self.n_samples = Some(samples_per_tree);
        self.n_features = Some(x.ncols());

        let scores = self.compute_scores(x)?.to_vec();
        let threshold = quantile(&scores, 1.0 - self.contamination);
        self.threshold = Some(threshold);

        debug!(
            n_estimators = self.n_estimators,
            samples_per_tree,
            max_height,
            threshold,
            "Fitted isolation forest"
        );

        Ok(())
    }

    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.compute_scores(x)
    }

    fn threshold(&self) -> Option<f64> {
        self.threshold
    }
}
