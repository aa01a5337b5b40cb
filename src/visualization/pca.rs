//! Principal Component Analysis
//!
//! Linear dimensionality reduction for 2D visualization.
//! Computes the top-k eigenvectors of the covariance matrix
//! using power iteration with deflation.

use crate::error::{DetectError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// PCA configuration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcaConfig {
    /// Number of components to extract (at most 2 are embedded)
    pub n_components: usize,
    /// Random seed for power iteration initialization
    pub random_state: u64,
    /// Power iteration cap per component
    pub max_iter: usize,
    /// Convergence tolerance on the eigenvector update
    pub tol: f64,
}

impl Default for PcaConfig {
    fn default() -> Self {
        Self {
            n_components: 2,
            random_state: 42,
            max_iter: 300,
            tol: 1e-10,
        }
    }
}

/// PCA result including the embedding and explained variance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PcaResult {
    /// Projected data: n_samples x 2
    pub embedding: Vec<[f64; 2]>,
    /// Explained variance ratio for each component (sums to <= 1.0)
    pub explained_variance_ratio: Vec<f64>,
    /// Eigenvalues (raw variance per component)
    pub eigenvalues: Vec<f64>,
}

/// PCA dimensionality reduction
#[derive(Debug, Clone, Default)]
pub struct Pca {
    config: PcaConfig,
}

impl Pca {
    /// Create a new PCA instance
    pub fn new(config: PcaConfig) -> Self {
        Self { config }
    }

    /// Fit on `data` and project it. Nothing is retained between calls.
    pub fn fit_transform(&self, data: &Array2<f64>) -> Result<PcaResult> {
        let (n, d) = data.dim();
        if n < 2 {
            return Err(DetectError::ComputationError(
                "PCA requires at least 2 samples".to_string(),
            ));
        }
        if d < 1 {
            return Err(DetectError::ComputationError(
                "PCA requires at least 1 feature".to_string(),
            ));
        }

        let n_components = self.config.n_components.min(d).min(n).max(1);

        let centered = center(data)?;
        let cov = centered.t().dot(&centered) / (n as f64 - 1.0);
        let (eigenvalues, eigenvectors) = self.power_iteration(&cov, n_components);

        let full_variance: f64 = cov.diag().sum().max(1e-12);
        let explained_variance_ratio: Vec<f64> = eigenvalues
            .iter()
            .map(|&ev| (ev / full_variance).max(0.0))
            .collect();

        let embedding: Vec<[f64; 2]> = (0..n)
            .into_par_iter()
            .map(|i| {
                let sample = centered.row(i);
                let mut point = [0.0f64; 2];
                for (c, component) in eigenvectors.iter().take(2).enumerate() {
                    point[c] = sample.dot(component);
                }
                point
            })
            .collect();

        Ok(PcaResult {
            embedding,
            explained_variance_ratio,
            eigenvalues,
        })
    }

    /// Power iteration with deflation to extract top-k eigenvectors.
    fn power_iteration(&self, cov: &Array2<f64>, k: usize) -> (Vec<f64>, Vec<Array1<f64>>) {
        let d = cov.nrows();
        let mut eigenvalues = Vec::with_capacity(k);
        let mut eigenvectors = Vec::with_capacity(k);

        // Work on a copy so we can deflate
        let mut work = cov.to_owned();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.random_state);

        for _component in 0..k {
            let mut v: Array1<f64> = (0..d).map(|_| rng.gen_range(-1.0..1.0)).collect();
            orthogonalize(&mut v, &eigenvectors);
            let norm = v.dot(&v).sqrt().max(1e-12);
            v /= norm;

            let mut eigenvalue = 0.0f64;

            for _iter in 0..self.config.max_iter {
                let mut w = work.dot(&v);
                let new_eigenvalue = v.dot(&w);

                // Keep later components orthogonal when the residual is near zero
                orthogonalize(&mut w, &eigenvectors);
                let w_norm = w.dot(&w).sqrt().max(1e-12);
                let new_v = w / w_norm;

                let diff = (&v - &new_v).mapv(|x| x * x).sum().sqrt();

                v = new_v;
                eigenvalue = new_eigenvalue;

                if diff < self.config.tol {
                    break;
                }
            }

            orient(&mut v);
            eigenvalue = eigenvalue.max(0.0);

            // Deflate: A = A - eigenvalue * v * v^T
            let col = v.view().insert_axis(Axis(1));
            let outer = col.dot(&col.t());
            work.scaled_add(-eigenvalue, &outer);

            eigenvalues.push(eigenvalue);
            eigenvectors.push(v);
        }

        (eigenvalues, eigenvectors)
    }
}

/// Subtract the per-feature mean
fn center(data: &Array2<f64>) -> Result<Array2<f64>> {
    let means = data
        .mean_axis(Axis(0))
        .ok_or_else(|| DetectError::ComputationError("empty input".to_string()))?;
    Ok(data - &means)
}

fn orthogonalize(v: &mut Array1<f64>, basis: &[Array1<f64>]) {
    for e in basis {
        let proj = v.dot(e);
        v.scaled_add(-proj, e);
    }
}

/// Flip the sign so the largest-magnitude loading is positive
fn orient(v: &mut Array1<f64>) {
    let pivot = v
        .iter()
        .copied()
        .fold(0.0f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
    if pivot < 0.0 {
        v.mapv_inplace(|x| -x);
    }
}
