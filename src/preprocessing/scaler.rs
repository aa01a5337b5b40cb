//! Standard scaling of feature matrices

use crate::error::{DetectError, Result};
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Relative precision bound below which a column's spread is rounding noise
const DEGENERATE_REL_STD: f64 = 10.0 * f64::EPSILON;

/// Parameters for a fitted column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    /// Column mean
    pub center: f64,
    /// Column standard deviation, 1.0 for constant columns
    pub scale: f64,
}

/// A column is constant when every value is identical, or when its spread is
/// within floating-point rounding of its mean
fn is_degenerate(col: &ArrayView1<f64>, mean: f64, std: f64) -> bool {
    let (lo, hi) = col
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    lo == hi || std <= DEGENERATE_REL_STD * mean.abs().max(1.0)
}

/// Z-score scaler: `(x - mean) / std` per column.
///
/// Uses the population standard deviation. A constant column keeps a scale of
/// 1.0, so transforming it only removes the mean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    params: Vec<ScalerParams>,
}

impl StandardScaler {
    /// Fit the scaler to a feature matrix whose columns are named by `columns`
    pub fn fit(features: &Array2<f64>, columns: &[String]) -> Result<Self> {
        if features.ncols() != columns.len() {
            return Err(DetectError::ShapeError {
                expected: format!("{} columns", columns.len()),
                actual: format!("{} columns", features.ncols()),
            });
        }
        if features.nrows() == 0 {
            return Err(DetectError::ValidationError(
                "cannot fit scaler on an empty matrix".to_string(),
            ));
        }

        let means = features
            .mean_axis(Axis(0))
            .ok_or_else(|| DetectError::ValidationError("empty matrix".to_string()))?;
        let stds = features.std_axis(Axis(0), 0.0);

        let params = features
            .axis_iter(Axis(1))
            .zip(means.iter().zip(stds.iter()))
            .map(|(col, (&mean, &std))| ScalerParams {
                center: mean,
                scale: if is_degenerate(&col, mean, std) { 1.0 } else { std },
            })
            .collect();

        Ok(Self {
            columns: columns.to_vec(),
            params,
        })
    }

    /// Apply the fitted parameters to a matrix with the same column layout
    pub fn transform(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        if features.ncols() != self.params.len() {
            return Err(DetectError::ShapeError {
                expected: format!("{} columns", self.params.len()),
                actual: format!("{} columns", features.ncols()),
            });
        }

        let mut scaled = features.clone();
        for (mut col, params) in scaled.axis_iter_mut(Axis(1)).zip(&self.params) {
            col.mapv_inplace(|v| (v - params.center) / params.scale);
        }
        Ok(scaled)
    }

    /// Fit and transform in one step
    pub fn fit_transform(features: &Array2<f64>, columns: &[String]) -> Result<(Self, Array2<f64>)> {
        let scaler = Self::fit(features, columns)?;
        let scaled = scaler.transform(features)?;
        Ok((scaler, scaled))
    }

    /// Fitted parameters for a named column
    pub fn params(&self, column: &str) -> Option<ScalerParams> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| self.params[idx])
    }

    /// Iterate over `(column, params)` pairs in matrix order
    pub fn iter(&self) -> impl Iterator<Item = (&str, ScalerParams)> + '_ {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.params.iter().copied())
    }
}
