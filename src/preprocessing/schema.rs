//! Feature schema and feature preparation
//!
//! The schema is learned once from the training table and then applied
//! verbatim to every uploaded table. Scoring never recomputes the column set.

use crate::error::{DetectError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// Current layout version of [`FeatureSchema`]
pub const SCHEMA_VERSION: u32 = 1;

/// Whether a column type counts as a numeric feature (any float or integer width)
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    dtype.is_primitive_numeric()
}

/// Typed, versioned set of numeric feature columns learned from training data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    version: u32,
    /// Numeric feature columns, in matrix order
    columns: Vec<String>,
    /// Non-numeric columns seen in the training table
    dropped: Vec<String>,
    /// Label column that was present in the training table, if any
    label: Option<String>,
    fingerprint: String,
}

impl FeatureSchema {
    /// Infer the schema from a training table.
    ///
    /// The label column is excluded; every column that is not a float or
    /// integer type is recorded as dropped.
    pub fn infer(df: &DataFrame, label_column: &str) -> Result<Self> {
        let mut columns = Vec::new();
        let mut dropped = Vec::new();
        let mut label = None;

        for col in df.get_columns() {
            let name = col.name().to_string();
            if name == label_column {
                label = Some(name);
            } else if is_numeric_dtype(col.dtype()) {
                columns.push(name);
            } else {
                dropped.push(name);
            }
        }

        if columns.is_empty() {
            return Err(DetectError::ValidationError(
                "training table has no numeric feature columns".to_string(),
            ));
        }

        let fingerprint = fingerprint(&columns);
        debug!(
            n_features = columns.len(),
            n_dropped = dropped.len(),
            has_label = label.is_some(),
            %fingerprint,
            "Inferred feature schema"
        );

        Ok(Self {
            version: SCHEMA_VERSION,
            columns,
            dropped,
            label,
            fingerprint,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Short SHA-256 prefix identifying the ordered column list
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// Verify a table carries every schema column with a numeric type
    pub fn check(&self, df: &DataFrame) -> Result<()> {
        let mut missing = Vec::new();
        let mut non_numeric = Vec::new();

        for name in &self.columns {
            match df.column(name) {
                Ok(col) if is_numeric_dtype(col.dtype()) => {}
                Ok(_) => non_numeric.push(name.clone()),
                Err(_) => missing.push(name.clone()),
            }
        }

        if missing.is_empty() && non_numeric.is_empty() {
            Ok(())
        } else {
            Err(DetectError::SchemaMismatch {
                missing,
                non_numeric,
            })
        }
    }

    /// Select the schema columns (in schema order) as a dense feature matrix.
    ///
    /// Any other column in the table is ignored.
    pub fn extract(&self, df: &DataFrame) -> Result<Array2<f64>> {
        self.check(df)?;

        let n_rows = df.height();
        if n_rows == 0 {
            return Err(DetectError::ValidationError("table has no rows".to_string()));
        }

        let columns = self
            .columns
            .iter()
            .map(|name| numeric_values(df, name))
            .collect::<Result<Vec<_>>>()?;

        Ok(Array2::from_shape_fn((n_rows, columns.len()), |(i, j)| {
            columns[j][i]
        }))
    }
}

/// Training features: the learned schema plus the matrix it selected
#[derive(Debug, Clone)]
pub struct PreparedFeatures {
    pub schema: FeatureSchema,
    pub matrix: Array2<f64>,
}

/// Prepare the training table: drop the label and non-numeric columns
pub fn prepare_training(df: &DataFrame, label_column: &str) -> Result<PreparedFeatures> {
    let schema = FeatureSchema::infer(df, label_column)?;
    let matrix = schema.extract(df)?;

    info!(
        rows = matrix.nrows(),
        features = matrix.ncols(),
        dropped = ?schema.dropped(),
        "Prepared training features"
    );

    Ok(PreparedFeatures { schema, matrix })
}

/// Check an uploaded table for columns the page requires
pub fn ensure_required_columns(df: &DataFrame, required: &[String]) -> Result<()> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| df.column(name.as_str()).is_err())
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DetectError::MissingColumns(missing))
    }
}

fn numeric_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = df
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    let ca = series.f64()?;

    ca.into_iter()
        .map(|value| match value {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(DetectError::ValidationError(format!(
                "column '{}' contains missing, NaN or infinite values",
                name
            ))),
        })
        .collect()
}

fn fingerprint(columns: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(SCHEMA_VERSION.to_le_bytes());
    for name in columns {
        hasher.update(name.as_bytes());
        hasher.update([0x1fu8]);
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}
