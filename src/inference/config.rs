//! Detector configuration

use crate::error::{DetectError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for training and applying the detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Expected fraction of outliers in the training data
    pub contamination: f64,

    /// Seed for tree sampling and split selection
    pub seed: u64,

    /// Number of isolation trees
    pub n_estimators: usize,

    /// Rows drawn (without replacement) to grow each tree
    pub max_samples: usize,

    /// Ground-truth column excluded from the features
    pub label_column: String,

    /// Columns an uploaded table must carry before it is scored
    pub required_columns: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            contamination: 0.0017,
            seed: 42,
            n_estimators: 100,
            max_samples: 256,
            label_column: "Class".to_string(),
            required_columns: vec!["Amount".to_string(), "Time".to_string()],
        }
    }
}

impl DetectorConfig {
    /// Create a configuration with the default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file; absent fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            DetectError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Builder method to set the contamination rate
    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    /// Builder method to set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder method to set the number of trees
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    /// Builder method to set the per-tree sample size
    pub fn with_max_samples(mut self, n: usize) -> Self {
        self.max_samples = n;
        self
    }

    /// Builder method to set the label column
    pub fn with_label_column(mut self, name: impl Into<String>) -> Self {
        self.label_column = name.into();
        self
    }

    /// Builder method to set the required upload columns
    pub fn with_required_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(DetectError::InvalidParameter {
                name: "contamination".to_string(),
                value: self.contamination.to_string(),
                reason: "must be in (0, 0.5]".to_string(),
            });
        }
        if self.n_estimators == 0 {
            return Err(DetectError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_samples < 2 {
            return Err(DetectError::InvalidParameter {
                name: "max_samples".to_string(),
                value: self.max_samples.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }
        if self.label_column.trim().is_empty() {
            return Err(DetectError::ConfigError(
                "label_column must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
