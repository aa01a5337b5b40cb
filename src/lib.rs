//! Fraudscope - credit card fraud detection
//!
//! Trains an isolation forest once on a table of known transactions and flags
//! anomalous rows in uploaded tables.
//!
//! # Modules
//!
//! ## Pipeline
//! - [`utils`] - Spreadsheet and CSV loading
//! - [`preprocessing`] - Feature schema and standard scaling
//! - [`anomaly`] - Isolation Forest
//! - [`visualization`] - PCA projection for plotting
//! - [`inference`] - Trained detector and score reports
//!
//! ## Services
//! - [`server`] - Upload page and JSON API
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Pipeline
pub mod utils;
pub mod preprocessing;
pub mod anomaly;
pub mod visualization;
pub mod inference;

// Services
pub mod server;
pub mod cli;

pub use error::{DetectError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{DetectError, Result};

    // Loading and preparation
    pub use crate::utils::{DataLoader, FileFormat};
    pub use crate::preprocessing::{FeatureSchema, StandardScaler};

    // Models
    pub use crate::anomaly::{AnomalyDetector, IsolationForest};
    pub use crate::visualization::{Pca, PcaConfig};

    // Detector
    pub use crate::inference::{DetectorConfig, ScoreReport, TrainedDetector};
}
