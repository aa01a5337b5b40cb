//! Error types for the fraudscope pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, DetectError>;

/// Main error type for loading, preparing, and scoring transaction tables
#[derive(Error, Debug)]
pub enum DetectError {
    #[error("The uploaded file does not contain the required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Schema mismatch: missing columns [{}], non-numeric columns [{}]", missing.join(", "), non_numeric.join(", "))]
    SchemaMismatch {
        missing: Vec<String>,
        non_numeric: Vec<String>,
    },

    #[error("Read error: {0}")]
    ReadError(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl DetectError {
    /// Whether the error was caused by the uploaded table rather than the service
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DetectError::MissingColumns(_)
                | DetectError::SchemaMismatch { .. }
                | DetectError::ValidationError(_)
        )
    }

    /// Whether the error came from reading or parsing an input file
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            DetectError::ReadError(_) | DetectError::UnsupportedFormat(_) | DetectError::DataError(_)
        )
    }
}

impl From<polars::error::PolarsError> for DetectError {
    fn from(err: polars::error::PolarsError) -> Self {
        DetectError::DataError(err.to_string())
    }
}

impl From<calamine::Error> for DetectError {
    fn from(err: calamine::Error) -> Self {
        DetectError::ReadError(err.to_string())
    }
}

impl From<serde_json::Error> for DetectError {
    fn from(err: serde_json::Error) -> Self {
        DetectError::ConfigError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for DetectError {
    fn from(err: ndarray::ShapeError) -> Self {
        DetectError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
