//! Detector training and scoring
//!
//! Provides:
//! - `DetectorConfig` with validation and JSON loading
//! - `TrainedDetector`, fitted once and shared read-only
//! - `ScoreReport` describing one scored upload

mod config;
mod engine;

pub use config::DetectorConfig;
pub use engine::{
    ColumnScaling, DetectorSummary, FlaggedRow, ProjectedPoint, ScoreReport, TrainedDetector,
};
