//! Data preprocessing module
//!
//! Turns a loaded transaction table into a scaled numeric feature matrix:
//! - Feature schema inference (label and non-numeric columns dropped)
//! - Required-column validation for uploads
//! - Standard scaling with a fixed policy for constant columns

mod scaler;
pub mod schema;

pub use scaler::{ScalerParams, StandardScaler};
pub use schema::{
    ensure_required_columns, is_numeric_dtype, prepare_training, FeatureSchema,
    PreparedFeatures, SCHEMA_VERSION,
};
