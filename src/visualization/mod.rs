//! Visualization module: dimensionality reduction for plotting.

pub mod pca;
pub use pca::{Pca, PcaConfig, PcaResult};
