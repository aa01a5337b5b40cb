//! Application state management

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::inference::TrainedDetector;
use crate::utils::DataLoader;

use super::error::Result;
use super::render::PageRenderer;
use super::ServerConfig;

/// Application state shared across handlers.
///
/// The detector is trained before the listener binds and is only ever read.
pub struct AppState {
    pub config: ServerConfig,
    pub detector: Arc<TrainedDetector>,
    pub loader: DataLoader,
    pub renderer: PageRenderer,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Fails only if the page templates do not compile
    pub fn new(config: ServerConfig, detector: TrainedDetector) -> Result<Self> {
        Ok(Self {
            config,
            detector: Arc::new(detector),
            loader: DataLoader::new(),
            renderer: PageRenderer::new()?,
            started_at: Utc::now(),
        })
    }
}
