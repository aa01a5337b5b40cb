//! HTTP request handlers

use std::sync::Arc;
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use tracing::{info, warn};

use crate::inference::ScoreReport;

use super::error::{Result, ServerError};
use super::state::AppState;

/// Multipart field carrying the uploaded table
const UPLOAD_FIELD: &str = "file";

/// Uploaded file name and contents
struct Upload {
    file_name: String,
    data: Bytes,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(ServerError::from)?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ServerError::BadRequest("Uploaded file has no name".to_string()))?;
        let data = field.bytes().await.map_err(ServerError::from)?;

        info!(file_name = %file_name, size = data.len(), "Received upload");
        return Ok(Upload { file_name, data });
    }

    Err(ServerError::BadRequest("No file uploaded".to_string()))
}

/// Parse and score an upload off the async runtime
async fn score_upload(state: &Arc<AppState>, upload: Upload) -> Result<ScoreReport> {
    let detector = Arc::clone(&state.detector);
    let loader = state.loader.clone();

    tokio::task::spawn_blocking(move || {
        let df = loader.load_bytes(&upload.file_name, &upload.data)?;
        detector.score(&df)
    })
    .await
    .map_err(|e| ServerError::Internal(e.to_string()))?
    .map_err(ServerError::from)
}

// ============================================================================
// Page Handlers
// ============================================================================

/// Idle page: upload form and training summary
pub async fn serve_index(State(state): State<Arc<AppState>>) -> Result<Html<String>> {
    let html = state.renderer.idle_page(&state.detector.summary(), None)?;
    Ok(Html(html))
}

/// Score an uploaded file and render the scored page.
///
/// Any failure renders the idle page with an error banner instead.
pub async fn upload_page(State(state): State<Arc<AppState>>, multipart: Multipart) -> Response {
    let outcome = match read_upload(multipart).await {
        Ok(upload) => {
            let file_name = upload.file_name.clone();
            score_upload(&state, upload).await.map(|report| (file_name, report))
        }
        Err(e) => Err(e),
    };

    let summary = state.detector.summary();
    let page = match outcome {
        Ok((file_name, report)) => state
            .renderer
            .scored_page(&summary, &report, &file_name)
            .map(|html| (StatusCode::OK, html)),
        Err(e) => {
            let message = e.public_message();
            warn!(kind = e.kind(), status = %e.status(), message = %message, "Upload rejected");
            state
                .renderer
                .idle_page(&summary, Some(&message))
                .map(|html| (e.status(), html))
        }
    };

    match page {
        Ok((status, html)) => (status, Html(html)).into_response(),
        Err(e) => e.into_response(),
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// Score an uploaded file and return the report as JSON
pub async fn score_api(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<ScoreReport>> {
    let upload = read_upload(multipart).await?;
    let report = score_upload(&state, upload).await?;
    Ok(Json(report))
}

/// Training schema and model summary
pub async fn get_schema(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let summary = state.detector.summary();
    Json(serde_json::json!({
        "schema_version": summary.schema.version(),
        "fingerprint": summary.schema.fingerprint(),
        "features": summary.schema.columns(),
        "dropped": summary.schema.dropped(),
        "label": summary.schema.label(),
        "required_columns": summary.config.required_columns,
        "scaling": summary.scaling,
        "training_rows": summary.training_rows,
        "threshold": summary.threshold,
        "contamination": summary.config.contamination,
        "seed": summary.config.seed,
        "n_estimators": summary.config.n_estimators,
        "trained_at": summary.trained_at.to_rfc3339(),
    }))
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let uptime = chrono::Utc::now().signed_duration_since(state.started_at);
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime.num_seconds(),
        "training_data": state.config.training_data.display().to_string(),
    }))
}
