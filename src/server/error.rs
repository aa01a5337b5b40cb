//! Error types for the server

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::DetectError;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Malformed or oversized multipart body
    #[error("Upload failed: {message}")]
    Upload { status: StatusCode, message: String },

    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<MultipartError> for ServerError {
    fn from(e: MultipartError) -> Self {
        ServerError::Upload {
            status: e.status(),
            message: e.body_text(),
        }
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Upload { status, .. } => *status,
            ServerError::Detect(e) if e.is_validation() => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::Detect(e) if e.is_read() => StatusCode::BAD_REQUEST,
            ServerError::Detect(_) | ServerError::Template(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short machine-readable class of the error
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::BadRequest(_) => "bad_request",
            ServerError::Upload { status, .. } if *status == StatusCode::PAYLOAD_TOO_LARGE => {
                "payload_too_large"
            }
            ServerError::Upload { .. } => "bad_request",
            ServerError::Detect(DetectError::MissingColumns(_)) => "missing_columns",
            ServerError::Detect(DetectError::SchemaMismatch { .. }) => "schema_mismatch",
            ServerError::Detect(e) if e.is_validation() => "validation",
            ServerError::Detect(DetectError::UnsupportedFormat(_)) => "unsupported_format",
            ServerError::Detect(e) if e.is_read() => "read",
            ServerError::Detect(_) | ServerError::Template(_) | ServerError::Internal(_) => {
                "internal"
            }
        }
    }

    /// Message safe to show to the client. Internal details are only logged.
    pub fn public_message(&self) -> String {
        match self {
            ServerError::BadRequest(msg) => msg.clone(),
            ServerError::Upload { message, .. } => message.clone(),
            ServerError::Detect(e) if e.is_validation() || e.is_read() => e.to_string(),
            ServerError::Detect(e) => {
                tracing::error!(detail = %e, "Scoring failed");
                "An internal error occurred while scoring the file".to_string()
            }
            ServerError::Template(e) => {
                tracing::error!(detail = %e, "Page rendering failed");
                "An internal error occurred".to_string()
            }
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                "An internal error occurred".to_string()
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": true,
            "kind": self.kind(),
            "message": self.public_message(),
        }));

        (self.status(), body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
