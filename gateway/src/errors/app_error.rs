use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::core::model::{GenerationError, LoadError};

/// Errors returned by HTTP handlers
///
/// Every variant renders as `{"detail": "<message>"}` with the matching
/// status code, the error shape OpenAI-compatible clients expect.
#[derive(Debug, Error)]
pub enum AppError {
    // ─────────────────────────────────────────────────────────────────────
    // Request errors
    // ─────────────────────────────────────────────────────────────────────
    /// The request body could not be parsed or failed validation
    #[error("{0}")]
    InvalidRequest(String),

    // ─────────────────────────────────────────────────────────────────────
    // Model availability
    // ─────────────────────────────────────────────────────────────────────
    /// No speech engine was configured at startup
    #[error("{0}")]
    DependencyMissing(String),

    /// The model is not in the `Ready` state
    #[error("Model not loaded. Please ensure a GGUF model is available.")]
    ModelNotReady,

    /// A load sequence is already running
    #[error("{0}")]
    Conflict(String),

    // ─────────────────────────────────────────────────────────────────────
    // Generation
    // ─────────────────────────────────────────────────────────────────────
    #[error("Error generating speech: {0}")]
    Generation(#[from] GenerationError),

    #[error("{0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::DependencyMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ModelNotReady => StatusCode::SERVICE_UNAVAILABLE,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Generation(GenerationError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Generation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LoadError> for AppError {
    fn from(error: LoadError) -> Self {
        match error {
            LoadError::InProgress => Self::Conflict(error.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "{}", detail);
        } else {
            tracing::debug!(status = status.as_u16(), "{}", detail);
        }

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
