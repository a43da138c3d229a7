use axum::{extract::State, response::Json};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::core::model::LoadState;
use crate::state::AppState;

/// Fixed creation timestamp reported for the served model
pub const MODEL_CREATED: u64 = 1_677_649_963;

/// Owner reported for the served model
pub const MODEL_OWNER: &str = "gguf-connector";

/// Health check response
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests
    pub status: &'static str,
    pub model_loaded: bool,
    /// Device family the model is (or will be) loaded on
    pub device: &'static str,
    /// Lifecycle state of the model
    pub state: &'static str,
    /// Reason of the last failed load attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Model entry in the OpenAI model list
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: &'static str,
    pub created: u64,
    pub owned_by: &'static str,
}

/// OpenAI model list
#[derive(Debug, Clone, Serialize)]
pub struct ModelList {
    pub object: &'static str,
    pub data: Vec<ModelInfo>,
}

/// Service description
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "GGUF TTS API Server",
        "endpoints": {
            "/v1/audio/speech": "POST - Generate speech from text",
            "/v1/models": "GET - List available models",
            "/health": "GET - Health check",
            "/admin/reload": "POST - Reload the model"
        }
    }))
}

/// Health check endpoint
///
/// Reads the current lifecycle snapshot without waiting on a load in
/// progress, so it answers immediately in every state.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let snapshot = state.models.snapshot();
    let device = snapshot
        .session()
        .map(|session| session.device())
        .unwrap_or(state.models.config().device);

    let error = match snapshot.state() {
        LoadState::Ready => None,
        _ => snapshot.last_error().map(str::to_string),
    };

    Json(HealthResponse {
        status: "healthy",
        model_loaded: snapshot.is_ready(),
        device: device.kind(),
        state: snapshot.state().as_str(),
        error,
    })
}

/// List available models
///
/// Always lists the single served model, whether or not it is loaded. The id
/// follows the located artifact once discovery has run.
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelList> {
    let id = state
        .models
        .snapshot()
        .artifact()
        .map(|artifact| format!("vibevoice-{}", artifact.stem()))
        .unwrap_or_else(|| state.config.advertised_model_id());

    Json(ModelList {
        object: "list",
        data: vec![ModelInfo {
            id,
            object: "model",
            created: MODEL_CREATED,
            owned_by: MODEL_OWNER,
        }],
    })
}
