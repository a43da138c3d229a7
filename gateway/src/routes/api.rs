use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, api, speech};
use crate::state::AppState;
use std::sync::Arc;

/// Create the API router
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::root))
        .route("/health", get(api::health_check))
        // OpenAI-compatible endpoints
        .route("/v1/models", get(api::list_models))
        .route("/v1/audio/speech", post(speech::create_speech))
        // Model management
        .route("/admin/reload", post(admin::reload_model))
        .layer(TraceLayer::new_for_http())
}
