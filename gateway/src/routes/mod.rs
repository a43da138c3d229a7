pub mod api;

use axum::Router;
use http::{
    Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

/// Build the complete application router with state attached
pub fn create_router(state: Arc<AppState>) -> Router {
    api::create_api_router().with_state(state)
}

/// CORS policy for a comma-separated origin list, or `"*"` for any origin
pub fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    if allowed_origins.trim() == "*" {
        return base.allow_origin(Any).allow_credentials(false);
    }

    let origins: Vec<_> = allowed_origins
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    base.allow_origin(origins).allow_credentials(true)
}
