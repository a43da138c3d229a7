use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::errors::AppResult;
use crate::state::AppState;

/// `POST /admin/reload`
///
/// Resets the model to `Unloaded` and runs the load sequence in the
/// background. Answers 202 immediately, or 409 while a load is running.
pub async fn reload_model(State(state): State<Arc<AppState>>) -> AppResult<(StatusCode, Json<Value>)> {
    let previous = state.models.state();
    let handle = state.models.spawn_reload()?;

    tokio::spawn(async move {
        match handle.await {
            Ok(Ok(_)) => tracing::info!("Model reload completed"),
            Ok(Err(e)) => tracing::warn!("Model reload failed: {}", e),
            Err(e) => tracing::error!("Model reload task failed: {}", e),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "reloading",
            "previous_state": previous.as_str()
        })),
    ))
}
