//! OpenAI-compatible speech synthesis endpoint

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::extract::ApiJson;
use crate::core::model::MISSING_ENGINE_DETAIL;
use crate::core::speech::SpeechRequest;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// `POST /v1/audio/speech`
///
/// Checks run in a fixed order: speech engine configured (500), model ready
/// (503), then synthesis. The body is always WAV regardless of the requested
/// `response_format`.
pub async fn create_speech(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<SpeechRequest>,
) -> AppResult<Response> {
    if !state.models.capabilities().generation_available() {
        return Err(AppError::DependencyMissing(MISSING_ENGINE_DETAIL.to_string()));
    }

    let Some(session) = state.models.session() else {
        return Err(AppError::ModelNotReady);
    };

    let request_id = Uuid::new_v4();
    let cfg_scale = request.cfg_scale(state.config.clamp_speed);

    match request.output_format() {
        Some(format) if format.is_native() => {}
        Some(format) => debug!(
            %request_id,
            requested = %format,
            "Requested format is not produced natively, returning WAV"
        ),
        None => debug!(
            %request_id,
            requested = %request.response_format,
            "Unrecognized response format, returning WAV"
        ),
    }

    info!(
        %request_id,
        model = %request.model,
        voice = %request.voice,
        chars = request.input.chars().count(),
        cfg_scale,
        "Generating speech"
    );

    let speech = session.synthesize(&request.input, cfg_scale).await?;

    Ok((
        [
            (header::CONTENT_TYPE, speech.media_type()),
            (header::CONTENT_DISPOSITION, "attachment; filename=speech.wav"),
        ],
        speech.audio,
    )
        .into_response())
}
