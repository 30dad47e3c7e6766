//! HTTP API for the speech service.
//!
//! `GET /health` reports readiness in the body (always 200). `POST /tts` returns
//! a WAV file. CORS-permissive so browser clients on any origin can call it.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use ijwi_core::types::{HealthReport, SynthesisRequest};

use crate::error::ApiError;
use crate::service::SpeechService;

pub const WAV_CONTENT_TYPE: &str = "audio/wav";
pub const WAV_DISPOSITION: &str = "inline; filename=\"tts.wav\"";

/// Build the axum router with a shared [`SpeechService`].
pub fn router(service: Arc<SpeechService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tts", post(tts))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

async fn health(State(service): State<Arc<SpeechService>>) -> Json<HealthReport> {
    Json(service.status().into())
}

async fn tts(
    State(service): State<Arc<SpeechService>>,
    body: Result<Json<SynthesisRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    // Readiness is reported even when the body is unusable.
    service.voice()?;
    let Json(req) = body?;

    let wav = service.synthesize(&req.text).await?;
    Ok((
        [
            (header::CONTENT_TYPE, WAV_CONTENT_TYPE),
            (header::CONTENT_DISPOSITION, WAV_DISPOSITION),
        ],
        wav,
    ))
}
