//! Error types, one per layer.
//!
//! Only [`ApiError`] reaches clients. Load and synthesis failures are logged
//! with their full cause chain and surface as a fixed, generic message.

use std::path::PathBuf;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use ijwi_core::tokenizer::TokenizerError;
use ijwi_core::types::ErrorBody;

/// Invalid environment configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Failure to bring the model and tokenizer up at startup.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("download of {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("download of {url} failed with status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("invalid {file}: {source}")]
    Json {
        file: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),

    #[error("failed to create inference session: {0}")]
    Session(String),
}

/// Failure while turning one text into audio.
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("invalid input tensor: {0}")]
    Input(#[from] ndarray::ShapeError),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("unexpected waveform shape {0:?}")]
    WaveformShape(Vec<usize>),

    #[error("model produced an empty waveform")]
    EmptyWaveform,

    #[error("inference worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// HTTP error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Model not loaded yet")]
    NotReady,

    #[error("Text must not be empty")]
    InvalidInput,

    #[error("TTS generation failed")]
    Internal(#[source] SynthesisError),

    #[error("{}", .0.body_text())]
    MalformedRequest(#[from] JsonRejection),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MalformedRequest(rejection) => rejection.status(),
        }
    }
}

impl From<SynthesisError> for ApiError {
    fn from(err: SynthesisError) -> Self {
        Self::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            Self::Internal(cause) => {
                tracing::error!(error = %cause, status = status.as_u16(), "TTS generation failed")
            }
            _ => tracing::debug!(error = %self, status = status.as_u16(), "request rejected"),
        }

        let body = ErrorBody {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
