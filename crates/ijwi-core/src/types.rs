//! Shared types for the ijwi speech service.
//!
//! Kept free of tokio, axum and ort so the CLI client and tests can use the
//! wire types without pulling in the inference stack.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Model loaded when `TTS_MODEL_NAME` is not set.
pub const DEFAULT_MODEL_NAME: &str = "facebook/mms-tts-kin";

// ─── Service configuration ───────────────────────────────────────────────

/// Log output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Speech service configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Hub repo id, or a path to a local model directory.
    pub model_name: String,
    pub model_revision: String,
    /// Location of the ONNX graph inside the model directory.
    pub onnx_file: String,
    pub cache_dir: PathBuf,
    pub hub_endpoint: String,
    pub hub_token: Option<String>,
    pub intra_threads: Option<usize>,
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.into(),
            model_revision: "main".into(),
            onnx_file: "onnx/model.onnx".into(),
            cache_dir: PathBuf::from("models"),
            hub_endpoint: "https://huggingface.co".into(),
            hub_token: None,
            intra_threads: None,
            host: "0.0.0.0".into(),
            port: 8000,
            log_format: LogFormat::Pretty,
        }
    }
}

impl ServiceConfig {
    /// `host:port` listen address.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ─── Model configuration ─────────────────────────────────────────────────

/// The subset of a checkpoint's `config.json` the service reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelConfig {
    pub sampling_rate: u32,
}

// ─── Readiness ───────────────────────────────────────────────────────────

/// Why the service cannot synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReadyReason {
    ModelNotLoaded,
}

impl NotReadyReason {
    /// Diagnostic code reported by `/health`.
    pub fn code(self) -> &'static str {
        match self {
            Self::ModelNotLoaded => "model_not_loaded",
        }
    }
}

/// Snapshot of the lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotReady(NotReadyReason),
}

impl Readiness {
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthState,
    pub detail: Option<String>,
}

impl From<Readiness> for HealthReport {
    fn from(readiness: Readiness) -> Self {
        match readiness {
            Readiness::Ready => Self {
                status: HealthState::Ok,
                detail: None,
            },
            Readiness::NotReady(reason) => Self {
                status: HealthState::Error,
                detail: Some(reason.code().to_string()),
            },
        }
    }
}

// ─── HTTP bodies ─────────────────────────────────────────────────────────

/// Body of `POST /tts`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}
