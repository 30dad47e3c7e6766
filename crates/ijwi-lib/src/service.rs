//! Service lifecycle — load once at startup, then serve read-only.
//!
//! The loaded [`Voice`] is either fully present or absent. A failed load is
//! logged and leaves the service permanently not ready; nothing retries.

use std::sync::Arc;

use tracing::{error, info};

use ijwi_core::types::{NotReadyReason, Readiness, ServiceConfig};

use crate::engine::Voice;
use crate::error::{ApiError, SynthesisError};

pub struct SpeechService {
    voice: Option<Arc<Voice>>,
}

impl SpeechService {
    pub fn ready(voice: Voice) -> Self {
        Self {
            voice: Some(Arc::new(voice)),
        }
    }

    pub fn not_ready() -> Self {
        Self { voice: None }
    }

    /// Load the configured model. Never fails: errors leave the service not ready.
    pub async fn load(config: &ServiceConfig) -> Self {
        info!(model = %config.model_name, revision = %config.model_revision, "loading model");
        let t0 = std::time::Instant::now();
        match Voice::load(config).await {
            Ok(voice) => {
                info!(model = %config.model_name, elapsed = ?t0.elapsed(), "model ready");
                Self::ready(voice)
            }
            Err(e) => {
                error!(model = %config.model_name, "error loading model: {e}");
                Self::not_ready()
            }
        }
    }

    pub fn status(&self) -> Readiness {
        match self.voice {
            Some(_) => Readiness::Ready,
            None => Readiness::NotReady(NotReadyReason::ModelNotLoaded),
        }
    }

    /// The loaded voice, or `NotReady`.
    pub fn voice(&self) -> Result<Arc<Voice>, ApiError> {
        self.voice.clone().ok_or(ApiError::NotReady)
    }

    /// Validate `text` and synthesize it on a blocking worker thread.
    ///
    /// Readiness is checked before the text so a not-ready service answers
    /// `NotReady` for every input.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ApiError> {
        let voice = self.voice()?;
        let text = strip(text);
        if text.is_empty() {
            return Err(ApiError::InvalidInput);
        }

        let text = text.to_string();
        let wav = tokio::task::spawn_blocking(move || voice.synthesize(&text))
            .await
            .map_err(SynthesisError::from)??;
        Ok(wav)
    }
}

/// Trim whitespace plus the ASCII file/group/record/unit separators.
fn strip(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || ('\x1c'..='\x1f').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use ijwi_core::tokenizer::VitsTokenizer;
    use ndarray::{Array2, ArrayD, IxDyn};

    use crate::model::SpeechModel;

    struct CountingModel(Arc<AtomicUsize>);

    impl SpeechModel for CountingModel {
        fn forward(&self, input_ids: &Array2<i64>) -> Result<ArrayD<f32>, SynthesisError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(ArrayD::from_elem(IxDyn(&[1, input_ids.len() * 4]), 0.25))
        }
    }

    struct PanickingModel;

    impl SpeechModel for PanickingModel {
        fn forward(&self, _: &Array2<i64>) -> Result<ArrayD<f32>, SynthesisError> {
            panic!("kernel fault");
        }
    }

    fn voice(model: impl SpeechModel + 'static) -> Voice {
        let tokenizer =
            VitsTokenizer::from_json(r#"{"_": 0, "a": 1, "m": 2, "o": 3}"#, None).unwrap();
        Voice::new(tokenizer, Box::new(model), 16_000)
    }

    #[test]
    fn status_reflects_voice_presence() {
        assert_eq!(
            SpeechService::not_ready().status(),
            Readiness::NotReady(NotReadyReason::ModelNotLoaded)
        );
        let calls = Arc::new(AtomicUsize::new(0));
        let service = SpeechService::ready(voice(CountingModel(calls)));
        assert_eq!(service.status(), Readiness::Ready);
    }

    #[tokio::test]
    async fn blank_text_is_rejected_without_inference() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = SpeechService::ready(voice(CountingModel(calls.clone())));
        for text in ["", "   ", "\n\t ", "\u{1f}", " \u{1c}\u{1d}\u{1e} "] {
            assert!(matches!(service.synthesize(text).await, Err(ApiError::InvalidInput)));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn strip_keeps_inner_separators() {
        assert_eq!(strip("\u{1f} a\u{1e}m \u{1c}"), "a\u{1e}m");
    }

    #[tokio::test]
    async fn not_ready_wins_over_invalid_input() {
        let service = SpeechService::not_ready();
        assert!(matches!(service.synthesize("   ").await, Err(ApiError::NotReady)));
        assert!(matches!(service.synthesize("amo").await, Err(ApiError::NotReady)));
    }

    #[tokio::test]
    async fn valid_text_runs_one_inference() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = SpeechService::ready(voice(CountingModel(calls.clone())));
        let wav = service.synthesize("  amo  ").await.unwrap();
        assert!(!wav.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_inference_becomes_internal_error() {
        let service = SpeechService::ready(voice(PanickingModel));
        assert!(matches!(
            service.synthesize("amo").await,
            Err(ApiError::Internal(SynthesisError::Worker(_)))
        ));
    }

    #[tokio::test]
    async fn load_failure_leaves_service_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig {
            model_name: dir.path().to_string_lossy().into_owned(),
            ..Default::default()
        };
        let service = SpeechService::load(&config).await;
        assert!(!service.status().is_ready());
    }
}
