//! Synthesis pipeline — text → ids → waveform → PCM16 → WAV bytes.
//!
//! ```text
//! Voice::synthesize("Muraho")
//!     → tokenizer.encode        [1, n] int64 ids
//!     → model.forward           [1, samples] f32 waveform
//!     → drop batch axis         [samples]
//!     → scale_to_pcm16          i16 samples
//!     → write_wav               RIFF/PCM mono at the model's sample rate
//! ```
//!
//! A [`Voice`] owns the tokenizer and model together so neither can exist
//! without the other.

use std::fs;
use std::path::Path;

use ndarray::{Array2, ArrayD, Axis, Ix1};
use tracing::{debug, info, warn};

use ijwi_core::tokenizer::VitsTokenizer;
use ijwi_core::types::{ModelConfig, ServiceConfig};
use ijwi_core::wav::{scale_to_pcm16, write_wav};

use crate::error::{LoadError, SynthesisError};
use crate::hub::{self, ModelFiles};
use crate::model::{OnnxVits, SpeechModel};

pub struct Voice {
    tokenizer: VitsTokenizer,
    model: Box<dyn SpeechModel>,
    sample_rate: u32,
}

impl Voice {
    pub fn new(tokenizer: VitsTokenizer, model: Box<dyn SpeechModel>, sample_rate: u32) -> Self {
        Self {
            tokenizer,
            model,
            sample_rate,
        }
    }

    /// Resolve the configured model and build tokenizer and session from it.
    pub async fn load(config: &ServiceConfig) -> Result<Self, LoadError> {
        let files = hub::resolve(config).await?;
        let threads = config.intra_threads;
        tokio::task::spawn_blocking(move || Self::from_files(&files, threads))
            .await
            .map_err(|e| LoadError::Session(e.to_string()))?
    }

    /// Build a voice from files already on disk.
    pub fn from_files(files: &ModelFiles, intra_threads: Option<usize>) -> Result<Self, LoadError> {
        let model_config: ModelConfig =
            serde_json::from_str(&read(&files.config)?).map_err(|source| LoadError::Json {
                file: hub::CONFIG_FILE,
                source,
            })?;

        let vocab = read(&files.vocab)?;
        let tokenizer_config = files.tokenizer_config.as_deref().map(read).transpose()?;
        let tokenizer = VitsTokenizer::from_json(&vocab, tokenizer_config.as_deref())?;
        if tokenizer.config().is_uroman {
            warn!("model expects romanized input; text is passed through as-is");
        }

        let model = OnnxVits::load(&files.onnx, intra_threads)?;
        info!(sample_rate = model_config.sampling_rate, "voice loaded");
        Ok(Self::new(tokenizer, Box::new(model), model_config.sampling_rate))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Synthesize `text` into a complete WAV buffer. Blocking and CPU-bound.
    pub fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError> {
        let ids = self.tokenizer.encode(text);
        let len = ids.len();
        let input_ids = Array2::from_shape_vec((1, len), ids)?;

        let waveform = self.model.forward(&input_ids)?;
        let samples = squeeze_batch(waveform)?;
        if samples.is_empty() {
            return Err(SynthesisError::EmptyWaveform);
        }

        let pcm = scale_to_pcm16(&samples);
        debug!(
            tokens = len,
            samples = pcm.len(),
            sample_rate = self.sample_rate(),
            "synthesized"
        );
        Ok(write_wav(&pcm, self.sample_rate()))
    }
}

fn read(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Strip a leading batch axis of size 1 and return the mono sample sequence.
fn squeeze_batch(waveform: ArrayD<f32>) -> Result<Vec<f32>, SynthesisError> {
    let shape = waveform.shape().to_vec();
    let waveform = match shape.as_slice() {
        [_] => waveform,
        [1, ..] => waveform.index_axis_move(Axis(0), 0),
        _ => return Err(SynthesisError::WaveformShape(shape.clone())),
    };
    waveform
        .into_dimensionality::<Ix1>()
        .map(|w| w.to_vec())
        .map_err(|_| SynthesisError::WaveformShape(shape))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ijwi_core::wav::parse_wav_header;
    use ndarray::IxDyn;

    /// Emits one sample per input id, derived from the id.
    struct EchoModel;

    impl SpeechModel for EchoModel {
        fn forward(&self, input_ids: &Array2<i64>) -> Result<ArrayD<f32>, SynthesisError> {
            let samples: Vec<f32> = input_ids.iter().map(|&id| id as f32 / 10.0).collect();
            Ok(ArrayD::from_shape_vec(IxDyn(&[1, samples.len()]), samples)?)
        }
    }

    struct ShapedModel(Vec<usize>);

    impl SpeechModel for ShapedModel {
        fn forward(&self, _: &Array2<i64>) -> Result<ArrayD<f32>, SynthesisError> {
            Ok(ArrayD::zeros(IxDyn(&self.0)))
        }
    }

    fn tokenizer() -> VitsTokenizer {
        VitsTokenizer::from_json(r#"{"_": 0, "a": 1, "b": 2}"#, None).unwrap()
    }

    #[test]
    fn synthesize_frames_wav_at_model_rate() {
        let voice = Voice::new(tokenizer(), Box::new(EchoModel), 16_000);
        let wav = voice.synthesize("ab").unwrap();
        let hdr = parse_wav_header(&wav).unwrap();
        assert_eq!(hdr.sample_rate, 16_000);
        assert_eq!(hdr.channels, 1);
        // blank a blank b blank
        assert_eq!(hdr.frame_count(), 5);
        let second = i16::from_le_bytes([wav[hdr.data_offset + 2], wav[hdr.data_offset + 3]]);
        assert_eq!(second, (0.1f32 * 32767.0) as i16);
    }

    #[test]
    fn synthesize_is_deterministic() {
        let voice = Voice::new(tokenizer(), Box::new(EchoModel), 22_050);
        assert_eq!(voice.synthesize("abba").unwrap(), voice.synthesize("abba").unwrap());
    }

    #[test]
    fn squeeze_drops_unit_batch_axis() {
        let batched = ArrayD::from_shape_vec(IxDyn(&[1, 3]), vec![0.25, -0.5, 1.0]).unwrap();
        assert_eq!(squeeze_batch(batched).unwrap(), vec![0.25, -0.5, 1.0]);
    }

    #[test]
    fn sample_rate_comes_from_model_config() {
        let voice = Voice::new(tokenizer(), Box::new(EchoModel), 22_050);
        assert_eq!(voice.sample_rate(), 22_050);
        let hdr = parse_wav_header(&voice.synthesize("a").unwrap()).unwrap();
        assert_eq!(hdr.sample_rate, voice.sample_rate());
    }

    #[test]
    fn squeeze_accepts_flat_waveform() {
        let flat = ArrayD::from_shape_vec(IxDyn(&[3]), vec![0.0, 0.5, 1.0]).unwrap();
        assert_eq!(squeeze_batch(flat).unwrap(), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn batch_larger_than_one_is_rejected() {
        let voice = Voice::new(tokenizer(), Box::new(ShapedModel(vec![2, 10])), 16_000);
        assert!(matches!(
            voice.synthesize("a"),
            Err(SynthesisError::WaveformShape(shape)) if shape == vec![2, 10]
        ));
    }

    #[test]
    fn extra_axes_are_rejected() {
        let voice = Voice::new(tokenizer(), Box::new(ShapedModel(vec![1, 2, 10])), 16_000);
        assert!(matches!(
            voice.synthesize("a"),
            Err(SynthesisError::WaveformShape(_))
        ));
    }

    #[test]
    fn empty_waveform_is_an_error() {
        let voice = Voice::new(tokenizer(), Box::new(ShapedModel(vec![1, 0])), 16_000);
        assert!(matches!(voice.synthesize("a"), Err(SynthesisError::EmptyWaveform)));
    }

    #[test]
    fn from_files_reports_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let files = ModelFiles {
            config: dir.path().join("config.json"),
            vocab: dir.path().join("vocab.json"),
            tokenizer_config: None,
            onnx: dir.path().join("model.onnx"),
        };
        assert!(matches!(
            Voice::from_files(&files, None),
            Err(LoadError::Io { .. })
        ));
    }

    #[test]
    fn from_files_rejects_config_without_sampling_rate() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), r#"{"model_type": "vits"}"#).unwrap();
        let files = ModelFiles {
            config: dir.path().join("config.json"),
            vocab: dir.path().join("vocab.json"),
            tokenizer_config: None,
            onnx: dir.path().join("model.onnx"),
        };
        assert!(matches!(
            Voice::from_files(&files, None),
            Err(LoadError::Json { file: "config.json", .. })
        ));
    }
}
