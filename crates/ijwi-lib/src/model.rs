//! Model handle — token ids in, raw waveform tensor out.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use ndarray::{Array2, ArrayD};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Tensor;
use tracing::info;

use crate::error::{LoadError, SynthesisError};

/// A loaded text-to-speech network.
///
/// `forward` takes a `[batch, tokens]` id matrix and returns the waveform with
/// whatever leading batch axes the network emits.
pub trait SpeechModel: Send + Sync {
    fn forward(&self, input_ids: &Array2<i64>) -> Result<ArrayD<f32>, SynthesisError>;
}

/// VITS graph exported to ONNX (`input_ids`, `attention_mask` → `waveform`),
/// executed on the CPU.
pub struct OnnxVits {
    // `Session::run` needs `&mut`, so concurrent requests take turns.
    session: Mutex<Session>,
}

impl OnnxVits {
    pub fn load(path: &Path, intra_threads: Option<usize>) -> Result<Self, LoadError> {
        let mut builder = Session::builder()
            .map_err(|e| LoadError::Session(e.to_string()))?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .map_err(|e| LoadError::Session(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| LoadError::Session(e.to_string()))?;
        if let Some(threads) = intra_threads {
            builder = builder
                .with_intra_threads(threads)
                .map_err(|e| LoadError::Session(e.to_string()))?;
        }
        let session = builder
            .commit_from_file(path)
            .map_err(|e| LoadError::Session(e.to_string()))?;

        info!(path = %path.display(), "inference session ready (cpu)");
        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

/// A panic mid-run fails only that request; the session stays usable.
fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SpeechModel for OnnxVits {
    fn forward(&self, input_ids: &Array2<i64>) -> Result<ArrayD<f32>, SynthesisError> {
        let inference_err = |e: ort::Error| SynthesisError::Inference(e.to_string());

        let attention_mask = Array2::<i64>::ones(input_ids.raw_dim());
        let ids = Tensor::from_array(input_ids.clone()).map_err(inference_err)?;
        let mask = Tensor::from_array(attention_mask).map_err(inference_err)?;

        let mut session = lock_recovering(&self.session);
        let outputs = session
            .run(ort::inputs!["input_ids" => ids, "attention_mask" => mask])
            .map_err(inference_err)?;

        let waveform = outputs["waveform"]
            .try_extract_array::<f32>()
            .map_err(inference_err)?;
        Ok(waveform.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn lock_survives_a_panicking_holder() {
        let shared = Arc::new(Mutex::new(0u32));
        let held = shared.clone();
        let _ = std::thread::spawn(move || {
            let _guard = held.lock().unwrap();
            panic!("run aborted");
        })
        .join();
        assert!(shared.is_poisoned());

        *lock_recovering(&shared) += 1;
        assert_eq!(*lock_recovering(&shared), 1);
    }
}
