//! `OnnxEngine` — graph-execution acoustic backend over `ort`.
//!
//! Wraps a CTC acoustic model exported to ONNX that maps a normalized
//! waveform `[1, samples]` to logits `[1, frames, vocab]` (wav2vec2-style
//! export). The session is created once at `load` and owns the mapped
//! weights and execution context until `close`.
//!
//! `infer` resizes the input tensor to the current window length on every
//! call, which is exactly why the trait takes `&mut self` and why
//! `EngineHandle` serializes calls.

use std::path::{Path, PathBuf};

use ndarray::Array2;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::{Session, SessionInputValue};
use ort::value::Value;
use tracing::{debug, info};

use crate::acoustic::{normalize_pcm16, AcousticEngine, FrameLogitMatrix};
use crate::buffering::window::AudioWindow;
use crate::error::{GuardlineError, Result};

pub struct OnnxEngine {
    session: Option<Session>,
    input_name: String,
    output_name: String,
    vocab_size: usize,
}

impl OnnxEngine {
    /// Load the acoustic model graph from `model_path`.
    ///
    /// `vocab_size` is the expected logit width (from the vocabulary
    /// file); a model producing a different width fails per-window with
    /// `EngineRuntime` rather than at load, since ONNX shapes are often
    /// dynamic.
    ///
    /// # Errors
    /// `ModelNotFound` when the file is absent, `ModelLoad` when ort
    /// cannot parse it as a model graph.
    pub fn load(model_path: impl AsRef<Path>, vocab_size: usize) -> Result<Self> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(GuardlineError::ModelNotFound {
                path: PathBuf::from(model_path),
            });
        }

        let intra_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .clamp(1, 8);

        let session = SessionBuilder::new()
            .map_err(|e| GuardlineError::ModelLoad(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::All)
            .map_err(|e| GuardlineError::ModelLoad(e.to_string()))?
            .with_intra_threads(intra_threads)
            .map_err(|e| GuardlineError::ModelLoad(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| GuardlineError::ModelLoad(e.to_string()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| GuardlineError::ModelLoad("model graph has no inputs".into()))?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| GuardlineError::ModelLoad("model graph has no outputs".into()))?;

        info!(
            path = %model_path.display(),
            input = %input_name,
            output = %output_name,
            intra_threads,
            "ONNX acoustic model loaded"
        );

        Ok(Self {
            session: Some(session),
            input_name,
            output_name,
            vocab_size,
        })
    }
}

impl AcousticEngine for OnnxEngine {
    fn infer(&mut self, window: &AudioWindow) -> Result<FrameLogitMatrix> {
        let session = self.session.as_mut().ok_or(GuardlineError::NotLoaded)?;

        let normalized = normalize_pcm16(&window.samples);
        let sample_count = normalized.len();
        let input = Array2::from_shape_vec((1, sample_count), normalized)
            .map_err(|e| GuardlineError::EngineRuntime(e.to_string()))?;
        let input_value = Value::from_array(input)
            .map_err(|e: ort::Error| GuardlineError::EngineRuntime(e.to_string()))?;

        let inputs: Vec<(String, SessionInputValue<'_>)> = vec![(
            self.input_name.clone(),
            SessionInputValue::from(input_value),
        )];
        let outputs = session
            .run(inputs)
            .map_err(|e| GuardlineError::EngineRuntime(e.to_string()))?;

        let (shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| GuardlineError::EngineRuntime(e.to_string()))?;

        // Accept [1, frames, vocab] or [frames, vocab].
        let (frames, width) = match shape.len() {
            3 => (shape[1] as usize, shape[2] as usize),
            2 => (shape[0] as usize, shape[1] as usize),
            n => {
                return Err(GuardlineError::EngineRuntime(format!(
                    "unexpected logit rank {n}"
                )))
            }
        };
        if width != self.vocab_size {
            return Err(GuardlineError::EngineRuntime(format!(
                "logit width {width} does not match vocabulary size {}",
                self.vocab_size
            )));
        }

        debug!(samples = sample_count, frames, "acoustic inference complete");
        FrameLogitMatrix::from_flat(frames, width, data.to_vec())
    }

    fn close(&mut self) {
        if self.session.take().is_some() {
            info!("ONNX acoustic session released");
        }
    }
}
