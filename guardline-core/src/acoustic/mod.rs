//! Acoustic inference abstraction.
//!
//! The `AcousticEngine` trait decouples the decode pipeline from any
//! specific backend (deterministic stub, ONNX graph execution, or a
//! resizable-interpreter style runtime — all fit behind the same
//! interface).
//!
//! `&mut self` on `infer` intentionally expresses that backends are
//! stateful — input tensors get resized to the current window length,
//! scratch buffers are reused, etc. All mutation is therefore serialised
//! through `EngineHandle`'s `parking_lot::Mutex`: at most one in-flight
//! `infer` per engine instance.

pub mod stub;

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "onnx")]
pub use onnx::OnnxEngine;

use std::sync::Arc;

use ndarray::Array2;
use parking_lot::Mutex;

use crate::buffering::window::AudioWindow;
use crate::error::{GuardlineError, Result};

/// Per-frame class scores produced by one inference pass.
///
/// Shape invariant: `[frames, vocab]` — every frame row has the same
/// width, equal to the vocabulary size the model was trained with.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLogitMatrix(Array2<f32>);

impl FrameLogitMatrix {
    /// Wrap a `[frames, vocab]` array.
    pub fn new(logits: Array2<f32>) -> Self {
        Self(logits)
    }

    /// Build from a flat row-major buffer.
    ///
    /// # Errors
    /// Fails with `EngineRuntime` when `data.len() != frames * vocab`.
    pub fn from_flat(frames: usize, vocab: usize, data: Vec<f32>) -> Result<Self> {
        let logits = Array2::from_shape_vec((frames, vocab), data).map_err(|e| {
            GuardlineError::EngineRuntime(format!("logit shape mismatch: {e}"))
        })?;
        Ok(Self(logits))
    }

    /// Number of frames (time steps).
    pub fn frames(&self) -> usize {
        self.0.nrows()
    }

    /// Vocabulary width of each frame.
    pub fn vocab_size(&self) -> usize {
        self.0.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.0.nrows() == 0
    }

    /// Iterate over frame rows in time order.
    pub fn rows(&self) -> impl Iterator<Item = ndarray::ArrayView1<'_, f32>> {
        self.0.rows().into_iter()
    }
}

/// Contract for acoustic inference backends.
pub trait AcousticEngine: Send + 'static {
    /// Run the model over one audio window and return per-frame logits.
    ///
    /// Deterministic for fixed weights and fixed input.
    ///
    /// # Errors
    /// - `GuardlineError::NotLoaded` if called before the backend finished
    ///   loading its model.
    /// - `GuardlineError::EngineRuntime` on a per-window execution failure;
    ///   transient — the caller skips the window and continues.
    fn infer(&mut self, window: &AudioWindow) -> Result<FrameLogitMatrix>;

    /// Release runtime resources (execution context, mapped weights).
    /// Further `infer` calls fail with `NotLoaded`.
    fn close(&mut self);
}

/// Thread-safe reference-counted handle to any `AcousticEngine` implementor.
///
/// The `parking_lot::Mutex` is what enforces the one-in-flight-`infer`
/// rule; callers needing concurrent windows queue on the lock or hold one
/// engine per stream.
#[derive(Clone)]
pub struct EngineHandle(pub Arc<Mutex<dyn AcousticEngine>>);

impl EngineHandle {
    /// Wrap any `AcousticEngine` in an `EngineHandle`.
    pub fn new<E: AcousticEngine>(engine: E) -> Self {
        Self(Arc::new(Mutex::new(engine)))
    }

    /// Explicitly release the underlying engine's resources.
    pub fn close(&self) {
        self.0.lock().close();
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle").finish_non_exhaustive()
    }
}

/// Convert PCM16 samples to mean/variance-normalized f32, the input
/// convention the acoustic model was trained with. A constant (or empty)
/// window normalizes to all zeros rather than dividing by a zero variance.
pub fn normalize_pcm16(samples: &[i16]) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    let mut out: Vec<f32> = samples.iter().map(|&s| f32::from(s) / 32_768.0).collect();
    let mean = out.iter().sum::<f32>() / out.len() as f32;
    let var = out.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / out.len() as f32;
    let denom = (var + 1e-7).sqrt();
    for v in &mut out {
        *v = (*v - mean) / denom;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn from_flat_rejects_shape_mismatch() {
        let err = FrameLogitMatrix::from_flat(2, 3, vec![0.0; 5]).unwrap_err();
        assert!(matches!(err, GuardlineError::EngineRuntime(_)));
    }

    #[test]
    fn normalize_produces_zero_mean_unit_variance() {
        let out = normalize_pcm16(&[-4000, -2000, 0, 2000, 4000]);
        let mean = out.iter().sum::<f32>() / out.len() as f32;
        let var = out.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / out.len() as f32;
        assert_relative_eq!(mean, 0.0, epsilon = 1e-5);
        assert_relative_eq!(var, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn normalize_handles_constant_window() {
        let out = normalize_pcm16(&[1000; 32]);
        assert!(out.iter().all(|v| v.abs() < 1e-3));
        assert!(normalize_pcm16(&[]).is_empty());
    }
}
