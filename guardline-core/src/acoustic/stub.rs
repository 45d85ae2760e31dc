//! `StubEngine` — deterministic backend that emits scripted logits
//! without a real model.
//!
//! Used by the pipeline and integration tests, and during bring-up
//! before a trained model artifact is wired in. Each `infer` call pops
//! the next scripted per-frame argmax sequence and materialises it as a
//! one-hot logit matrix; an exhausted (or empty) script produces
//! all-blank frames derived from the window length.

use std::collections::VecDeque;

use ndarray::Array2;
use tracing::debug;

use crate::acoustic::{AcousticEngine, FrameLogitMatrix};
use crate::buffering::window::AudioWindow;
use crate::error::{GuardlineError, Result};

/// Samples per output frame when synthesizing all-blank fallback logits,
/// matching the 20 ms stride of the real model.
const STUB_FRAME_STRIDE: usize = 320;

pub struct StubEngine {
    vocab_size: usize,
    blank_id: usize,
    script: VecDeque<Vec<usize>>,
    loaded: bool,
    infer_calls: u64,
}

impl StubEngine {
    /// An engine that answers every window with all-blank frames.
    pub fn new(vocab_size: usize, blank_id: usize) -> Self {
        Self::scripted(vocab_size, blank_id, Vec::new())
    }

    /// An engine that answers successive windows with the given per-frame
    /// argmax sequences, in order.
    pub fn scripted(vocab_size: usize, blank_id: usize, picks: Vec<Vec<usize>>) -> Self {
        Self {
            vocab_size,
            blank_id,
            script: picks.into(),
            loaded: true,
            infer_calls: 0,
        }
    }

    fn one_hot(&self, picks: &[usize]) -> FrameLogitMatrix {
        let mut logits = Array2::<f32>::zeros((picks.len(), self.vocab_size));
        for (frame, &pick) in picks.iter().enumerate() {
            logits[[frame, pick.min(self.vocab_size - 1)]] = 10.0;
        }
        FrameLogitMatrix::new(logits)
    }
}

impl AcousticEngine for StubEngine {
    fn infer(&mut self, window: &AudioWindow) -> Result<FrameLogitMatrix> {
        if !self.loaded {
            return Err(GuardlineError::NotLoaded);
        }
        self.infer_calls += 1;

        let logits = match self.script.pop_front() {
            Some(picks) => self.one_hot(&picks),
            None => {
                let frames = window.len() / STUB_FRAME_STRIDE;
                self.one_hot(&vec![self.blank_id; frames])
            }
        };
        debug!(
            call = self.infer_calls,
            samples = window.len(),
            frames = logits.frames(),
            "StubEngine::infer"
        );
        Ok(logits)
    }

    fn close(&mut self) {
        debug!("StubEngine::close");
        self.loaded = false;
    }
}
