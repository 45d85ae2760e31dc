//! Audio window assembly with minimum-length gating and overlap retention.
//!
//! Successive windows deliberately overlap in time so words are not cut
//! at window boundaries; the assembler trims the duplicated decode output
//! afterwards (`transcript` module).

use crate::error::{GuardlineError, Result};

/// Sample rate the acoustic model expects (fixed at training time).
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// A contiguous block of mono PCM16 samples at a known sample rate.
#[derive(Debug, Clone)]
pub struct AudioWindow {
    /// Mono 16-bit signed PCM samples.
    pub samples: Vec<i16>,
    /// Sample rate in Hz (16 000 in this system).
    pub sample_rate: u32,
}

impl AudioWindow {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration of this window in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Accumulates capture chunks and emits inference-ready windows.
///
/// A buffer shorter than `min_window_samples` never yields a window —
/// that is the gating contract, not an error. When a window is taken,
/// its last `overlap_samples` stay behind so the next window overlaps it.
#[derive(Debug)]
pub struct AudioWindowBuffer {
    samples: Vec<i16>,
    min_window_samples: usize,
    max_window_samples: usize,
    overlap_samples: usize,
    sample_rate: u32,
}

impl AudioWindowBuffer {
    /// # Errors
    /// Fails when the bounds are inconsistent (`min` of zero, `max < min`,
    /// or an overlap that would re-emit a whole window verbatim).
    pub fn new(
        min_window_samples: usize,
        max_window_samples: usize,
        overlap_samples: usize,
        sample_rate: u32,
    ) -> Result<Self> {
        if min_window_samples == 0 || max_window_samples < min_window_samples {
            return Err(GuardlineError::Other(anyhow::anyhow!(
                "invalid window bounds: min={min_window_samples} max={max_window_samples}"
            )));
        }
        if overlap_samples >= min_window_samples {
            return Err(GuardlineError::Other(anyhow::anyhow!(
                "overlap {overlap_samples} must be smaller than min window {min_window_samples}"
            )));
        }
        Ok(Self {
            samples: Vec::with_capacity(max_window_samples),
            min_window_samples,
            max_window_samples,
            overlap_samples,
            sample_rate,
        })
    }

    /// Append a capture chunk.
    pub fn push(&mut self, chunk: &[i16]) {
        self.samples.extend_from_slice(chunk);
    }

    /// Buffered sample count.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Take the next inference window, or `None` while below the minimum.
    ///
    /// The emitted window covers at most `max_window_samples`; its tail
    /// (`overlap_samples`) is retained for the next window.
    pub fn take_window(&mut self) -> Option<AudioWindow> {
        if self.samples.len() < self.min_window_samples {
            return None;
        }
        let take = self.samples.len().min(self.max_window_samples);
        let window = AudioWindow::new(self.samples[..take].to_vec(), self.sample_rate);
        let consumed = take - self.overlap_samples;
        self.samples.drain(..consumed);
        Some(window)
    }

    /// Discard all buffered audio (new session).
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
