//! # guardline-core
//!
//! On-device streaming speech-to-text engine for live call audio. The
//! transcript it produces feeds a downstream scam-analysis step (keyword
//! matching / LLM classification — external to this crate).
//!
//! ## Architecture
//!
//! ```text
//! Capture collaborator → SPSC RingBuffer → Pipeline(spawn_blocking)
//!                                               │
//!                                       AudioWindowBuffer (min gate, overlap)
//!                                               │
//!                                       AcousticEngine::infer (serialized)
//!                                               │
//!                                       CtcDecoder greedy decode
//!                                               │
//!                                       StreamingTranscriptAssembler
//!                                               │
//!                                       broadcast::Sender<TranscriptEvent>
//! ```
//!
//! The capture-side `push_slice` is zero-alloc. All heap work happens on
//! the pipeline thread. The `LanguageModel` is an independent scoring
//! utility for callers adding rescoring on top of the greedy decode.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod acoustic;
pub mod buffering;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod events;
pub mod lm;
pub mod transcript;
pub mod vocab;

// Convenience re-exports for downstream crates
pub use acoustic::{AcousticEngine, EngineHandle, FrameLogitMatrix};
pub use buffering::window::{AudioWindow, AudioWindowBuffer};
pub use decoder::CtcDecoder;
pub use engine::{EngineConfig, ListenerEngine};
pub use error::GuardlineError;
pub use events::{EngineStatus, EngineStatusEvent, TranscriptEvent};
pub use lm::LanguageModel;
pub use transcript::{StreamingTranscriptAssembler, TranscriptionResult};
pub use vocab::Vocabulary;

#[cfg(feature = "onnx")]
pub use acoustic::OnnxEngine;
