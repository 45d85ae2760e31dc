//! `ListenerEngine` — top-level session lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! ListenerEngine::new(config, engine, decoder)
//!     └─► start()        → ring created, pipeline spawned, status = Listening
//!         └─► stop()     → running=false, remainder flushed, status = Stopped
//!             └─► close_engine() → acoustic resources released
//! ```
//!
//! `start()`/`stop()` are idempotent-safe: calling them in the wrong state
//! returns an error rather than panicking. The external capture
//! collaborator receives the ring producer from `start()` and pushes
//! 16 kHz PCM16 chunks into it from its own thread; capture is never
//! blocked by inference latency.

pub mod pipeline;

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::info;

use crate::{
    acoustic::EngineHandle,
    buffering::{create_pcm_ring, PcmProducer},
    decoder::CtcDecoder,
    error::{GuardlineError, Result},
    events::{EngineStatus, EngineStatusEvent, TranscriptEvent},
    transcript::StreamingTranscriptAssembler,
};

/// Broadcast channel capacity: 256 events buffered for slow consumers.
const BROADCAST_CAP: usize = 256;

/// Configuration for `ListenerEngine`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sample rate of the incoming PCM16 audio (Hz). The capture
    /// collaborator delivers 16 kHz mono; no resampling happens here.
    pub sample_rate: u32,
    /// Minimum samples before a window is sent to inference.
    /// Default: 16 000 (1 s).
    pub min_window_samples: usize,
    /// Maximum window length; longer accumulation is split.
    /// Default: 80 000 (5 s).
    pub max_window_samples: usize,
    /// Tail retained between consecutive windows so words are not cut at
    /// window boundaries. Default: 4 800 (300 ms).
    pub overlap_samples: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            min_window_samples: 16_000,
            max_window_samples: 80_000,
            overlap_samples: 4_800,
        }
    }
}

/// The top-level session handle.
///
/// `ListenerEngine` is `Send + Sync` — all fields use interior mutability.
/// Wrap in `Arc<ListenerEngine>` to share between the host integration and
/// event-forwarding tasks.
pub struct ListenerEngine {
    config: EngineConfig,
    engine: EngineHandle,
    decoder: CtcDecoder,
    /// `true` while the pipeline is active.
    running: Arc<AtomicBool>,
    /// Canonical status (written atomically via Mutex, read from callers).
    status: Arc<Mutex<EngineStatus>>,
    transcript_tx: broadcast::Sender<TranscriptEvent>,
    status_tx: broadcast::Sender<EngineStatusEvent>,
    /// Monotonically increasing event sequence counter.
    seq: Arc<AtomicU64>,
    diagnostics: Arc<pipeline::PipelineDiagnostics>,
}

impl ListenerEngine {
    /// Create a new session controller. Does not start decoding — call
    /// `start()` and hand the returned producer to the capture source.
    pub fn new(config: EngineConfig, engine: EngineHandle, decoder: CtcDecoder) -> Self {
        let (transcript_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);

        Self {
            config,
            engine,
            decoder,
            running: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(EngineStatus::Idle)),
            transcript_tx,
            status_tx,
            seq: Arc::new(AtomicU64::new(0)),
            diagnostics: Arc::new(pipeline::PipelineDiagnostics::default()),
        }
    }

    /// Start the decode pipeline and return the producer half of the PCM
    /// ring for the capture collaborator.
    ///
    /// Each `start` begins a fresh transcript session (the assembler is
    /// created anew); the pipeline runs on a blocking worker until `stop`.
    ///
    /// # Errors
    /// - `GuardlineError::AlreadyRunning` if already started.
    pub fn start(&self) -> Result<PcmProducer> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(GuardlineError::AlreadyRunning);
        }

        self.diagnostics.reset();
        self.set_status(EngineStatus::Listening, None);

        let (producer, consumer) = create_pcm_ring();

        let ctx = pipeline::PipelineContext {
            config: self.config.clone(),
            engine: self.engine.clone(),
            decoder: self.decoder.clone(),
            assembler: StreamingTranscriptAssembler::new(self.decoder.clone()),
            consumer,
            running: Arc::clone(&self.running),
            transcript_tx: self.transcript_tx.clone(),
            status_tx: self.status_tx.clone(),
            status: Arc::clone(&self.status),
            seq: Arc::clone(&self.seq),
            diagnostics: Arc::clone(&self.diagnostics),
        };

        tokio::task::spawn_blocking(move || pipeline::run(ctx));

        info!("listener started");
        Ok(producer)
    }

    /// Stop the decode pipeline.
    ///
    /// The pipeline drains what the capture side already pushed, flushes a
    /// final gated window, and exits; an in-flight `infer` completes under
    /// the engine lock and is never abandoned mid-call.
    ///
    /// # Errors
    /// - `GuardlineError::NotRunning` if not currently running.
    pub fn stop(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(GuardlineError::NotRunning);
        }
        self.set_status(EngineStatus::Stopped, None);
        info!("listener stop requested");
        Ok(())
    }

    /// Explicitly release the acoustic engine's runtime resources.
    /// Call after `stop()`; a later `start()` would fail per-window with
    /// `NotLoaded`.
    pub fn close_engine(&self) {
        self.engine.close();
    }

    /// Current engine status (snapshot).
    pub fn status(&self) -> EngineStatus {
        *self.status.lock()
    }

    /// Subscribe to live transcript events.
    pub fn subscribe_transcripts(&self) -> broadcast::Receiver<TranscriptEvent> {
        self.transcript_tx.subscribe()
    }

    /// Subscribe to live status change events.
    pub fn subscribe_status(&self) -> broadcast::Receiver<EngineStatusEvent> {
        self.status_tx.subscribe()
    }

    /// Snapshot of pipeline counters for observability.
    pub fn diagnostics_snapshot(&self) -> pipeline::DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    fn set_status(&self, new_status: EngineStatus, detail: Option<String>) {
        *self.status.lock() = new_status;
        let _ = self.status_tx.send(EngineStatusEvent {
            status: new_status,
            detail,
        });
    }
}
