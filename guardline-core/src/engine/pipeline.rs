//! Blocking decode loop.
//!
//! ## Pipeline stages (per iteration)
//!
//! ```text
//! 1. Drain ring buffer → &[i16] (one capture chunk per iteration)
//! 2. Feed AudioWindowBuffer (minimum-length gate, overlap retention)
//! 3. For each ready window:
//!    a. AcousticEngine::infer (serialized through EngineHandle's lock)
//!    b. CtcDecoder greedy decode + detokenize
//!    c. StreamingTranscriptAssembler::feed (overlap trim, promotion)
//!    d. Broadcast TranscriptEvent
//! 4. On stop: flush the buffered remainder if it clears the gate
//! ```
//!
//! The loop runs in `spawn_blocking` so capture is never blocked by
//! inference latency. A per-window inference failure is transient: the
//! window contributes nothing and the session continues with the
//! assembler untouched.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    Arc,
};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::{
    acoustic::EngineHandle,
    buffering::{window::AudioWindow, window::AudioWindowBuffer, Consumer, PcmConsumer},
    decoder::CtcDecoder,
    engine::EngineConfig,
    events::{EngineStatus, EngineStatusEvent, TranscriptEvent},
    transcript::StreamingTranscriptAssembler,
};

pub struct PipelineDiagnostics {
    pub samples_in: AtomicUsize,
    pub windows_inferred: AtomicUsize,
    pub inference_errors: AtomicUsize,
    pub empty_windows: AtomicUsize,
    pub events_emitted: AtomicUsize,
}

impl Default for PipelineDiagnostics {
    fn default() -> Self {
        Self {
            samples_in: AtomicUsize::new(0),
            windows_inferred: AtomicUsize::new(0),
            inference_errors: AtomicUsize::new(0),
            empty_windows: AtomicUsize::new(0),
            events_emitted: AtomicUsize::new(0),
        }
    }
}

impl PipelineDiagnostics {
    pub fn reset(&self) {
        self.samples_in.store(0, Ordering::Relaxed);
        self.windows_inferred.store(0, Ordering::Relaxed);
        self.inference_errors.store(0, Ordering::Relaxed);
        self.empty_windows.store(0, Ordering::Relaxed);
        self.events_emitted.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            samples_in: self.samples_in.load(Ordering::Relaxed),
            windows_inferred: self.windows_inferred.load(Ordering::Relaxed),
            inference_errors: self.inference_errors.load(Ordering::Relaxed),
            empty_windows: self.empty_windows.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DiagnosticsSnapshot {
    pub samples_in: usize,
    pub windows_inferred: usize,
    pub inference_errors: usize,
    pub empty_windows: usize,
    pub events_emitted: usize,
}

/// All context the pipeline needs, passed as one struct so the closure stays tidy.
pub struct PipelineContext {
    pub config: EngineConfig,
    pub engine: EngineHandle,
    pub decoder: CtcDecoder,
    pub assembler: StreamingTranscriptAssembler,
    pub consumer: PcmConsumer,
    pub running: Arc<AtomicBool>,
    pub transcript_tx: broadcast::Sender<TranscriptEvent>,
    pub status_tx: broadcast::Sender<EngineStatusEvent>,
    pub status: Arc<Mutex<EngineStatus>>,
    pub seq: Arc<AtomicU64>,
    pub diagnostics: Arc<PipelineDiagnostics>,
}

/// Chunk size drained from the ring buffer per iteration: 20 ms at 16 kHz.
const DRAIN_CHUNK: usize = 320;

/// Sleep when the ring is empty (avoids busy-wait burning a core).
const SLEEP_EMPTY_MS: u64 = 5;

/// Run the blocking pipeline until `ctx.running` becomes false.
pub fn run(mut ctx: PipelineContext) {
    info!(
        min_window = ctx.config.min_window_samples,
        max_window = ctx.config.max_window_samples,
        overlap = ctx.config.overlap_samples,
        "pipeline started"
    );

    let mut window_buf = match AudioWindowBuffer::new(
        ctx.config.min_window_samples,
        ctx.config.max_window_samples,
        ctx.config.overlap_samples,
        ctx.config.sample_rate,
    ) {
        Ok(b) => b,
        Err(e) => {
            error!("failed to create window buffer: {e}");
            *ctx.status.lock() = EngineStatus::Error;
            let _ = ctx.status_tx.send(EngineStatusEvent {
                status: EngineStatus::Error,
                detail: Some(e.to_string()),
            });
            return;
        }
    };

    // Scratch buffer, reused each iteration.
    let mut raw = vec![0i16; DRAIN_CHUNK];

    loop {
        if !ctx.running.load(Ordering::Relaxed) {
            break;
        }

        let n = ctx.consumer.pop_slice(&mut raw);
        if n == 0 {
            // Nothing to process — yield to avoid burning 100 % CPU.
            std::thread::sleep(std::time::Duration::from_millis(SLEEP_EMPTY_MS));
            continue;
        }
        ctx.diagnostics.samples_in.fetch_add(n, Ordering::Relaxed);
        window_buf.push(&raw[..n]);

        while let Some(window) = window_buf.take_window() {
            process_window(&mut ctx, &window);
        }
    }

    // Stop requested: drain whatever the capture side already pushed, then
    // flush the remainder if it clears the minimum gate. Audio below the
    // gate is contractually silent, not an error.
    loop {
        let n = ctx.consumer.pop_slice(&mut raw);
        if n == 0 {
            break;
        }
        ctx.diagnostics.samples_in.fetch_add(n, Ordering::Relaxed);
        window_buf.push(&raw[..n]);
    }
    while let Some(window) = window_buf.take_window() {
        process_window(&mut ctx, &window);
    }
    if !window_buf.is_empty() {
        // Whatever remains is below the minimum gate and never reaches
        // the engine.
        debug!(
            samples = window_buf.len(),
            "discarding sub-minimum audio tail on stop"
        );
        window_buf.clear();
    }

    let snap = ctx.diagnostics.snapshot();
    info!(
        samples_in = snap.samples_in,
        windows_inferred = snap.windows_inferred,
        inference_errors = snap.inference_errors,
        empty_windows = snap.empty_windows,
        events_emitted = snap.events_emitted,
        "pipeline stopped — diagnostics"
    );
}

/// Infer, decode, and merge one window; broadcast the result.
/// Returns `false` when the window contributed nothing (error or silence).
fn process_window(ctx: &mut PipelineContext, window: &AudioWindow) -> bool {
    ctx.diagnostics
        .windows_inferred
        .fetch_add(1, Ordering::Relaxed);

    let logits = {
        let mut engine = ctx.engine.0.lock();
        match engine.infer(window) {
            Ok(logits) => logits,
            Err(e) => {
                ctx.diagnostics
                    .inference_errors
                    .fetch_add(1, Ordering::Relaxed);
                warn!(samples = window.len(), error = %e, "window inference failed — skipping window");
                return false;
            }
        }
    };

    let result = ctx.decoder.decode(&logits);
    if result.tokens.is_empty() {
        ctx.diagnostics.empty_windows.fetch_add(1, Ordering::Relaxed);
        debug!(frames = logits.frames(), "window decoded to silence");
        return false;
    }

    let display_text = ctx.assembler.feed(&result);
    let seq = ctx.seq.fetch_add(1, Ordering::Relaxed);
    let event = TranscriptEvent {
        seq,
        text: result.text.clone(),
        tokens: result.tokens,
        stable_text: ctx.assembler.stable_text().to_string(),
        pending_text: ctx.assembler.pending_text(),
    };

    let emit_result = ctx.transcript_tx.send(event);
    ctx.diagnostics.events_emitted.fetch_add(1, Ordering::Relaxed);
    info!(
        seq,
        samples = window.len(),
        text = %result.text,
        display = %display_text,
        emit_success = emit_result.is_ok(),
        "transcript window emitted"
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::{Duration, Instant};

    use tokio::sync::broadcast::error::TryRecvError;

    use crate::acoustic::{AcousticEngine, FrameLogitMatrix};
    use crate::buffering::{create_pcm_ring, Producer};
    use crate::error::{GuardlineError, Result};
    use crate::vocab::Vocabulary;

    /// Vocabulary used across pipeline tests: blank 0, "a"=1, "b"=2, "|"=3.
    fn test_decoder() -> CtcDecoder {
        let vocab = Vocabulary::from_tokens(
            ["<pad>", "a", "b", "|", "<unk>"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .unwrap();
        CtcDecoder::new(std::sync::Arc::new(vocab))
    }

    /// Scripted engine that records every call and can fail on demand.
    struct TestEngine {
        calls: Arc<AtomicUsize>,
        picks: Vec<Vec<usize>>,
        fail_first: bool,
    }

    impl AcousticEngine for TestEngine {
        fn infer(&mut self, _window: &AudioWindow) -> Result<FrameLogitMatrix> {
            let call = self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail_first && call == 0 {
                return Err(GuardlineError::EngineRuntime(
                    "intentional test failure".into(),
                ));
            }
            let picks = self
                .picks
                .get(call.min(self.picks.len().saturating_sub(1)))
                .cloned()
                .unwrap_or_default();
            let mut logits = ndarray::Array2::<f32>::zeros((picks.len(), 5));
            for (frame, &pick) in picks.iter().enumerate() {
                logits[[frame, pick]] = 1.0;
            }
            Ok(FrameLogitMatrix::new(logits))
        }

        fn close(&mut self) {}
    }

    fn base_config() -> EngineConfig {
        EngineConfig {
            sample_rate: 16_000,
            min_window_samples: 960,
            max_window_samples: 4_000,
            overlap_samples: 320,
        }
    }

    fn context(
        engine: EngineHandle,
        consumer: PcmConsumer,
        transcript_tx: broadcast::Sender<TranscriptEvent>,
        running: Arc<AtomicBool>,
    ) -> PipelineContext {
        let (status_tx, _) = broadcast::channel(8);
        let decoder = test_decoder();
        PipelineContext {
            config: base_config(),
            engine,
            decoder: decoder.clone(),
            assembler: StreamingTranscriptAssembler::new(decoder),
            consumer,
            running,
            transcript_tx,
            status_tx,
            status: Arc::new(Mutex::new(EngineStatus::Idle)),
            seq: Arc::new(AtomicU64::new(0)),
            diagnostics: Arc::new(PipelineDiagnostics::default()),
        }
    }

    fn recv_event_with_timeout(
        rx: &mut broadcast::Receiver<TranscriptEvent>,
        timeout: Duration,
    ) -> TranscriptEvent {
        let start = Instant::now();
        loop {
            match rx.try_recv() {
                Ok(ev) => return ev,
                Err(TryRecvError::Empty) => {
                    if start.elapsed() >= timeout {
                        panic!("timed out waiting for transcript event");
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Closed) => panic!("transcript channel closed unexpectedly"),
            }
        }
    }

    fn assert_no_event_for(rx: &mut broadcast::Receiver<TranscriptEvent>, timeout: Duration) {
        let start = Instant::now();
        loop {
            match rx.try_recv() {
                Ok(ev) => panic!("expected no event, got seq={}", ev.seq),
                Err(TryRecvError::Empty) => {
                    if start.elapsed() >= timeout {
                        return;
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Closed) => return,
            }
        }
    }

    #[test]
    fn emits_transcript_once_window_gate_clears() {
        let (mut producer, consumer) = create_pcm_ring();
        producer.push_slice(&vec![100i16; 960]);

        let calls = Arc::new(AtomicUsize::new(0));
        let engine = EngineHandle::new(TestEngine {
            calls: Arc::clone(&calls),
            picks: vec![vec![1, 1, 3, 2]],
            fail_first: false,
        });

        let (transcript_tx, mut transcript_rx) = broadcast::channel(16);
        let running = Arc::new(AtomicBool::new(true));
        let ctx = context(engine, consumer, transcript_tx, Arc::clone(&running));

        let handle = thread::spawn(move || run(ctx));
        let event = recv_event_with_timeout(&mut transcript_rx, Duration::from_secs(1));
        running.store(false, Ordering::SeqCst);
        handle.join().expect("pipeline thread panicked");

        assert_eq!(event.seq, 0);
        assert_eq!(event.text, "a b");
        assert_eq!(event.tokens, vec![1, 3, 2]);
        assert_eq!(event.pending_text, "a b");
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn sub_minimum_audio_never_reaches_engine() {
        let (mut producer, consumer) = create_pcm_ring();
        // 959 samples: one short of the gate.
        producer.push_slice(&vec![100i16; 959]);

        let calls = Arc::new(AtomicUsize::new(0));
        let engine = EngineHandle::new(TestEngine {
            calls: Arc::clone(&calls),
            picks: vec![vec![1]],
            fail_first: false,
        });

        let (transcript_tx, mut transcript_rx) = broadcast::channel(16);
        let running = Arc::new(AtomicBool::new(true));
        let ctx = context(engine, consumer, transcript_tx, Arc::clone(&running));

        let handle = thread::spawn(move || run(ctx));
        assert_no_event_for(&mut transcript_rx, Duration::from_millis(100));
        running.store(false, Ordering::SeqCst);
        handle.join().expect("pipeline thread panicked");

        assert_eq!(calls.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn failed_window_is_skipped_and_session_continues() {
        let (mut producer, consumer) = create_pcm_ring();
        // Two full windows' worth of audio.
        producer.push_slice(&vec![100i16; 960 * 2]);

        let calls = Arc::new(AtomicUsize::new(0));
        let engine = EngineHandle::new(TestEngine {
            calls: Arc::clone(&calls),
            picks: vec![vec![1, 3, 2], vec![1, 3, 2]],
            fail_first: true,
        });

        let (transcript_tx, mut transcript_rx) = broadcast::channel(16);
        let running = Arc::new(AtomicBool::new(true));
        let ctx = context(engine, consumer, transcript_tx, Arc::clone(&running));
        let diagnostics = Arc::clone(&ctx.diagnostics);

        let handle = thread::spawn(move || run(ctx));
        let event = recv_event_with_timeout(&mut transcript_rx, Duration::from_secs(1));
        running.store(false, Ordering::SeqCst);
        handle.join().expect("pipeline thread panicked");

        // The first window failed; the second still produced clean output.
        assert_eq!(event.text, "a b");
        assert_eq!(diagnostics.snapshot().inference_errors, 1);
        assert!(calls.load(Ordering::Relaxed) >= 2);
    }

    #[test]
    fn stop_flushes_gated_remainder() {
        let (mut producer, consumer) = create_pcm_ring();

        let calls = Arc::new(AtomicUsize::new(0));
        let engine = EngineHandle::new(TestEngine {
            calls: Arc::clone(&calls),
            picks: vec![vec![1, 1, 0, 2]],
            fail_first: false,
        });

        let (transcript_tx, mut transcript_rx) = broadcast::channel(16);
        let running = Arc::new(AtomicBool::new(false));
        let ctx = context(engine, consumer, transcript_tx, Arc::clone(&running));
        // Audio arrives after the running flag is already cleared; only
        // the stop path can flush it.
        producer.push_slice(&vec![100i16; 1200]);

        // running is already false: run() goes straight to the stop drain.
        run(ctx);
        let event = recv_event_with_timeout(&mut transcript_rx, Duration::from_millis(100));
        assert_eq!(event.text, "ab");
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn silent_windows_emit_no_events() {
        let (mut producer, consumer) = create_pcm_ring();
        producer.push_slice(&vec![0i16; 960]);

        let calls = Arc::new(AtomicUsize::new(0));
        // All-blank picks decode to an empty token sequence.
        let engine = EngineHandle::new(TestEngine {
            calls: Arc::clone(&calls),
            picks: vec![vec![0, 0, 0]],
            fail_first: false,
        });

        let (transcript_tx, mut transcript_rx) = broadcast::channel(16);
        let running = Arc::new(AtomicBool::new(true));
        let ctx = context(engine, consumer, transcript_tx, Arc::clone(&running));
        let diagnostics = Arc::clone(&ctx.diagnostics);

        let handle = thread::spawn(move || run(ctx));
        assert_no_event_for(&mut transcript_rx, Duration::from_millis(100));
        running.store(false, Ordering::SeqCst);
        handle.join().expect("pipeline thread panicked");

        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(diagnostics.snapshot().empty_windows, 1);
    }
}
