//! Offline transcription utility: runs a WAV file through the same
//! windowing → inference → decode → assembly path the live pipeline uses.
//!
//! ```text
//! cargo run -p guardline-core --features onnx --bin transcribe_wav -- \
//!   --wav call.wav --vocab vocab.json --model acoustic.onnx [--lm call.arpa]
//! ```
//!
//! Without `--model` (or without the `onnx` feature) a blank-emitting
//! stub engine is used, which exercises the plumbing but produces an
//! empty transcript.

use std::path::PathBuf;
use std::sync::Arc;

use guardline_core::acoustic::stub::StubEngine;
use guardline_core::buffering::window::TARGET_SAMPLE_RATE;
use guardline_core::{
    AudioWindowBuffer, CtcDecoder, EngineConfig, EngineHandle, LanguageModel,
    StreamingTranscriptAssembler, Vocabulary,
};
use tracing::warn;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("transcribe_wav failed: {e}");
        std::process::exit(1);
    }
}

#[derive(Debug)]
struct Args {
    wav: PathBuf,
    vocab: PathBuf,
    model: Option<PathBuf>,
    lm: Option<PathBuf>,
}

fn parse_args() -> Result<Args, String> {
    let mut wav: Option<PathBuf> = None;
    let mut vocab: Option<PathBuf> = None;
    let mut model: Option<PathBuf> = None;
    let mut lm: Option<PathBuf> = None;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--wav" => wav = Some(PathBuf::from(it.next().ok_or("missing value for --wav")?)),
            "--vocab" => {
                vocab = Some(PathBuf::from(it.next().ok_or("missing value for --vocab")?))
            }
            "--model" => {
                model = Some(PathBuf::from(it.next().ok_or("missing value for --model")?))
            }
            "--lm" => lm = Some(PathBuf::from(it.next().ok_or("missing value for --lm")?)),
            "--help" | "-h" => {
                println!(
                    "Usage: transcribe_wav --wav <file.wav> --vocab <vocab.json> \\
  [--model <acoustic.onnx>] [--lm <model.arpa>]"
                );
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }

    Ok(Args {
        wav: wav.ok_or("--wav is required")?,
        vocab: vocab.ok_or("--vocab is required")?,
        model,
        lm,
    })
}

fn read_pcm16(path: &PathBuf) -> Result<Vec<i16>, String> {
    let mut reader = hound::WavReader::open(path).map_err(|e| e.to_string())?;
    let spec = reader.spec();
    if spec.channels != 1 {
        return Err(format!("expected mono audio, got {} channels", spec.channels));
    }
    if spec.sample_rate != TARGET_SAMPLE_RATE {
        warn!(
            rate = spec.sample_rate,
            "WAV is not 16 kHz; transcription quality will suffer"
        );
    }
    match spec.sample_format {
        hound::SampleFormat::Int => reader
            .samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string()),
        hound::SampleFormat::Float => Ok(reader
            .samples::<f32>()
            .filter_map(|s| s.ok())
            .map(|s| (s.clamp(-1.0, 1.0) * 32_767.0) as i16)
            .collect()),
    }
}

fn build_engine(model: Option<&PathBuf>, vocab_size: usize) -> Result<EngineHandle, String> {
    match model {
        #[cfg(feature = "onnx")]
        Some(path) => {
            let engine =
                guardline_core::OnnxEngine::load(path, vocab_size).map_err(|e| e.to_string())?;
            Ok(EngineHandle::new(engine))
        }
        #[cfg(not(feature = "onnx"))]
        Some(_) => Err("--model requires the 'onnx' feature".into()),
        None => {
            warn!("no --model given; using blank-emitting stub engine");
            Ok(EngineHandle::new(StubEngine::new(vocab_size, 0)))
        }
    }
}

fn run() -> Result<(), String> {
    let args = parse_args()?;

    let vocab = Arc::new(Vocabulary::load(&args.vocab).map_err(|e| e.to_string())?);
    let decoder = CtcDecoder::new(Arc::clone(&vocab));
    let engine = build_engine(args.model.as_ref(), vocab.len())?;

    let samples = read_pcm16(&args.wav)?;
    let config = EngineConfig::default();
    let mut window_buf = AudioWindowBuffer::new(
        config.min_window_samples,
        config.max_window_samples,
        config.overlap_samples,
        config.sample_rate,
    )
    .map_err(|e| e.to_string())?;
    let mut assembler = StreamingTranscriptAssembler::new(decoder.clone());

    window_buf.push(&samples);
    let mut windows: Vec<_> = Vec::new();
    while let Some(window) = window_buf.take_window() {
        windows.push(window);
    }
    if !window_buf.is_empty() {
        // Below the minimum gate; the window contract keeps it away from
        // the engine.
        warn!(
            samples = window_buf.len(),
            "discarding sub-minimum audio tail"
        );
    }

    for window in &windows {
        let logits = match engine.0.lock().infer(window) {
            Ok(l) => l,
            Err(e) => {
                warn!(error = %e, "window inference failed — skipping window");
                continue;
            }
        };
        let result = decoder.decode(&logits);
        if !result.tokens.is_empty() {
            assembler.feed(&result);
        }
    }

    let transcript = assembler.display_text();
    println!("{transcript}");

    if let Some(lm_path) = args.lm {
        let lm = LanguageModel::load(&lm_path).map_err(|e| e.to_string())?;
        let words: Vec<&str> = transcript.split_whitespace().collect();
        let total: f64 = words
            .iter()
            .enumerate()
            .map(|(i, w)| lm.score(&words[..i], w))
            .sum();
        println!("lm log10 score: {total:.3} over {} words", words.len());
    }

    engine.close();
    Ok(())
}
