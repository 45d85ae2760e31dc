//! Cross-window transcript assembly.
//!
//! Successive audio windows overlap in time, so their decode outputs
//! share a run of tokens at the boundary. The assembler trims that
//! duplicated overlap and maintains two tiers of text per session:
//! `stable` (finalized, never retracted) and `pending` (tentative, may
//! still be revised while the audio it came from is inside the current
//! window).

use crate::decoder::CtcDecoder;

/// One window's decode output. Token ids are retained specifically so
/// the assembler can trim overlap between consecutive windows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TranscriptionResult {
    pub text: String,
    pub tokens: Vec<usize>,
}

impl TranscriptionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.text.is_empty()
    }
}

/// Per-session stable/pending transcript state.
///
/// A failed window simply never reaches `feed`, so errors cannot corrupt
/// assembler state.
#[derive(Debug)]
pub struct StreamingTranscriptAssembler {
    decoder: CtcDecoder,
    stable_text: String,
    pending_tokens: Vec<usize>,
}

impl StreamingTranscriptAssembler {
    pub fn new(decoder: CtcDecoder) -> Self {
        Self {
            decoder,
            stable_text: String::new(),
            pending_tokens: Vec::new(),
        }
    }

    /// Clear all state for a new listening session.
    pub fn reset(&mut self) {
        self.stable_text.clear();
        self.pending_tokens.clear();
    }

    /// Merge one window's decode output, returning the display text
    /// (`stable + " " + pending`, trimmed).
    ///
    /// The longest run where the pending tail equals the new tokens' head
    /// is the boundary overlap. Pending tokens before that overlap are no
    /// longer visible to the sliding window, cannot be revised, and are
    /// promoted into stable text; the new window's tokens become the
    /// pending tail. Feeding the identical result twice is a no-op.
    pub fn feed(&mut self, result: &TranscriptionResult) -> String {
        if result.tokens.is_empty() {
            return self.display_text();
        }

        let overlap = longest_overlap(&self.pending_tokens, &result.tokens);
        let confirmed = &self.pending_tokens[..self.pending_tokens.len() - overlap];
        if !confirmed.is_empty() {
            let text = self.decoder.tokens_to_text(confirmed);
            self.push_stable(&text);
        }
        self.pending_tokens = result.tokens.clone();
        self.display_text()
    }

    /// Finalized text. Never retracted within a session.
    pub fn stable_text(&self) -> &str {
        &self.stable_text
    }

    /// Tentative text decoded from the current pending tokens.
    pub fn pending_text(&self) -> String {
        self.decoder.tokens_to_text(&self.pending_tokens)
    }

    /// `stable + " " + pending`, trimmed.
    pub fn display_text(&self) -> String {
        let pending = self.pending_text();
        match (self.stable_text.is_empty(), pending.is_empty()) {
            (true, _) => pending,
            (false, true) => self.stable_text.clone(),
            (false, false) => format!("{} {}", self.stable_text, pending),
        }
    }

    fn push_stable(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if !self.stable_text.is_empty() {
            self.stable_text.push(' ');
        }
        self.stable_text.push_str(text);
    }
}

/// Longest `k` such that the last `k` elements of `prev` equal the first
/// `k` elements of `next`.
fn longest_overlap(prev: &[usize], next: &[usize]) -> usize {
    let max = prev.len().min(next.len());
    (1..=max)
        .rev()
        .find(|&k| prev[prev.len() - k..] == next[..k])
        .unwrap_or(0)
}
