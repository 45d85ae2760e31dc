//! Greedy CTC decoding: per-frame argmax with blank suppression and
//! repeat collapsing, then detokenization through the vocabulary.
//!
//! Decoding is pure — no state survives between calls — so one decoder
//! may serve any number of windows or streams concurrently.

use std::sync::Arc;

use crate::acoustic::FrameLogitMatrix;
use crate::transcript::TranscriptionResult;
use crate::vocab::{Vocabulary, UNKNOWN_TOKEN, WORD_BOUNDARY_TOKEN};

/// Greedy CTC decoder bound to a vocabulary.
#[derive(Debug, Clone)]
pub struct CtcDecoder {
    vocab: Arc<Vocabulary>,
}

impl CtcDecoder {
    pub fn new(vocab: Arc<Vocabulary>) -> Self {
        Self { vocab }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Decode a logit matrix into a collapsed token-id sequence.
    ///
    /// Per frame: pick the highest-scoring class (ties break to the lowest
    /// index), then drop it if it is the blank class or repeats the
    /// previous frame's pick. Blanks still update "previous", so a blank
    /// frame separates two genuine occurrences of the same symbol.
    pub fn greedy_decode(&self, logits: &FrameLogitMatrix) -> Vec<usize> {
        let blank = self.vocab.blank_id();
        let mut out = Vec::new();
        let mut prev: Option<usize> = None;

        for frame in logits.rows() {
            let mut best = 0usize;
            let mut best_score = f32::NEG_INFINITY;
            for (idx, &score) in frame.iter().enumerate() {
                if score > best_score {
                    best = idx;
                    best_score = score;
                }
            }
            if best != blank && prev != Some(best) {
                out.push(best);
            }
            prev = Some(best);
        }
        out
    }

    /// Render a collapsed token-id sequence as text.
    ///
    /// Blank/pad and unknown ids contribute nothing (no placeholder);
    /// out-of-range ids are skipped; the word-boundary token becomes a
    /// single space; everything else concatenates with no separator —
    /// sub-word joining is the vocabulary's concern, not the decoder's.
    pub fn tokens_to_text(&self, tokens: &[usize]) -> String {
        let mut text = String::new();
        for &id in tokens {
            let Some(token) = self.vocab.token(id) else {
                continue;
            };
            if id == self.vocab.blank_id() || token == UNKNOWN_TOKEN {
                continue;
            }
            if token == WORD_BOUNDARY_TOKEN {
                text.push(' ');
            } else {
                text.push_str(token);
            }
        }
        // Collapse whitespace runs and trim.
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Convenience: decode and detokenize one window's logits.
    pub fn decode(&self, logits: &FrameLogitMatrix) -> TranscriptionResult {
        let tokens = self.greedy_decode(logits);
        let text = self.tokens_to_text(&tokens);
        TranscriptionResult { text, tokens }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn decoder() -> CtcDecoder {
        let vocab = Vocabulary::from_tokens(
            ["<pad>", "a", "b", "|", "<unk>"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .unwrap();
        CtcDecoder::new(Arc::new(vocab))
    }

    /// Logits whose per-frame argmax follows `picks` exactly.
    fn logits_for(picks: &[usize], vocab: usize) -> FrameLogitMatrix {
        let mut m = Array2::<f32>::zeros((picks.len(), vocab));
        for (frame, &pick) in picks.iter().enumerate() {
            m[[frame, pick]] = 1.0;
        }
        FrameLogitMatrix::new(m)
    }

    #[test]
    fn collapse_law() {
        // Wider synthetic vocab: ids 5 and 2 with id 0 as blank.
        let vocab = Vocabulary::from_tokens(
            ["<pad>", "a", "b", "|", "<unk>", "c"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .unwrap();
        let d = CtcDecoder::new(Arc::new(vocab));
        let logits = logits_for(&[5, 5, 5, 2, 2, 0], 6);
        assert_eq!(d.greedy_decode(&logits), vec![5, 2]);
    }

    #[test]
    fn concrete_decode_scenario() {
        let d = decoder();
        let logits = logits_for(&[0, 1, 1, 3, 2, 0], 5);
        let tokens = d.greedy_decode(&logits);
        assert_eq!(tokens, vec![1, 3, 2]);
        assert_eq!(d.tokens_to_text(&tokens), "a b");
    }

    #[test]
    fn blank_separates_repeats() {
        let d = decoder();
        // a, blank, a must decode as two occurrences of "a".
        let logits = logits_for(&[1, 0, 1], 5);
        assert_eq!(d.greedy_decode(&logits), vec![1, 1]);
    }

    #[test]
    fn all_blank_frames_yield_empty_text() {
        let d = decoder();
        let logits = logits_for(&[0, 0, 0, 0], 5);
        let tokens = d.greedy_decode(&logits);
        assert!(tokens.is_empty());
        assert_eq!(d.tokens_to_text(&tokens), "");
    }

    #[test]
    fn empty_matrix_yields_empty_output() {
        let d = decoder();
        let logits = FrameLogitMatrix::new(Array2::<f32>::zeros((0, 5)));
        assert!(d.greedy_decode(&logits).is_empty());
        assert_eq!(d.decode(&logits).text, "");
    }

    #[test]
    fn ties_break_to_lowest_index() {
        let d = decoder();
        // Frame of identical scores: index 0 (blank) wins, nothing emitted.
        let logits = FrameLogitMatrix::new(Array2::<f32>::ones((1, 5)));
        assert!(d.greedy_decode(&logits).is_empty());
    }

    #[test]
    fn detokenize_skips_unknown_and_out_of_range_ids() {
        let d = decoder();
        assert_eq!(d.tokens_to_text(&[1, 4, 2, 99, 3, 1]), "ab a");
    }

    #[test]
    fn whitespace_runs_collapse() {
        let d = decoder();
        // Consecutive word-boundary tokens render as one space.
        assert_eq!(d.tokens_to_text(&[3, 1, 3, 3, 2, 3]), "a b");
    }

    #[test]
    fn greedy_decode_is_deterministic() {
        let d = decoder();
        let logits = logits_for(&[1, 2, 0, 1, 3], 5);
        assert_eq!(d.greedy_decode(&logits), d.greedy_decode(&logits));
    }
}
