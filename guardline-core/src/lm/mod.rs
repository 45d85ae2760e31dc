//! Statistical n-gram language model with recursive backoff scoring.
//!
//! Loaded once from an ARPA file and read-only afterwards, so scoring is
//! safe to run concurrently from any number of decode workers without
//! locking. This is a standalone scoring capability — the greedy CTC
//! decode path does not consume it; callers adding rescoring or beam
//! logic combine it themselves (see `score_ln` for natural-log fusion
//! with acoustic scores).

pub mod arpa;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::info;

use crate::error::Result;

use arpa::NGramTable;

/// Fixed log10 penalty for a word absent at every order.
pub const UNKNOWN_WORD_LOG10: f64 = -10.0;

/// An immutable ARPA-backed n-gram model.
#[derive(Debug)]
pub struct LanguageModel {
    table: NGramTable,
}

impl LanguageModel {
    /// Load a model from a plain-text ARPA file.
    ///
    /// A fully unparsable file still loads — every query then degrades to
    /// [`UNKNOWN_WORD_LOG10`].
    ///
    /// # Errors
    /// Only I/O failures abort; malformed lines are skipped.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let table = arpa::parse(BufReader::new(File::open(path)?))?;
        info!(
            path = %path.display(),
            max_order = table.max_order,
            "language model loaded"
        );
        Ok(Self { table })
    }

    /// Build a model from an already-parsed table (tests, tooling).
    pub fn from_table(table: NGramTable) -> Self {
        Self { table }
    }

    /// Largest n-gram order in the table.
    pub fn max_order(&self) -> usize {
        self.table.max_order
    }

    /// Log10 probability of `word` following `context`, with recursive
    /// backoff: a missing n-gram falls back to the `(n-1)`-gram score plus
    /// the context's backoff weight (0.0 when absent), down to the unigram
    /// table; a missing unigram scores [`UNKNOWN_WORD_LOG10`].
    pub fn score(&self, context: &[&str], word: &str) -> f64 {
        if self.table.max_order == 0 {
            return UNKNOWN_WORD_LOG10;
        }
        let order = (context.len() + 1).min(self.table.max_order);
        // Only the last order-1 context words participate.
        let context = &context[context.len() - (order - 1)..];
        self.score_backoff(context, word)
    }

    /// `score` converted to natural log, for fusion with acoustic scores.
    pub fn score_ln(&self, context: &[&str], word: &str) -> f64 {
        self.score(context, word) * std::f64::consts::LN_10
    }

    fn score_backoff(&self, context: &[&str], word: &str) -> f64 {
        let order = context.len() + 1;

        let mut key = String::with_capacity(word.len() + context.iter().map(|w| w.len() + 1).sum::<usize>());
        for w in context {
            key.push_str(w);
            key.push(' ');
        }
        key.push_str(word);

        if let Some(&prob) = self.table.probs[order - 1].get(&key) {
            return prob;
        }
        if order == 1 {
            return UNKNOWN_WORD_LOG10;
        }

        let backoff = self.table.backoffs[context.len() - 1]
            .get(&context.join(" "))
            .copied()
            .unwrap_or(0.0);
        backoff + self.score_backoff(&context[1..], word)
    }
}
