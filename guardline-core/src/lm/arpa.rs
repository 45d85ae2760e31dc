//! Tolerant parser for plain-text ARPA n-gram files.
//!
//! Recognised structure:
//!
//! ```text
//! \data\
//! ngram 1=4
//! ngram 2=3
//!
//! \1-grams:
//! -1.23<TAB>hello<TAB>-0.40
//! \2-grams:
//! -0.51<TAB>hello world
//! \end\
//! ```
//!
//! Each data line has at least two tab-separated fields — log10
//! probability and the space-joined n-gram — plus an optional backoff
//! weight, meaningful only below the maximum order. Malformed lines are
//! skipped with a warning; parsing continues.

use std::collections::HashMap;
use std::io::BufRead;

use tracing::{debug, warn};

use crate::error::{GuardlineError, Result};

/// Immutable two-level n-gram table: order → (joined key → value).
/// Built once by [`parse`] and never mutated afterwards.
#[derive(Debug, Default)]
pub struct NGramTable {
    /// `probs[k - 1]` maps a space-joined k-gram to its log10 probability.
    pub probs: Vec<HashMap<String, f64>>,
    /// `backoffs[k - 1]` maps a k-word context to its backoff weight.
    /// Never populated at the maximum order.
    pub backoffs: Vec<HashMap<String, f64>>,
    /// Largest order section encountered. Zero for a fully unparsable file.
    pub max_order: usize,
}

impl NGramTable {
    fn ensure_order(&mut self, order: usize) {
        while self.probs.len() < order {
            self.probs.push(HashMap::new());
            self.backoffs.push(HashMap::new());
        }
        self.max_order = self.max_order.max(order);
    }
}

/// Parse the `\k-grams:` section marker, returning `k`.
fn section_order(line: &str) -> Option<usize> {
    let rest = line.strip_prefix('\\')?;
    let rest = rest.strip_suffix("-grams:")?;
    rest.parse().ok()
}

/// Parse an ARPA stream into an [`NGramTable`].
///
/// Individual malformed lines are skipped; only I/O failures abort.
pub fn parse(reader: impl BufRead) -> Result<NGramTable> {
    let mut table = NGramTable::default();
    let mut current_order: Option<usize> = None;
    let mut skipped = 0usize;

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| {
            GuardlineError::LanguageModel(format!("read failure at line {}: {e}", lineno + 1))
        })?;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed == "\\data\\" || trimmed.starts_with("ngram ") {
            continue;
        }
        if trimmed == "\\end\\" {
            break;
        }
        if let Some(order) = section_order(trimmed) {
            table.ensure_order(order);
            current_order = Some(order);
            continue;
        }

        let Some(order) = current_order else {
            // Data-looking line outside any section — header junk, ignore.
            continue;
        };

        let mut fields = trimmed.split('\t');
        let (Some(prob_field), Some(ngram)) = (fields.next(), fields.next()) else {
            // Fewer than two fields: contractually ignored, not even a warning.
            continue;
        };
        let Ok(prob) = prob_field.trim().parse::<f64>() else {
            warn!(line = lineno + 1, field = prob_field, "unparsable log-prob, skipping line");
            skipped += 1;
            continue;
        };
        let ngram = ngram.trim();
        if ngram.is_empty() {
            skipped += 1;
            continue;
        }

        table.probs[order - 1].insert(ngram.to_string(), prob);

        if let Some(backoff_field) = fields.next() {
            match backoff_field.trim().parse::<f64>() {
                Ok(backoff) => {
                    table.backoffs[order - 1].insert(ngram.to_string(), backoff);
                }
                Err(_) => {
                    warn!(line = lineno + 1, field = backoff_field, "unparsable backoff weight, ignored");
                    skipped += 1;
                }
            }
        }
    }

    // Backoff weights only exist below the maximum order.
    if table.max_order > 0 {
        table.backoffs[table.max_order - 1].clear();
    }

    if skipped > 0 {
        warn!(skipped, "skipped malformed ARPA lines");
    }
    debug!(
        max_order = table.max_order,
        entries = table.probs.iter().map(HashMap::len).sum::<usize>(),
        "ARPA table parsed"
    );
    Ok(table)
}
