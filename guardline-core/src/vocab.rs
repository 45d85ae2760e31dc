//! Token vocabulary for the CTC acoustic model.
//!
//! The on-disk format is a JSON object mapping token text to its integer
//! class index (the same table the model was trained against). In memory
//! the table is a dense `Vec<String>` ordered by index — indices must
//! cover `0..N-1` with no gaps or duplicates, else loading fails.
//!
//! Index conventions (fixed at training time):
//! - `<pad>` is the CTC blank class,
//! - `|` marks a word boundary,
//! - `<unk>` is the unknown/garbage class.

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::error::{GuardlineError, Result};

/// CTC blank / padding class.
pub const BLANK_TOKEN: &str = "<pad>";
/// Word boundary marker, rendered as a space during detokenization.
pub const WORD_BOUNDARY_TOKEN: &str = "|";
/// Unknown class, dropped during detokenization.
pub const UNKNOWN_TOKEN: &str = "<unk>";

/// Dense, immutable token table. Loaded once per session.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    tokens: Vec<String>,
    blank_id: usize,
}

impl Vocabulary {
    /// Build a vocabulary from an ordered token list (index = position).
    ///
    /// # Errors
    /// Fails if the list is empty or does not contain the blank token.
    pub fn from_tokens(tokens: Vec<String>) -> Result<Self> {
        if tokens.is_empty() {
            return Err(GuardlineError::Vocabulary("empty token table".into()));
        }
        let blank_id = tokens
            .iter()
            .position(|t| t == BLANK_TOKEN)
            .ok_or_else(|| {
                GuardlineError::Vocabulary(format!("blank token {BLANK_TOKEN:?} missing"))
            })?;
        Ok(Self { tokens, blank_id })
    }

    /// Load a vocabulary from a JSON token→index map.
    ///
    /// # Errors
    /// Fails if the file is unreadable, not a JSON object of integers, or
    /// the indices are not exactly `0..N-1`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let map: HashMap<String, usize> = serde_json::from_str(&raw)
            .map_err(|e| GuardlineError::Vocabulary(format!("parse {path:?}: {e}")))?;

        let mut tokens: Vec<Option<String>> = vec![None; map.len()];
        for (token, idx) in map {
            let slot = tokens.get_mut(idx).ok_or_else(|| {
                GuardlineError::Vocabulary(format!(
                    "token {token:?} has out-of-range index {idx}"
                ))
            })?;
            if let Some(prev) = slot.replace(token) {
                return Err(GuardlineError::Vocabulary(format!(
                    "duplicate index {idx} (token {prev:?})"
                )));
            }
        }
        // Every slot filled means indices were exactly 0..N-1.
        let tokens: Vec<String> = tokens
            .into_iter()
            .enumerate()
            .map(|(idx, t)| {
                t.ok_or_else(|| GuardlineError::Vocabulary(format!("missing index {idx}")))
            })
            .collect::<Result<_>>()?;

        let vocab = Self::from_tokens(tokens)?;
        info!(
            path = %path.display(),
            size = vocab.len(),
            blank_id = vocab.blank_id,
            "vocabulary loaded"
        );
        Ok(vocab)
    }

    /// Number of token classes (the model's output width).
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Index of the CTC blank class.
    pub fn blank_id(&self) -> usize {
        self.blank_id
    }

    /// Token text for `id`, or `None` if out of range.
    pub fn token(&self, id: usize) -> Option<&str> {
        self.tokens.get(id).map(String::as_str)
    }
}
