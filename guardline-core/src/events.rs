//! Event types broadcast to downstream consumers.
//!
//! `TranscriptEvent` carries both the per-window decode output (text +
//! token ids, for the scam-analysis consumer) and the assembled
//! stable/pending view (for a UI state holder).

use serde::{Deserialize, Serialize};

/// Emitted once per successfully decoded audio window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// This window's decoded text.
    pub text: String,
    /// This window's collapsed token ids (overlap-aware consumers).
    pub tokens: Vec<usize>,
    /// Finalized transcript so far. Never retracted within a session.
    pub stable_text: String,
    /// Tentative transcript tail. May be revised by the next window.
    pub pending_text: String,
}

/// Emitted when the engine state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatusEvent {
    pub status: EngineStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current state of the listener engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Engine created but `start()` not yet called.
    Idle,
    /// Actively consuming audio and transcribing.
    Listening,
    /// Session stopped; engine may be restarted.
    Stopped,
    /// Unrecoverable error — restart required.
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_event_serializes_with_camel_case() {
        let event = TranscriptEvent {
            seq: 4,
            text: "hello there".into(),
            tokens: vec![3, 7, 1],
            stable_text: "hello".into(),
            pending_text: "there".into(),
        };

        let json = serde_json::to_value(&event).expect("serialize transcript event");
        assert_eq!(json["seq"], 4);
        assert_eq!(json["text"], "hello there");
        assert_eq!(json["tokens"][1], 7);
        assert_eq!(json["stableText"], "hello");
        assert_eq!(json["pendingText"], "there");

        let round_trip: TranscriptEvent =
            serde_json::from_value(json).expect("deserialize transcript event");
        assert_eq!(round_trip.tokens, vec![3, 7, 1]);
    }

    #[test]
    fn engine_status_serializes_lowercase() {
        let event = EngineStatusEvent {
            status: EngineStatus::Listening,
            detail: None,
        };
        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["status"], "listening");

        let err = serde_json::from_str::<EngineStatus>(r#""Listening""#);
        assert!(err.is_err(), "expected invalid casing to fail");
    }
}
