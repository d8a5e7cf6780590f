//! Storage data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use veil_core::unit::ContentKind;

/// A configuration entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Configuration key.
    pub key: String,
    /// Stored JSON value.
    pub value: serde_json::Value,
}

/// A recorded redaction, privacy-preserving: the content itself is never
/// stored, only its hash and a short preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionEvent {
    /// Row id.
    pub id: i64,
    /// SHA-256 of the redacted content.
    pub content_hash: String,
    /// Truncated, newline-free preview.
    pub preview: String,
    /// Content kind that was redacted.
    pub kind: ContentKind,
    /// Winning classification label.
    pub label: String,
    /// Its score.
    pub score: f32,
    /// How many occurrences were treated.
    pub occurrences: u32,
    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
}

/// Input for recording a redaction event.
#[derive(Debug, Clone)]
pub struct NewRedactionEvent {
    /// The redacted content (hashed and previewed, not stored).
    pub content: String,
    /// Content kind.
    pub kind: ContentKind,
    /// Winning classification label.
    pub label: String,
    /// Its score.
    pub score: f32,
    /// How many occurrences were treated.
    pub occurrences: u32,
}

/// Per-kind event totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTotals {
    /// Recorded text redactions.
    pub text: u64,
    /// Recorded image redactions.
    pub image: u64,
}

impl EventTotals {
    /// Combined total.
    pub fn total(&self) -> u64 {
        self.text + self.image
    }
}
