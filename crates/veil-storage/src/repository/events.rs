//! Redaction event log repository.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};

use veil_core::unit::ContentKind;

use crate::error::Result;
use crate::models::{EventTotals, NewRedactionEvent, RedactionEvent};

/// Maximum preview length in characters.
const PREVIEW_LEN: usize = 80;

/// SHA-256 hex digest of content, used instead of storing the content.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Short, newline-free preview of content for the event views.
pub fn create_preview(content: &str) -> String {
    let flat: String = content
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if flat.chars().count() <= PREVIEW_LEN {
        flat
    } else {
        let truncated: String = flat.chars().take(PREVIEW_LEN).collect();
        format!("{truncated}…")
    }
}

/// Repository for the redaction event log.
pub struct EventsRepo;

impl EventsRepo {
    /// Insert a redaction event, returning its id.
    pub fn insert(conn: &Connection, event: NewRedactionEvent) -> Result<i64> {
        conn.execute(
            "INSERT INTO redaction_events (content_hash, preview, kind, label, score, occurrences)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                hash_content(&event.content),
                create_preview(&event.content),
                event.kind.as_str(),
                event.label,
                event.score,
                event.occurrences,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Most recent events, newest first.
    pub fn recent(conn: &Connection, limit: i64) -> Result<Vec<RedactionEvent>> {
        let mut stmt = conn.prepare(
            "SELECT id, content_hash, preview, kind, label, score, occurrences, created_at
             FROM redaction_events ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;

        let events = stmt
            .query_map([limit], map_event)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(events)
    }

    /// Per-kind occurrence totals.
    pub fn totals(conn: &Connection) -> Result<EventTotals> {
        let mut stmt = conn.prepare(
            "SELECT kind, COALESCE(SUM(occurrences), 0)
             FROM redaction_events GROUP BY kind",
        )?;

        let mut totals = EventTotals::default();
        let rows = stmt.query_map([], |row| {
            let kind: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((kind, count))
        })?;
        for row in rows.filter_map(|r| r.ok()) {
            match row.0.as_str() {
                "image" => totals.image = row.1 as u64,
                _ => totals.text = row.1 as u64,
            }
        }

        Ok(totals)
    }
}

fn map_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<RedactionEvent> {
    let kind: String = row.get(3)?;
    let created_at: String = row.get(7)?;

    Ok(RedactionEvent {
        id: row.get(0)?,
        content_hash: row.get(1)?,
        preview: row.get(2)?,
        kind: match kind.as_str() {
            "image" => ContentKind::Image,
            _ => ContentKind::Text,
        },
        label: row.get(4)?,
        score: row.get(5)?,
        occurrences: row.get(6)?,
        created_at: DateTime::parse_from_rfc3339(&format!("{}Z", created_at.replace(' ', "T")))
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}
