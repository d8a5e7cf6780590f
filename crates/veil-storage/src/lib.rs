//! Veil Storage - SQLite persistence layer.
//!
//! This crate backs the moderation core's storage collaborator with SQLite.
//! It handles:
//!
//! - Key-value configuration (filter config, replacement counters)
//! - Redaction event logging (privacy-preserving: stores hashes and
//!   previews, never the redacted content itself)
//! - Per-kind redaction totals for UI surfaces
//!
//! # Example
//!
//! ```no_run
//! use veil_core::store;
//! use veil_storage::Database;
//!
//! let db = Database::in_memory().unwrap();
//!
//! // The core reads its configuration through the KeyValueStore seam.
//! let config = store::load_filter_config(&db).unwrap();
//! assert!(!config.text_filter.is_enabled);
//! ```

mod database;
pub mod error;
pub mod models;
mod pool;
pub mod repository;
mod schema;

pub use database::Database;
pub use error::{Result, StorageError};
pub use models::{ConfigEntry, EventTotals, NewRedactionEvent, RedactionEvent};
pub use pool::ConnectionPool;
pub use repository::{create_preview, hash_content, ConfigRepo, EventsRepo};
