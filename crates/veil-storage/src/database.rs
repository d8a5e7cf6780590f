//! High-level database interface.

use std::path::PathBuf;

use directories::ProjectDirs;
use tracing::info;

use veil_core::store::{KeyValueStore, StoreError};

use crate::error::{Result, StorageError};
use crate::models::{ConfigEntry, EventTotals, NewRedactionEvent, RedactionEvent};
use crate::pool::ConnectionPool;
use crate::repository::{ConfigRepo, EventsRepo};

/// High-level database interface for Veil.
#[derive(Clone)]
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    /// Open the database in the default app data directory.
    pub fn new() -> Result<Self> {
        let path = Self::default_db_path()?;
        Self::with_path(path)
    }

    /// Open the database at a specific path.
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening database at: {:?}", path);
        let pool = ConnectionPool::open(&path)?;

        Ok(Self { pool })
    }

    /// Open an in-memory database (for testing and ephemeral sessions).
    pub fn in_memory() -> Result<Self> {
        let pool = ConnectionPool::in_memory()?;
        Ok(Self { pool })
    }

    /// The default database path.
    pub fn default_db_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "veil", "veil")
            .ok_or_else(|| StorageError::Config("could not determine app data directory".into()))?;

        Ok(proj_dirs.data_dir().join("veil.db"))
    }

    // === Configuration ===

    /// Get a configuration value.
    pub fn get_config(&self, key: &str) -> Result<Option<ConfigEntry>> {
        let conn = self.pool.get()?;
        ConfigRepo::get(&conn, key)
    }

    /// Set a configuration value.
    pub fn set_config(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.pool.get()?;
        ConfigRepo::set(&conn, key, value)
    }

    /// Delete a configuration value.
    pub fn delete_config(&self, key: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        ConfigRepo::delete(&conn, key)
    }

    /// Get all configuration values.
    pub fn all_config(&self) -> Result<Vec<ConfigEntry>> {
        let conn = self.pool.get()?;
        ConfigRepo::get_all(&conn)
    }

    // === Redaction events ===

    /// Record a redaction event.
    pub fn record_redaction(&self, event: NewRedactionEvent) -> Result<i64> {
        let conn = self.pool.get()?;
        EventsRepo::insert(&conn, event)
    }

    /// Most recent redaction events.
    pub fn recent_redactions(&self, limit: i64) -> Result<Vec<RedactionEvent>> {
        let conn = self.pool.get()?;
        EventsRepo::recent(&conn, limit)
    }

    /// Per-kind redaction totals.
    pub fn redaction_totals(&self) -> Result<EventTotals> {
        let conn = self.pool.get()?;
        EventsRepo::totals(&conn)
    }
}

/// The core reads and writes its configuration and counters through this
/// seam; failures are reported as backend errors and the core degrades.
impl KeyValueStore for Database {
    fn get(&self, key: &str) -> std::result::Result<Option<serde_json::Value>, StoreError> {
        self.get_config(key)
            .map(|entry| entry.map(|e| e.value))
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn set(&self, key: &str, value: serde_json::Value) -> std::result::Result<(), StoreError> {
        self.set_config(key, &value)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}
