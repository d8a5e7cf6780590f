//! Storage collaborator seam.
//!
//! The core persists nothing itself: configuration and counters go through a
//! key-value collaborator. Reads tolerate missing keys and a failing backend
//! degrades to defaults rather than halting a scan.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::config::{FilterConfig, FILTER_CONFIG_KEY, REPLACEMENT_COUNT_KEY};

/// Errors surfaced by a storage collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not serve the request.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Minimal key-value surface the core requires from its storage
/// collaborator.
pub trait KeyValueStore: Send + Sync {
    /// Reads a value; `None` when the key was never written.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Writes a value.
    fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// Loads the filter configuration.
///
/// A missing key or a malformed value yields the defaults (filters disabled,
/// strictness 80); only a backend failure is an error.
pub fn load_filter_config(store: &dyn KeyValueStore) -> Result<FilterConfig> {
    Ok(store
        .get(FILTER_CONFIG_KEY)?
        .map(|value| serde_json::from_value(value).unwrap_or_default())
        .unwrap_or_default())
}

/// Loads the filter configuration, degrading to defaults on backend failure.
pub fn load_filter_config_or_default(store: &dyn KeyValueStore) -> FilterConfig {
    match load_filter_config(store) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "config read failed, treating filters as disabled");
            FilterConfig::default()
        }
    }
}

/// Persists the filter configuration.
pub fn save_filter_config(store: &dyn KeyValueStore, config: &FilterConfig) -> Result<()> {
    let value =
        serde_json::to_value(config).map_err(|e| StoreError::Backend(e.to_string()))?;
    store.set(FILTER_CONFIG_KEY, value)
}

/// Reads the session replacement counter (0 when never written).
pub fn replacement_count(store: &dyn KeyValueStore) -> Result<u64> {
    Ok(store
        .get(REPLACEMENT_COUNT_KEY)?
        .and_then(|value| value.as_u64())
        .unwrap_or(0))
}

/// Adds to the replacement counter and returns the new total.
///
/// The counter is monotonically non-decreasing within a session.
pub fn add_replacements(store: &dyn KeyValueStore, count: u64) -> Result<u64> {
    let current = replacement_count(store)?;
    if count == 0 {
        return Ok(current);
    }
    let total = current + count;
    store.set(REPLACEMENT_COUNT_KEY, Value::from(total))?;
    Ok(total)
}

/// Resets the replacement counter to zero.
pub fn reset_replacements(store: &dyn KeyValueStore) -> Result<()> {
    store.set(REPLACEMENT_COUNT_KEY, Value::from(0u64))
}

/// In-memory store for tests and storage-free embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }
}
