//! Fingerprint score cache.
//!
//! Maps content fingerprints to classification results for the lifetime of
//! the process. There is no eviction; growth is bounded only by the variety
//! of content seen in a session.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use crate::score::ClassificationResult;

/// Session-lifetime cache from fingerprint to classification result.
#[derive(Default)]
pub struct ScoreCache {
    entries: RwLock<HashMap<String, ClassificationResult>>,
}

impl ScoreCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached result for a fingerprint.
    pub fn get(&self, fingerprint: &str) -> Option<ClassificationResult> {
        self.entries.read().get(fingerprint).cloned()
    }

    /// True if the fingerprint has a result.
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.entries.read().contains_key(fingerprint)
    }

    /// Stores a result for a fingerprint.
    ///
    /// A fingerprint maps to at most one result: the first write wins and a
    /// second write is ignored. Returns whether the entry was stored.
    pub fn insert(&self, fingerprint: impl Into<String>, result: ClassificationResult) -> bool {
        let fingerprint = fingerprint.into();
        let mut entries = self.entries.write();
        if entries.contains_key(&fingerprint) {
            return false;
        }
        entries.insert(fingerprint, result);
        if entries.len() % 1000 == 0 {
            debug!(entries = entries.len(), "score cache grew");
        }
        true
    }

    /// Number of cached fingerprints.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True if nothing is cached yet.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_then_hit() {
        let cache = ScoreCache::new();
        assert!(cache.get("f1").is_none());

        assert!(cache.insert("f1", ClassificationResult::single("toxic", 0.9)));
        let hit = cache.get("f1").unwrap();
        assert_eq!(hit.score_for("toxic"), Some(0.9));
        assert!(cache.contains("f1"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn first_write_wins() {
        let cache = ScoreCache::new();
        assert!(cache.insert("f", ClassificationResult::single("toxic", 0.2)));
        assert!(!cache.insert("f", ClassificationResult::single("toxic", 0.9)));

        assert_eq!(cache.get("f").unwrap().score_for("toxic"), Some(0.2));
        assert_eq!(cache.len(), 1);
    }
}
