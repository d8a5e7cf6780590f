//! Classification client: content units in, cached results out.
//!
//! The client owns one score cache per content kind and fronts the pipeline
//! manager. Cached fingerprints never reach the pipeline; identical requests
//! already in flight are deduplicated rather than raced; failures leave the
//! cache unpopulated so a later call retries.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{trace, warn};

use crate::cache::ScoreCache;
use crate::pipeline::{PipelineError, PipelineManager};
use crate::score::{image_candidate_labels, ClassificationResult};
use crate::unit::{ContentKind, ContentUnit};

/// Errors surfaced by [`ClassificationClient::classify`].
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// Malformed content unit. Never retried; the unit is dropped.
    #[error("invalid {kind} input: {reason}")]
    InvalidInput {
        /// Kind the unit claimed to be.
        kind: ContentKind,
        /// Why it was rejected.
        reason: String,
    },

    /// Initialization or scoring failure from the pipeline. The cache stays
    /// unpopulated, so a later call for the same fingerprint retries.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Result type for classification calls.
pub type Result<T> = std::result::Result<T, ClassifyError>;

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct ClassifyOptions {
    /// Candidate labels for image units; the default set when `None`.
    pub labels: Option<Vec<String>>,
}

/// Caching front end over the pipeline manager.
pub struct ClassificationClient {
    pipeline: Arc<PipelineManager>,
    text_cache: ScoreCache,
    image_cache: ScoreCache,
    in_flight: Mutex<HashMap<(ContentKind, String), Arc<Mutex<()>>>>,
}

impl ClassificationClient {
    /// Creates a client over a pipeline manager.
    pub fn new(pipeline: Arc<PipelineManager>) -> Self {
        Self {
            pipeline,
            text_cache: ScoreCache::new(),
            image_cache: ScoreCache::new(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// The cache for a content kind.
    pub fn cache(&self, kind: ContentKind) -> &ScoreCache {
        match kind {
            ContentKind::Text => &self.text_cache,
            ContentKind::Image => &self.image_cache,
        }
    }

    /// The underlying pipeline manager.
    pub fn pipeline(&self) -> &PipelineManager {
        &self.pipeline
    }

    /// Classifies a unit with default options.
    pub async fn classify(&self, unit: &ContentUnit) -> Result<ClassificationResult> {
        self.classify_with(unit, &ClassifyOptions::default()).await
    }

    /// Classifies a unit, consulting the cache first.
    pub async fn classify_with(
        &self,
        unit: &ContentUnit,
        options: &ClassifyOptions,
    ) -> Result<ClassificationResult> {
        validate(unit)?;

        let cache = self.cache(unit.kind);
        if let Some(hit) = cache.get(&unit.fingerprint) {
            trace!(kind = %unit.kind, fingerprint = %unit.fingerprint, "cache hit");
            return Ok(hit);
        }

        // Deduplicate identical in-flight fingerprints: duplicates queue on
        // a per-key guard and read the first request's cached result.
        let key = (unit.kind, unit.fingerprint.clone());
        let slot = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = slot.lock().await;

        if let Some(hit) = cache.get(&unit.fingerprint) {
            trace!(kind = %unit.kind, fingerprint = %unit.fingerprint, "deduplicated in-flight request");
            self.release(&key, &slot).await;
            return Ok(hit);
        }

        let labels = match unit.kind {
            ContentKind::Text => None,
            ContentKind::Image => Some(
                options
                    .labels
                    .clone()
                    .unwrap_or_else(image_candidate_labels),
            ),
        };

        let outcome = self
            .pipeline
            .score(unit.kind, &unit.raw_content, labels.as_deref())
            .await;

        // Populate the cache before releasing the guard so a request
        // arriving in between still finds the result instead of re-scoring.
        if let Ok(result) = &outcome {
            cache.insert(unit.fingerprint.clone(), result.clone());
        }
        self.release(&key, &slot).await;

        match outcome {
            Ok(result) => Ok(result),
            Err(err) => {
                warn!(kind = %unit.kind, fingerprint = %unit.fingerprint, error = %err,
                    "classification failed, result not cached");
                Err(err.into())
            }
        }
    }

    /// Drops the in-flight entry once nobody else is waiting on it.
    async fn release(&self, key: &(ContentKind, String), slot: &Arc<Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().await;
        // The map holds one reference and we hold another; more means a
        // duplicate is still queued and will clean up after itself.
        if Arc::strong_count(slot) <= 2 {
            in_flight.remove(key);
        }
    }
}

fn validate(unit: &ContentUnit) -> Result<()> {
    match unit.kind {
        ContentKind::Text => {
            if unit.raw_content.trim().is_empty() {
                return Err(ClassifyError::InvalidInput {
                    kind: unit.kind,
                    reason: "empty text".to_string(),
                });
            }
        }
        ContentKind::Image => {
            if unit.raw_content.is_empty() {
                return Err(ClassifyError::InvalidInput {
                    kind: unit.kind,
                    reason: "empty source locator".to_string(),
                });
            }
            if unit.raw_content.chars().any(char::is_whitespace) {
                return Err(ClassifyError::InvalidInput {
                    kind: unit.kind,
                    reason: "source locator contains whitespace".to_string(),
                });
            }
        }
    }
    Ok(())
}
