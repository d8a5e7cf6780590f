//! The scoring-oracle seam.
//!
//! The classification backend is opaque to the core: it is anything that can
//! bring up a model instance for a content kind and score content against it.
//! Model internals, transport and timeouts all live behind these traits.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::score::ClassificationResult;
use crate::unit::ContentKind;

/// Default model identifier for the text toxicity pipeline.
pub const DEFAULT_TEXT_MODEL: &str = "Xenova/toxic-bert";

/// Default model identifier for the zero-shot image pipeline.
pub const DEFAULT_IMAGE_MODEL: &str = "Xenova/clip-vit-base-patch32";

/// Errors surfaced by the oracle.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Bringing up the model instance failed.
    #[error("model load failed: {0}")]
    Load(String),

    /// A scoring call against a live instance failed.
    #[error("scoring call failed: {0}")]
    Score(String),
}

/// Progress reported while a model instance is being brought up.
#[derive(Debug, Clone)]
pub struct LoadProgress {
    /// Current step description.
    pub step: String,
    /// Bytes or items completed so far.
    pub loaded: u64,
    /// Total amount, if known.
    pub total: Option<u64>,
}

impl LoadProgress {
    /// Creates a progress update.
    pub fn new(step: impl Into<String>, loaded: u64, total: Option<u64>) -> Self {
        Self {
            step: step.into(),
            loaded,
            total,
        }
    }

    /// Progress as a percentage (0-100), if the total is known.
    pub fn percentage(&self) -> Option<u8> {
        self.total.map(|t| {
            if t == 0 {
                100
            } else {
                ((self.loaded as f64 / t as f64) * 100.0).min(100.0) as u8
            }
        })
    }
}

/// Load progress callback type (Arc so options stay cloneable).
pub type ProgressCallback = Arc<dyn Fn(LoadProgress) + Send + Sync>;

/// Device a model instance runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    /// GPU inference where the host supports it.
    #[default]
    Gpu,
    /// CPU fallback.
    Cpu,
}

/// Numeric precision requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dtype {
    /// Full precision.
    #[default]
    F32,
    /// Half precision.
    F16,
    /// 8-bit quantized.
    Q8,
}

/// Options handed to the oracle when a model instance is created.
#[derive(Clone, Default)]
pub struct LoadOptions {
    /// Model identifier.
    pub model: String,
    /// Target device.
    pub device: Device,
    /// Requested precision.
    pub dtype: Dtype,
    /// Optional progress callback.
    pub progress: Option<ProgressCallback>,
}

impl LoadOptions {
    /// Default options for a content kind.
    pub fn for_kind(kind: ContentKind) -> Self {
        let model = match kind {
            ContentKind::Text => DEFAULT_TEXT_MODEL,
            ContentKind::Image => DEFAULT_IMAGE_MODEL,
        };
        Self {
            model: model.to_string(),
            ..Self::default()
        }
    }

    /// Sets the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the progress callback.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl std::fmt::Debug for LoadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadOptions")
            .field("model", &self.model)
            .field("device", &self.device)
            .field("dtype", &self.dtype)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Factory for model instances, one per content kind.
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    /// Brings up a model instance. Expensive; called once per kind unless a
    /// previous instance failed or was disposed.
    async fn load(
        &self,
        kind: ContentKind,
        options: &LoadOptions,
    ) -> Result<Box<dyn ScoringSession>, OracleError>;
}

/// A live model instance.
///
/// Concurrent-call safety is unproven, so callers must serialize access;
/// the pipeline manager does.
#[async_trait]
pub trait ScoringSession: Send {
    /// Scores one piece of content. `labels` carries the candidate set for
    /// zero-shot image scoring and is `None` for text.
    async fn score(
        &mut self,
        content: &str,
        labels: Option<&[String]>,
    ) -> Result<ClassificationResult, OracleError>;
}
