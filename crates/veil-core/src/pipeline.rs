//! Pipeline lifecycle manager.
//!
//! Owns one scoring-model instance per content kind. Instances are expensive
//! and asynchronously initialized, so each kind gets exactly one slot that is
//! brought up on first demand, retried with exponential backoff on failure,
//! and serialized behind a fair mutex: scoring calls for the same kind
//! complete strictly in submission order because the underlying oracle is
//! not proven safe for concurrent invocation.

use std::time::Duration;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::oracle::{LoadOptions, OracleError, ScoringOracle, ScoringSession};
use crate::score::ClassificationResult;
use crate::unit::ContentKind;

/// Lifecycle state of one model slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// No instance exists and none is being created.
    #[default]
    Uninitialized,
    /// Initialization is in progress; callers queue behind it.
    Loading,
    /// A live instance is available.
    Ready,
    /// The last initialization exhausted its retries. Retried on next demand.
    Failed,
}

/// Errors surfaced by the pipeline manager.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The model failed to load after all retry attempts.
    #[error("{kind} model failed to initialize after {attempts} attempts: {message}")]
    Initialization {
        /// Content kind of the failing slot.
        kind: ContentKind,
        /// Attempts made before giving up.
        attempts: u32,
        /// Last underlying failure.
        message: String,
    },

    /// A scoring call against a live instance failed.
    #[error("{kind} scoring failed: {source}")]
    Scoring {
        /// Content kind of the slot.
        kind: ContentKind,
        /// Underlying oracle failure.
        #[source]
        source: OracleError,
    },
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Tuning knobs for slot initialization.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Initialization attempts before reporting failure.
    pub max_retries: u32,
    /// Backoff after the first failed attempt; doubles per attempt.
    pub base_backoff: Duration,
    /// Upper bound on a single backoff sleep.
    pub max_backoff: Duration,
    /// Load options for the text slot.
    pub text_options: LoadOptions,
    /// Load options for the image slot.
    pub image_options: LoadOptions,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_millis(5000),
            text_options: LoadOptions::for_kind(ContentKind::Text),
            image_options: LoadOptions::for_kind(ContentKind::Image),
        }
    }
}

impl PipelineSettings {
    /// Load options for a kind.
    pub fn options_for(&self, kind: ContentKind) -> &LoadOptions {
        match kind {
            ContentKind::Text => &self.text_options,
            ContentKind::Image => &self.image_options,
        }
    }

    /// Backoff to sleep after failed attempt `attempt` (1-based):
    /// `base * 2^(attempt-1)`, capped at `max_backoff`.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(10);
        (self.base_backoff * 2u32.pow(exp)).min(self.max_backoff)
    }
}

struct Slot {
    session: Mutex<Option<Box<dyn ScoringSession>>>,
    state: RwLock<PipelineState>,
}

impl Slot {
    fn new() -> Self {
        Self {
            session: Mutex::new(None),
            state: RwLock::new(PipelineState::Uninitialized),
        }
    }

    fn set_state(&self, state: PipelineState) {
        *self.state.write() = state;
    }
}

/// Per-kind model slots over an opaque scoring oracle.
pub struct PipelineManager {
    oracle: Box<dyn ScoringOracle>,
    settings: PipelineSettings,
    text: Slot,
    image: Slot,
}

impl PipelineManager {
    /// Creates a manager with default settings.
    pub fn new(oracle: Box<dyn ScoringOracle>) -> Self {
        Self::with_settings(oracle, PipelineSettings::default())
    }

    /// Creates a manager with custom settings.
    pub fn with_settings(oracle: Box<dyn ScoringOracle>, settings: PipelineSettings) -> Self {
        Self {
            oracle,
            settings,
            text: Slot::new(),
            image: Slot::new(),
        }
    }

    fn slot(&self, kind: ContentKind) -> &Slot {
        match kind {
            ContentKind::Text => &self.text,
            ContentKind::Image => &self.image,
        }
    }

    /// Observable lifecycle state of a kind's slot.
    pub fn state(&self, kind: ContentKind) -> PipelineState {
        *self.slot(kind).state.read()
    }

    /// Scores content against the kind's model instance.
    ///
    /// Brings the instance up on first demand (or after a failure or
    /// dispose). Calls for the same kind are queued fairly and complete in
    /// submission order; a call arriving while initialization is in
    /// progress waits for it.
    pub async fn score(
        &self,
        kind: ContentKind,
        content: &str,
        labels: Option<&[String]>,
    ) -> Result<ClassificationResult> {
        let slot = self.slot(kind);
        let mut guard = slot.session.lock().await;

        let session = match guard.as_mut() {
            Some(session) => session,
            None => {
                slot.set_state(PipelineState::Loading);
                match self.initialize(kind).await {
                    Ok(session) => {
                        slot.set_state(PipelineState::Ready);
                        guard.insert(session)
                    }
                    Err(err) => {
                        slot.set_state(PipelineState::Failed);
                        return Err(err);
                    }
                }
            }
        };

        session
            .score(content, labels)
            .await
            .map_err(|source| PipelineError::Scoring { kind, source })
    }

    /// Releases the kind's instance and resets the slot.
    ///
    /// Waits for the in-flight call (if any) to complete before releasing.
    pub async fn dispose(&self, kind: ContentKind) {
        let slot = self.slot(kind);
        let mut guard = slot.session.lock().await;
        if guard.take().is_some() {
            info!(%kind, "scoring pipeline disposed");
        }
        slot.set_state(PipelineState::Uninitialized);
    }

    /// Disposes every slot; used on teardown.
    pub async fn dispose_all(&self) {
        for &kind in ContentKind::all() {
            self.dispose(kind).await;
        }
    }

    async fn initialize(&self, kind: ContentKind) -> Result<Box<dyn ScoringSession>> {
        let options = self.settings.options_for(kind);
        let attempts = self.settings.max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            debug!(%kind, attempt, model = %options.model, "initializing scoring pipeline");
            match self.oracle.load(kind, options).await {
                Ok(session) => {
                    info!(%kind, attempt, model = %options.model, "scoring pipeline ready");
                    return Ok(session);
                }
                Err(err) => {
                    warn!(%kind, attempt, error = %err, "pipeline initialization attempt failed");
                    last_error = err.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.settings.backoff_after(attempt)).await;
                    }
                }
            }
        }

        Err(PipelineError::Initialization {
            kind,
            attempts,
            message: last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex as PlMutex;

    use crate::score::LabelScore;

    /// Oracle whose first `fail_loads` load calls fail, and whose sessions
    /// record completed score calls in order.
    struct FlakyOracle {
        fail_loads: AtomicU32,
        loads: Arc<AtomicU32>,
        completed: Arc<PlMutex<Vec<String>>>,
        score_delay: Duration,
    }

    impl FlakyOracle {
        fn new(fail_loads: u32) -> Self {
            Self {
                fail_loads: AtomicU32::new(fail_loads),
                loads: Arc::new(AtomicU32::new(0)),
                completed: Arc::new(PlMutex::new(Vec::new())),
                score_delay: Duration::ZERO,
            }
        }

        fn with_score_delay(mut self, delay: Duration) -> Self {
            self.score_delay = delay;
            self
        }
    }

    struct RecordingSession {
        completed: Arc<PlMutex<Vec<String>>>,
        delay: Duration,
    }

    #[async_trait]
    impl ScoringOracle for FlakyOracle {
        async fn load(
            &self,
            _kind: ContentKind,
            _options: &LoadOptions,
        ) -> std::result::Result<Box<dyn ScoringSession>, OracleError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            let remaining = self.fail_loads.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_loads.store(remaining - 1, Ordering::SeqCst);
                return Err(OracleError::Load("backend unavailable".to_string()));
            }
            Ok(Box::new(RecordingSession {
                completed: self.completed.clone(),
                delay: self.score_delay,
            }))
        }
    }

    #[async_trait]
    impl ScoringSession for RecordingSession {
        async fn score(
            &mut self,
            content: &str,
            _labels: Option<&[String]>,
        ) -> std::result::Result<ClassificationResult, OracleError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.completed.lock().push(content.to_string());
            Ok(ClassificationResult::new(vec![LabelScore::new("toxic", 0.5)]))
        }
    }

    fn manager(oracle: FlakyOracle) -> (PipelineManager, Arc<AtomicU32>, Arc<PlMutex<Vec<String>>>) {
        let loads = oracle.loads.clone();
        let completed = oracle.completed.clone();
        (PipelineManager::new(Box::new(oracle)), loads, completed)
    }

    #[tokio::test]
    async fn initializes_once_per_kind() {
        let (manager, loads, _) = manager(FlakyOracle::new(0));

        assert_eq!(manager.state(ContentKind::Text), PipelineState::Uninitialized);
        manager.score(ContentKind::Text, "first", None).await.unwrap();
        manager.score(ContentKind::Text, "second", None).await.unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(ContentKind::Text), PipelineState::Ready);
    }

    #[tokio::test]
    async fn kinds_use_separate_slots() {
        let (manager, loads, _) = manager(FlakyOracle::new(0));

        manager.score(ContentKind::Text, "text", None).await.unwrap();
        manager
            .score(ContentKind::Image, "https://e.com/a.jpg", None)
            .await
            .unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert_eq!(manager.state(ContentKind::Image), PipelineState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_exponential_backoff() {
        let (manager, loads, _) = manager(FlakyOracle::new(2));

        let start = tokio::time::Instant::now();
        manager.score(ContentKind::Text, "eventually", None).await.unwrap();

        // Two failures cost 1000ms + 2000ms of backoff before the third
        // attempt succeeds.
        assert_eq!(loads.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_fails_then_retries_on_next_demand() {
        let (manager, loads, _) = manager(FlakyOracle::new(4));

        let err = manager
            .score(ContentKind::Text, "doomed", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Initialization { attempts: 3, .. }
        ));
        assert_eq!(manager.state(ContentKind::Text), PipelineState::Failed);
        assert_eq!(loads.load(Ordering::SeqCst), 3);

        // Failed is not a lock-out: the next demand initializes again
        // (one more failure remains, then success).
        manager.score(ContentKind::Text, "recovered", None).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 5);
        assert_eq!(manager.state(ContentKind::Text), PipelineState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn same_kind_calls_complete_in_submission_order() {
        let oracle = FlakyOracle::new(0).with_score_delay(Duration::from_millis(10));
        let (manager, _, completed) = manager(oracle);
        let manager = Arc::new(manager);

        let mut handles = Vec::new();
        for content in ["first", "second", "third"] {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move {
                manager.score(ContentKind::Text, content, None).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*completed.lock(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn dispose_resets_and_allows_reinit() {
        let (manager, loads, _) = manager(FlakyOracle::new(0));

        manager.score(ContentKind::Text, "before", None).await.unwrap();
        manager.dispose(ContentKind::Text).await;
        assert_eq!(manager.state(ContentKind::Text), PipelineState::Uninitialized);

        manager.score(ContentKind::Text, "after", None).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn backoff_schedule_is_capped() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.backoff_after(1), Duration::from_millis(1000));
        assert_eq!(settings.backoff_after(2), Duration::from_millis(2000));
        assert_eq!(settings.backoff_after(3), Duration::from_millis(4000));
        assert_eq!(settings.backoff_after(4), Duration::from_millis(5000));
        assert_eq!(settings.backoff_after(30), Duration::from_millis(5000));
    }
}
