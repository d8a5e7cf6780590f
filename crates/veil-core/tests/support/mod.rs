//! Shared fixtures for integration tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use veil_core::oracle::{LoadOptions, OracleError, ScoringOracle, ScoringSession};
use veil_core::score::{ClassificationResult, LabelScore};
use veil_core::unit::ContentKind;

/// Keyword-driven oracle: text containing "hate" scores toxic 0.91, image
/// sources containing "nsfw" score unsafe 0.95. Counts loads and scoring
/// invocations, and can be told to fail its first N loads.
pub struct ScriptedOracle {
    pub loads: Arc<AtomicU32>,
    pub invocations: Arc<AtomicU32>,
    fail_loads: Arc<AtomicU32>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::failing_loads(0)
    }

    pub fn failing_loads(count: u32) -> Self {
        Self {
            loads: Arc::new(AtomicU32::new(0)),
            invocations: Arc::new(AtomicU32::new(0)),
            fail_loads: Arc::new(AtomicU32::new(count)),
        }
    }
}

struct ScriptedSession {
    invocations: Arc<AtomicU32>,
}

#[async_trait]
impl ScoringOracle for ScriptedOracle {
    async fn load(
        &self,
        _kind: ContentKind,
        _options: &LoadOptions,
    ) -> Result<Box<dyn ScoringSession>, OracleError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let remaining = self.fail_loads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_loads.store(remaining - 1, Ordering::SeqCst);
            return Err(OracleError::Load("scripted load failure".to_string()));
        }
        Ok(Box::new(ScriptedSession {
            invocations: self.invocations.clone(),
        }))
    }
}

#[async_trait]
impl ScoringSession for ScriptedSession {
    async fn score(
        &mut self,
        content: &str,
        labels: Option<&[String]>,
    ) -> Result<ClassificationResult, OracleError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        match labels {
            Some(_) => {
                let unsafe_score = if content.contains("nsfw") { 0.95 } else { 0.02 };
                Ok(ClassificationResult::new(vec![
                    LabelScore::new("safe", 1.0 - unsafe_score),
                    LabelScore::new("unsafe", unsafe_score),
                    LabelScore::new("inappropriate", 0.01),
                    LabelScore::new("adult content", 0.01),
                ]))
            }
            None => Ok(ClassificationResult::single(
                "toxic",
                if content.contains("hate") { 0.91 } else { 0.1 },
            )),
        }
    }
}

/// Polls a condition until it holds or roughly a second passes.
pub async fn eventually<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    condition()
}
