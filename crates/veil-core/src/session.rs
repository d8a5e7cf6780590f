//! Moderation session: explicit ownership and lifecycle for the whole core.
//!
//! Caches, counters and the model slots all hang off one explicitly
//! constructed session object with a clear create/start/shutdown lifecycle;
//! nothing lives in ambient module state.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use crate::client::ClassificationClient;
use crate::document::Document;
use crate::oracle::ScoringOracle;
use crate::pipeline::{PipelineManager, PipelineSettings};
use crate::redact::{RedactionEngine, RedactionPolicy, RedactionReport};
use crate::scanner::{DocumentScanner, ScannerConfig};
use crate::store::KeyValueStore;
use crate::watcher::MutationWatcher;

/// Tuning for a session's components.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Pipeline retry/backoff and model options.
    pub pipeline: PipelineSettings,
    /// Scanner heuristics.
    pub scanner: ScannerConfig,
    /// Redaction treatments.
    pub policy: RedactionPolicy,
}

/// One moderation session over one document.
pub struct ModerationSession {
    doc: Arc<Document>,
    pipeline: Arc<PipelineManager>,
    client: Arc<ClassificationClient>,
    watcher: Arc<MutationWatcher>,
    store: Arc<dyn KeyValueStore>,
    task: Option<JoinHandle<()>>,
}

impl ModerationSession {
    /// Builds a session with default options.
    pub fn new(
        doc: Arc<Document>,
        oracle: Box<dyn ScoringOracle>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self::with_options(doc, oracle, store, SessionOptions::default())
    }

    /// Builds a session with custom options.
    pub fn with_options(
        doc: Arc<Document>,
        oracle: Box<dyn ScoringOracle>,
        store: Arc<dyn KeyValueStore>,
        options: SessionOptions,
    ) -> Self {
        let pipeline = Arc::new(PipelineManager::with_settings(oracle, options.pipeline));
        let client = Arc::new(ClassificationClient::new(pipeline.clone()));
        let watcher = Arc::new(MutationWatcher::new(
            doc.clone(),
            DocumentScanner::with_config(options.scanner),
            client.clone(),
            RedactionEngine::with_policy(options.policy),
            store.clone(),
        ));
        Self {
            doc,
            pipeline,
            client,
            watcher,
            store,
            task: None,
        }
    }

    /// The document under moderation.
    pub fn document(&self) -> &Arc<Document> {
        &self.doc
    }

    /// The classification client (and its caches).
    pub fn client(&self) -> &Arc<ClassificationClient> {
        &self.client
    }

    /// The mutation watcher.
    pub fn watcher(&self) -> &Arc<MutationWatcher> {
        &self.watcher
    }

    /// The storage collaborator.
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Runs the initial full-document pass, then subscribes to structural
    /// changes and spawns the watcher loop. Returns the initial pass report.
    pub async fn start(&mut self) -> RedactionReport {
        let report = self.watcher.initial_pass().await;
        let changes = self.doc.subscribe();
        let watcher = self.watcher.clone();
        self.task = Some(tokio::spawn(async move { watcher.run(changes).await }));
        info!("moderation session started");
        report
    }

    /// Stops the watcher loop and releases both model instances.
    pub async fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
        self.pipeline.dispose_all().await;
        info!("moderation session shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::oracle::{LoadOptions, OracleError, ScoringSession};
    use crate::pipeline::PipelineState;
    use crate::score::ClassificationResult;
    use crate::store::MemoryStore;
    use crate::unit::ContentKind;

    struct NullOracle;
    struct NullSession;

    #[async_trait]
    impl ScoringOracle for NullOracle {
        async fn load(
            &self,
            _kind: ContentKind,
            _options: &LoadOptions,
        ) -> Result<Box<dyn ScoringSession>, OracleError> {
            Ok(Box::new(NullSession))
        }
    }

    #[async_trait]
    impl ScoringSession for NullSession {
        async fn score(
            &mut self,
            _content: &str,
            _labels: Option<&[String]>,
        ) -> Result<ClassificationResult, OracleError> {
            Ok(ClassificationResult::single("toxic", 0.0))
        }
    }

    fn session() -> ModerationSession {
        ModerationSession::new(
            Arc::new(Document::new()),
            Box::new(NullOracle),
            Arc::new(MemoryStore::new()),
        )
    }

    #[tokio::test]
    async fn start_and_shutdown_cycle() {
        let mut session = session();

        let report = session.start().await;
        assert_eq!(report.total(), 0);

        session.shutdown().await;
        assert_eq!(
            session.client().pipeline().state(ContentKind::Text),
            PipelineState::Uninitialized
        );
        assert!(session.task.is_none());
    }

    #[tokio::test]
    async fn shutdown_without_start_is_harmless() {
        let mut session = session();
        session.shutdown().await;
    }
}
