//! Mutation watcher: drives incremental re-scans as the document changes.
//!
//! A single consumer drains the document's change batches; each newly added
//! subtree goes through scan → classify → redact on its own, never the whole
//! document, which bounds the cost of a change to its delta. Subtrees rooted
//! at redaction output are skipped, so the engine's own edits never feed
//! back into the pipeline even though they are observed like any other
//! change.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::client::{ClassificationClient, ClassifyError};
use crate::config::FilterConfig;
use crate::document::{Document, MutationBatch, NodeId};
use crate::redact::{RedactionEngine, RedactionReport, IMAGE_MARK_ATTR, TEXT_MARK_ATTR};
use crate::scanner::DocumentScanner;
use crate::store::{self, KeyValueStore};

/// Where the watcher currently is in its drain loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatcherPhase {
    /// Waiting for change batches.
    #[default]
    Idle,
    /// Scanning, classifying and redacting a batch.
    Handling,
}

/// Single consumer over the document's structural-change stream.
pub struct MutationWatcher {
    doc: Arc<Document>,
    scanner: DocumentScanner,
    client: Arc<ClassificationClient>,
    engine: RedactionEngine,
    store: Arc<dyn KeyValueStore>,
    phase: RwLock<WatcherPhase>,
}

impl MutationWatcher {
    /// Wires a watcher over the shared document and collaborators.
    pub fn new(
        doc: Arc<Document>,
        scanner: DocumentScanner,
        client: Arc<ClassificationClient>,
        engine: RedactionEngine,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            doc,
            scanner,
            client,
            engine,
            store,
            phase: RwLock::new(WatcherPhase::Idle),
        }
    }

    /// The watcher's current phase.
    pub fn phase(&self) -> WatcherPhase {
        *self.phase.read()
    }

    /// Full-document pass run once at startup.
    pub async fn initial_pass(&self) -> RedactionReport {
        info!("running initial full-document pass");
        self.process_roots(&[self.doc.root()]).await
    }

    /// Processes one change batch.
    pub async fn process_batch(&self, batch: &MutationBatch) -> RedactionReport {
        *self.phase.write() = WatcherPhase::Handling;
        let report = self.process_roots(&batch.added).await;
        *self.phase.write() = WatcherPhase::Idle;
        report
    }

    /// Drains the change stream until the document drops its sender side.
    pub async fn run(&self, mut changes: UnboundedReceiver<MutationBatch>) {
        info!("mutation watcher started");
        while let Some(batch) = changes.recv().await {
            self.process_batch(&batch).await;
        }
        info!("mutation watcher stopped");
    }

    async fn process_roots(&self, roots: &[NodeId]) -> RedactionReport {
        // Enablement can change between batches; re-read every pass and
        // degrade to disabled filters when storage is unavailable.
        let config = store::load_filter_config_or_default(self.store.as_ref());
        let mut report = RedactionReport::default();

        if !config.any_enabled() {
            debug!("all filters disabled, batch skipped");
            return report;
        }

        for &root in roots {
            if self.doc.attr(root, TEXT_MARK_ATTR).is_some()
                || self.doc.attr(root, IMAGE_MARK_ATTR).is_some()
            {
                debug!(root, "ignoring self-produced subtree");
                continue;
            }
            report.merge(self.process_subtree(root, &config).await);
        }

        if report.total() > 0 {
            match store::add_replacements(self.store.as_ref(), report.total()) {
                Ok(total) => {
                    info!(batch = report.total(), total, "replacement counter updated");
                }
                Err(err) => {
                    warn!(error = %err, "failed to persist replacement counter");
                }
            }
        }
        report
    }

    async fn process_subtree(&self, root: NodeId, config: &FilterConfig) -> RedactionReport {
        let scan = self.scanner.scan(
            &self.doc,
            root,
            config.text_filter.is_enabled,
            config.image_filter.is_enabled,
        );
        let mut report = RedactionReport::default();

        for unit in &scan.units {
            let threshold = config.toggle(unit.kind).threshold();
            match self.client.classify(unit).await {
                Ok(result) => {
                    report.merge(self.engine.apply(&self.doc, unit, &result, threshold));
                }
                Err(err @ ClassifyError::InvalidInput { .. }) => {
                    debug!(unit = unit.id, error = %err, "dropping malformed unit");
                }
                Err(err) => {
                    warn!(unit = unit.id, error = %err, "classification unavailable, unit skipped");
                }
            }
        }
        report
    }
}
