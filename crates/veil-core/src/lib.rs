//! Veil Core - incremental content moderation for a live document tree.
//!
//! The core watches a mutating document, extracts candidate text and image
//! units from changed subtrees only, scores them against an opaque
//! classification oracle (cached, deduplicated, serialized per model kind)
//! and applies idempotent redaction once a score crosses the configured
//! threshold.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use veil_core::config::{FilterConfig, FilterToggle};
//! use veil_core::document::Document;
//! use veil_core::session::ModerationSession;
//! use veil_core::store::{self, MemoryStore};
//!
//! # async fn run(oracle: Box<dyn veil_core::oracle::ScoringOracle>) {
//! let doc = Arc::new(Document::new());
//! let store = Arc::new(MemoryStore::new());
//! store::save_filter_config(
//!     store.as_ref(),
//!     &FilterConfig {
//!         text_filter: FilterToggle::enabled(80),
//!         ..FilterConfig::default()
//!     },
//! )
//! .unwrap();
//!
//! let mut session = ModerationSession::new(doc.clone(), oracle, store);
//! session.start().await;
//! doc.append_text(doc.root(), "content appearing after startup is scanned too");
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod command;
pub mod config;
pub mod document;
pub mod oracle;
pub mod pipeline;
pub mod redact;
pub mod scanner;
pub mod score;
pub mod session;
pub mod store;
pub mod unit;
pub mod watcher;

pub use cache::ScoreCache;
pub use client::{ClassificationClient, ClassifyError, ClassifyOptions};
pub use command::{dispatch, CommandRequest, CommandResponse};
pub use config::{FilterConfig, FilterToggle, DEFAULT_STRICTNESS};
pub use document::{Document, Fragment, ImageAttrs, MutationBatch, NodeId};
pub use oracle::{LoadOptions, OracleError, ScoringOracle, ScoringSession};
pub use pipeline::{PipelineError, PipelineManager, PipelineSettings, PipelineState};
pub use redact::{RedactionEngine, RedactionPolicy, RedactionReport};
pub use scanner::{DocumentScanner, ScanBatch, ScannerConfig};
pub use score::{ClassificationResult, LabelScore};
pub use session::{ModerationSession, SessionOptions};
pub use store::{KeyValueStore, MemoryStore, StoreError};
pub use unit::{ContentKind, ContentUnit};
pub use watcher::{MutationWatcher, WatcherPhase};
