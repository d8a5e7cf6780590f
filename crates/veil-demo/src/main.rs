//! Veil demo - runs the moderation pipeline over a sample document.
//!
//! Wires the core to the SQLite storage layer with a scripted keyword
//! oracle standing in for the real classification backend, then walks
//! through an initial pass and a live mutation so every stage of the
//! pipeline is visible in the logs.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use veil_core::client::ClassificationClient;
use veil_core::command::{self, CommandRequest};
use veil_core::document::{Document, Fragment, ImageAttrs};
use veil_core::oracle::{
    LoadOptions, LoadProgress, OracleError, ScoringOracle, ScoringSession,
};
use veil_core::pipeline::PipelineManager;
use veil_core::redact::{ImageTreatment, RedactionEngine, RedactionPolicy, TextTreatment};
use veil_core::scanner::DocumentScanner;
use veil_core::score::{ClassificationResult, LabelScore};
use veil_core::store::{self, KeyValueStore};
use veil_core::unit::ContentKind;
use veil_core::watcher::MutationWatcher;
use veil_storage::{Database, NewRedactionEvent};

/// Veil - content moderation demo
#[derive(Parser, Debug)]
#[command(name = "veil-demo", version, about)]
struct Args {
    /// Strictness percentage for both filters (0-100)
    #[arg(long, default_value = "50")]
    strictness: u8,

    /// Highlight flagged text instead of masking it
    #[arg(long)]
    highlight: bool,

    /// Tint flagged images instead of blurring them
    #[arg(long)]
    tint: bool,

    /// Persist state to this database file instead of memory
    #[arg(long)]
    db: Option<PathBuf>,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Keyword oracle standing in for the real backend: "hate" and "stupid"
/// score as toxic, image sources containing "nsfw" score as unsafe.
struct KeywordOracle;

struct KeywordSession;

#[async_trait]
impl ScoringOracle for KeywordOracle {
    async fn load(
        &self,
        kind: ContentKind,
        options: &LoadOptions,
    ) -> std::result::Result<Box<dyn ScoringSession>, OracleError> {
        // Simulate an expensive cold start with visible progress.
        for step in 0..=4u64 {
            if let Some(cb) = &options.progress {
                cb(LoadProgress::new(format!("loading {}", options.model), step, Some(4)));
            }
            tokio::time::sleep(std::time::Duration::from_millis(40)).await;
        }
        info!(%kind, model = %options.model, "demo model instance ready");
        Ok(Box::new(KeywordSession))
    }
}

#[async_trait]
impl ScoringSession for KeywordSession {
    async fn score(
        &mut self,
        content: &str,
        labels: Option<&[String]>,
    ) -> std::result::Result<ClassificationResult, OracleError> {
        match labels {
            Some(_) => {
                let unsafe_score = if content.contains("nsfw") { 0.95 } else { 0.03 };
                Ok(ClassificationResult::new(vec![
                    LabelScore::new("safe", 1.0 - unsafe_score),
                    LabelScore::new("unsafe", unsafe_score),
                ]))
            }
            None => {
                let lowered = content.to_lowercase();
                let toxic = if lowered.contains("hate") || lowered.contains("stupid") {
                    0.92
                } else {
                    0.08
                };
                Ok(ClassificationResult::single("toxic", toxic))
            }
        }
    }
}

fn sample_document() -> (Arc<Document>, veil_core::document::NodeId) {
    let doc = Arc::new(Document::new());
    let article = doc.attach(
        doc.root(),
        Fragment::element("article")
            .child(Fragment::text(
                "Welcome to the demo page. I hate everything about this place! \
                 The rest of the article is perfectly pleasant reading.",
            ))
            .child(Fragment::image(ImageAttrs::new("https://example.com/nsfw-banner.jpg", 800, 600)))
            .child(Fragment::image(ImageAttrs::new("https://example.com/favicon.ico", 32, 32))),
    );
    (doc, article)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "veil_core={0},veil_storage={0},veil_demo={0},warn",
                args.log_level
            ))
        });
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let db = match &args.db {
        Some(path) => Database::with_path(path)?,
        None => Database::in_memory()?,
    };
    let store: Arc<dyn KeyValueStore> = Arc::new(db.clone());

    // Configure both filters through the command surface.
    for kind in [ContentKind::Text, ContentKind::Image] {
        command::dispatch(store.as_ref(), CommandRequest::ToggleFilter { kind })?;
        command::dispatch(
            store.as_ref(),
            CommandRequest::SetStrictness { kind, strictness: args.strictness },
        )?;
    }
    info!(strictness = args.strictness, "filters enabled");

    let policy = RedactionPolicy {
        text: if args.highlight { TextTreatment::Highlight } else { TextTreatment::Mask },
        image: if args.tint { ImageTreatment::Tint } else { ImageTreatment::Blur },
    };

    let pipeline = Arc::new(PipelineManager::new(Box::new(KeywordOracle)));
    let client = Arc::new(ClassificationClient::new(pipeline.clone()));
    let scanner = DocumentScanner::new();
    let engine = RedactionEngine::with_policy(policy);

    let (doc, article) = sample_document();

    // Stage 1: walk the initial document by hand so each unit's outcome can
    // be logged and recorded in the event log.
    let config = store::load_filter_config(store.as_ref())?;
    let scan = scanner.scan(&doc, article, true, true);
    println!(
        "scan: {} unit(s), {} image(s) rejected by relevance filter",
        scan.units.len(),
        scan.rejected.len()
    );
    for rejected in &scan.rejected {
        println!("  rejected {}: {}", rejected.src, rejected.reason);
    }

    let mut flagged = 0u64;
    for unit in &scan.units {
        let threshold = config.toggle(unit.kind).threshold();
        let result = client.classify(unit).await?;
        let report = engine.apply(&doc, unit, &result, threshold);
        if report.total() > 0 {
            flagged += report.total();
            if let Some(top) = result.top() {
                db.record_redaction(NewRedactionEvent {
                    content: unit.raw_content.clone(),
                    kind: unit.kind,
                    label: top.label.clone(),
                    score: top.score,
                    occurrences: report.total() as u32,
                })?;
            }
        }
    }
    store::add_replacements(store.as_ref(), flagged)?;

    // Stage 2: live mutation through the watcher, including its own
    // self-edit suppression (mask insertions come back through the channel
    // and are ignored).
    let watcher = MutationWatcher::new(
        doc.clone(),
        scanner.clone(),
        client.clone(),
        engine.clone(),
        store.clone(),
    );
    let mut changes = doc.subscribe();
    doc.attach(
        doc.root(),
        Fragment::element("section")
            .child(Fragment::text("Dynamically injected: you are so stupid sometimes."))
            .child(Fragment::text("And a closing line nobody minds at all.")),
    );
    while let Ok(batch) = changes.try_recv() {
        watcher.process_batch(&batch).await;
    }

    // Summary.
    println!();
    println!("final document text:");
    for line in doc.visible_text(doc.root()).lines() {
        if !line.trim().is_empty() {
            println!("  {line}");
        }
    }
    println!();
    println!(
        "replacement counter: {}",
        store::replacement_count(store.as_ref())?
    );
    let totals = db.redaction_totals()?;
    println!(
        "event log totals: {} text, {} image",
        totals.text, totals.image
    );
    for event in db.recent_redactions(10)? {
        println!(
            "  [{}] {} ({:.2}) \"{}\"",
            event.kind, event.label, event.score, event.preview
        );
    }

    pipeline.dispose_all().await;
    Ok(())
}
