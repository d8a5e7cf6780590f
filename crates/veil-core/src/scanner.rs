//! Document scanner: turns a subtree into a batch of content units.
//!
//! Text is collapsed, split into sentence fragments and length-filtered.
//! Images pass a relevance heuristic that weeds out icons, banners and
//! vector assets before they cost a classification call. Scanning never
//! mutates the document and can be re-run on any subtree.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{Document, ImageAttrs, NodeId};
use crate::redact::{IMAGE_MARK_ATTR, TEXT_MARK_ATTR};
use crate::unit::{ContentKind, ContentUnit};

/// Sentence-terminating punctuation (with trailing newlines) or bare
/// newline runs.
static SENTENCE_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+\n*|\n+").expect("sentence split pattern"));

/// Relevance heuristics for candidate extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerConfig {
    /// Text fragments must be longer than this many characters.
    pub min_fragment_len: usize,
    /// Images narrower than this are treated as icons/buttons.
    pub min_width: u32,
    /// Images shorter than this are treated as icons/buttons.
    pub min_height: u32,
    /// Images wider than this are treated as backgrounds/banners.
    pub max_width: u32,
    /// Images taller than this are treated as backgrounds/banners.
    pub max_height: u32,
    /// Lower bound on width/height.
    pub min_aspect_ratio: f32,
    /// Upper bound on width/height.
    pub max_aspect_ratio: f32,
    /// Source extensions never worth classifying.
    pub excluded_extensions: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            min_fragment_len: 10,
            min_width: 50,
            min_height: 50,
            max_width: 2000,
            max_height: 2000,
            min_aspect_ratio: 0.2,
            max_aspect_ratio: 5.0,
            excluded_extensions: vec!["ico".to_string(), "svg".to_string()],
        }
    }
}

/// An image dropped by the relevance filter, with the reason recorded for
/// diagnostics. Rejections never fail the scan.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedImage {
    /// The image node.
    pub node: NodeId,
    /// Its source locator.
    pub src: String,
    /// Why it was dropped.
    pub reason: String,
}

/// One scan pass over a subtree.
#[derive(Debug, Clone, Default)]
pub struct ScanBatch {
    /// Extracted units, text first, in document order.
    pub units: Vec<ContentUnit>,
    /// Images dropped by the relevance filter.
    pub rejected: Vec<RejectedImage>,
}

impl ScanBatch {
    /// Units of one kind, in batch order.
    pub fn units_of(&self, kind: ContentKind) -> impl Iterator<Item = &ContentUnit> {
        self.units.iter().filter(move |u| u.kind == kind)
    }

    /// True if the pass produced nothing to classify.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Extracts candidate content units from document subtrees.
#[derive(Debug, Clone, Default)]
pub struct DocumentScanner {
    config: ScannerConfig,
}

impl DocumentScanner {
    /// A scanner with default heuristics.
    pub fn new() -> Self {
        Self::default()
    }

    /// A scanner with custom heuristics.
    pub fn with_config(config: ScannerConfig) -> Self {
        Self { config }
    }

    /// The active heuristics.
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Scans a subtree for the given kinds.
    pub fn scan(
        &self,
        doc: &Document,
        root: NodeId,
        text: bool,
        images: bool,
    ) -> ScanBatch {
        let mut batch = ScanBatch::default();
        let mut next_id = 0u64;

        if text {
            self.scan_text(doc, root, &mut next_id, &mut batch);
        }
        if images {
            self.scan_images(doc, root, &mut next_id, &mut batch);
        }

        debug!(
            root,
            units = batch.units.len(),
            rejected = batch.rejected.len(),
            "scan pass complete"
        );
        batch
    }

    fn scan_text(&self, doc: &Document, root: NodeId, next_id: &mut u64, batch: &mut ScanBatch) {
        // A subtree that already contains redaction output was processed in
        // an earlier pass; re-extracting it would re-classify masked text.
        if doc.subtree_has_attr(root, TEXT_MARK_ATTR) {
            debug!(root, "skipping subtree with existing redaction marks");
            return;
        }

        for sentence in self.sentences(&doc.visible_text(root)) {
            batch
                .units
                .push(ContentUnit::text(*next_id, root, sentence));
            *next_id += 1;
        }
    }

    /// Splits collapsed text into trimmed sentence fragments, dropping short
    /// ones.
    fn sentences(&self, text: &str) -> Vec<String> {
        SENTENCE_SPLIT
            .split(text)
            .map(str::trim)
            .filter(|s| s.chars().count() > self.config.min_fragment_len)
            .map(str::to_string)
            .collect()
    }

    fn scan_images(&self, doc: &Document, root: NodeId, next_id: &mut u64, batch: &mut ScanBatch) {
        for (node, attrs) in doc.images_under(root) {
            if attrs.src.trim().is_empty() {
                continue;
            }
            if doc.attr(node, IMAGE_MARK_ATTR).is_some() {
                debug!(node, "skipping already-flagged image");
                continue;
            }
            match self.relevance(&attrs) {
                Ok(()) => {
                    batch
                        .units
                        .push(ContentUnit::image(*next_id, node, attrs.src));
                    *next_id += 1;
                }
                Err(reason) => {
                    debug!(node, src = %attrs.src, %reason, "image dropped by relevance filter");
                    batch.rejected.push(RejectedImage {
                        node,
                        src: attrs.src,
                        reason,
                    });
                }
            }
        }
    }

    /// Relevance heuristic; `Err` carries the rejection reason.
    fn relevance(&self, attrs: &ImageAttrs) -> std::result::Result<(), String> {
        let c = &self.config;

        if attrs.width < c.min_width || attrs.height < c.min_height {
            return Err(format!("too small ({}x{})", attrs.width, attrs.height));
        }
        if attrs.width > c.max_width || attrs.height > c.max_height {
            return Err(format!("too large ({}x{})", attrs.width, attrs.height));
        }

        let extension = attrs
            .src
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if c.excluded_extensions.iter().any(|e| *e == extension) {
            return Err(format!("excluded file extension: {extension}"));
        }

        let aspect = attrs.width as f32 / attrs.height as f32;
        if aspect > c.max_aspect_ratio || aspect < c.min_aspect_ratio {
            return Err(format!("extreme aspect ratio: {aspect:.2}"));
        }

        Ok(())
    }
}
