//! Redaction engine.
//!
//! Applies a visible, idempotent treatment to content whose classification
//! crosses the active threshold, and reports what it did. Every node it
//! produces or touches carries a redaction mark so the mutation watcher and
//! the scanner leave it alone.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::document::{Document, NodeId};
use crate::score::{ClassificationResult, UNSAFE_IMAGE_LABELS};
use crate::unit::{ContentKind, ContentUnit};

/// Marker attribute on text nodes produced by masking/highlighting.
pub const TEXT_MARK_ATTR: &str = "data-veil-masked";

/// Marker attribute on image elements that received a visual treatment.
pub const IMAGE_MARK_ATTR: &str = "data-veil-filtered";

const BLUR_STYLE: &str = "filter: blur(16px) grayscale(0.4)";
const TINT_STYLE: &str = "filter: saturate(2) brightness(1.2) sepia(0.3); border: 3px solid red";

/// Visible treatment for flagged text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextTreatment {
    /// Replace the fragment with a same-length mask.
    #[default]
    Mask,
    /// Keep the fragment but wrap it in a marked highlight.
    Highlight,
}

/// Visible treatment for flagged images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageTreatment {
    /// Blur the element.
    #[default]
    Blur,
    /// Tint and outline the element.
    Tint,
}

/// Which treatments the engine applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RedactionPolicy {
    /// Treatment for text units.
    pub text: TextTreatment,
    /// Treatment for image units.
    pub image: ImageTreatment,
}

/// What one redaction pass changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RedactionReport {
    /// Sentence occurrences replaced or highlighted.
    pub text_replacements: u64,
    /// Images that received the visual treatment.
    pub images_flagged: u64,
}

impl RedactionReport {
    /// Total flags in this report.
    pub fn total(&self) -> u64 {
        self.text_replacements + self.images_flagged
    }

    /// Folds another report into this one.
    pub fn merge(&mut self, other: RedactionReport) {
        self.text_replacements += other.text_replacements;
        self.images_flagged += other.images_flagged;
    }
}

/// Applies threshold decisions and visible treatments to the document.
#[derive(Debug, Clone, Default)]
pub struct RedactionEngine {
    policy: RedactionPolicy,
}

impl RedactionEngine {
    /// An engine with the default policy (mask text, blur images).
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine with a custom policy.
    pub fn with_policy(policy: RedactionPolicy) -> Self {
        Self { policy }
    }

    /// The active policy.
    pub fn policy(&self) -> &RedactionPolicy {
        &self.policy
    }

    /// Text decision rule: flagged when any label score is strictly greater
    /// than the threshold.
    pub fn should_redact_text(result: &ClassificationResult, threshold: f32) -> bool {
        result.any_above(threshold)
    }

    /// Image decision rule: flagged when the best unsafe-like label score
    /// meets or exceeds the threshold.
    pub fn should_flag_image(result: &ClassificationResult, threshold: f32) -> bool {
        result.max_over(UNSAFE_IMAGE_LABELS) >= threshold
    }

    /// Applies the decision rule and treatment for one classified unit.
    pub fn apply(
        &self,
        doc: &Document,
        unit: &ContentUnit,
        result: &ClassificationResult,
        threshold: f32,
    ) -> RedactionReport {
        let mut report = RedactionReport::default();
        match unit.kind {
            ContentKind::Text => {
                if Self::should_redact_text(result, threshold) {
                    report.text_replacements = self.redact_text(doc, unit);
                } else {
                    debug!(fragment = %unit.fingerprint, "text below threshold, untouched");
                }
            }
            ContentKind::Image => {
                if Self::should_flag_image(result, threshold) && self.flag_image(doc, unit.node) {
                    report.images_flagged = 1;
                }
            }
        }
        report
    }

    /// Replaces every occurrence of the unit's sentence fragment within its
    /// subtree, marking the produced nodes. Returns the occurrence count.
    ///
    /// Matching tokenizes on the exact scanner-identified fragment, never on
    /// arbitrary substrings, so partially-overlapping text is left intact.
    pub fn redact_text(&self, doc: &Document, unit: &ContentUnit) -> u64 {
        let mask;
        let replacement = match self.policy.text {
            TextTreatment::Mask => {
                mask = "*".repeat(unit.raw_content.chars().count());
                Some(mask.as_str())
            }
            TextTreatment::Highlight => None,
        };

        let replaced = doc.mark_sentence(unit.node, &unit.raw_content, replacement, TEXT_MARK_ATTR);
        if replaced > 0 {
            info!(
                node = unit.node,
                occurrences = replaced,
                treatment = ?self.policy.text,
                "text fragment redacted"
            );
        }
        replaced as u64
    }

    /// Applies the visual treatment to an image element, exactly once.
    ///
    /// Returns false when the element already carries the mark.
    pub fn flag_image(&self, doc: &Document, node: NodeId) -> bool {
        if doc.attr(node, IMAGE_MARK_ATTR).is_some() {
            debug!(node, "image already flagged, skipping");
            return false;
        }

        let style = match self.policy.image {
            ImageTreatment::Blur => BLUR_STYLE,
            ImageTreatment::Tint => TINT_STYLE,
        };
        doc.set_attr(node, "style", style);
        doc.set_attr(node, IMAGE_MARK_ATTR, "true");
        info!(node, treatment = ?self.policy.image, "image flagged");
        true
    }
}
