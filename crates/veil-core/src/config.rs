//! Filter configuration.
//!
//! Persisted externally as JSON under [`FILTER_CONFIG_KEY`]; the core only
//! reads and writes it through the storage collaborator. Missing keys fall
//! back to disabled filters at the default strictness.

use serde::{Deserialize, Serialize};

use crate::unit::ContentKind;

/// Storage key for the persisted [`FilterConfig`].
pub const FILTER_CONFIG_KEY: &str = "filterConfig";

/// Storage key for the session replacement counter.
pub const REPLACEMENT_COUNT_KEY: &str = "filterTotalReplacements";

/// Strictness assumed when none is persisted.
pub const DEFAULT_STRICTNESS: u8 = 80;

/// Per-kind filter switch and strictness percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterToggle {
    /// Whether this kind is filtered at all.
    pub is_enabled: bool,
    /// User-facing strictness in [0, 100].
    pub strictness: u8,
}

impl Default for FilterToggle {
    fn default() -> Self {
        Self {
            is_enabled: false,
            strictness: DEFAULT_STRICTNESS,
        }
    }
}

impl FilterToggle {
    /// An enabled toggle at the given strictness.
    pub fn enabled(strictness: u8) -> Self {
        Self {
            is_enabled: true,
            strictness,
        }
    }

    /// The decision threshold this strictness maps to (strictness / 100).
    pub fn threshold(&self) -> f32 {
        f32::from(self.strictness.min(100)) / 100.0
    }
}

/// Filter configuration for both content kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterConfig {
    /// Text filtering switch.
    pub text_filter: FilterToggle,
    /// Image filtering switch.
    pub image_filter: FilterToggle,
}

impl FilterConfig {
    /// The toggle for a content kind.
    pub fn toggle(&self, kind: ContentKind) -> &FilterToggle {
        match kind {
            ContentKind::Text => &self.text_filter,
            ContentKind::Image => &self.image_filter,
        }
    }

    /// Mutable toggle for a content kind.
    pub fn toggle_mut(&mut self, kind: ContentKind) -> &mut FilterToggle {
        match kind {
            ContentKind::Text => &mut self.text_filter,
            ContentKind::Image => &mut self.image_filter,
        }
    }

    /// True if at least one kind is filtered.
    pub fn any_enabled(&self) -> bool {
        self.text_filter.is_enabled || self.image_filter.is_enabled
    }
}
