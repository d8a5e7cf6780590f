//! Content units: the discrete pieces of scannable content a scan pass emits.

use serde::{Deserialize, Serialize};

use crate::document::NodeId;

/// The kind of content a unit (and its model pipeline) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// A sentence fragment of visible text.
    Text,
    /// An image reference.
    Image,
}

impl ContentKind {
    /// Returns the kind as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }

    /// Both kinds, in pipeline order.
    pub fn all() -> &'static [ContentKind] {
        &[Self::Text, Self::Image]
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A discrete piece of scannable content.
///
/// Units are created per scan pass and discarded after processing; the
/// fingerprint (the exact text for text units, the source locator for
/// images) is the cache key downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentUnit {
    /// Sequence number within the scan pass.
    pub id: u64,
    /// Subtree the unit was extracted from.
    pub node: NodeId,
    /// Content kind.
    pub kind: ContentKind,
    /// The content itself: sentence text or image source.
    pub raw_content: String,
    /// Stable cache key derived from the content.
    pub fingerprint: String,
}

impl ContentUnit {
    /// A text unit; the fingerprint is the exact sentence.
    pub fn text(id: u64, node: NodeId, sentence: impl Into<String>) -> Self {
        let sentence = sentence.into();
        Self {
            id,
            node,
            kind: ContentKind::Text,
            fingerprint: sentence.clone(),
            raw_content: sentence,
        }
    }

    /// An image unit; the fingerprint is the resolved source locator.
    pub fn image(id: u64, node: NodeId, src: impl Into<String>) -> Self {
        let src = src.into();
        Self {
            id,
            node,
            kind: ContentKind::Image,
            fingerprint: src.clone(),
            raw_content: src,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_as_str() {
        assert_eq!(ContentKind::Text.as_str(), "text");
        assert_eq!(ContentKind::Image.as_str(), "image");
        assert_eq!(ContentKind::all().len(), 2);
    }

    #[test]
    fn kind_serialization() {
        assert_eq!(serde_json::to_string(&ContentKind::Image).unwrap(), "\"image\"");
        let kind: ContentKind = serde_json::from_str("\"text\"").unwrap();
        assert_eq!(kind, ContentKind::Text);
    }

    #[test]
    fn fingerprints_mirror_content() {
        let t = ContentUnit::text(0, 3, "This is a sentence");
        assert_eq!(t.fingerprint, t.raw_content);

        let i = ContentUnit::image(1, 4, "https://e.com/cat.jpg");
        assert_eq!(i.fingerprint, "https://e.com/cat.jpg");
        assert_eq!(i.kind, ContentKind::Image);
    }
}
