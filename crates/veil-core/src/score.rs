//! Classification results: ordered label/score pairs from the scoring oracle.

use serde::{Deserialize, Serialize};

/// Candidate labels submitted with every image classification request.
pub const IMAGE_CANDIDATE_LABELS: &[&str] = &["safe", "unsafe", "inappropriate", "adult content"];

/// The subset of candidate labels treated as unsafe-like by the redaction
/// engine's image decision rule.
pub const UNSAFE_IMAGE_LABELS: &[&str] = &["unsafe", "inappropriate", "adult content"];

/// One scored label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    /// Label name.
    pub label: String,
    /// Confidence score in [0, 1].
    pub score: f32,
}

impl LabelScore {
    /// Creates a scored label.
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Ordered sequence of label/score pairs.
///
/// For text there is a single implicit toxicity axis; for images the labels
/// are scored independently and need not sum to one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Scores in oracle order.
    pub scores: Vec<LabelScore>,
}

impl ClassificationResult {
    /// Wraps a score list.
    pub fn new(scores: Vec<LabelScore>) -> Self {
        Self { scores }
    }

    /// A single-label result.
    pub fn single(label: impl Into<String>, score: f32) -> Self {
        Self {
            scores: vec![LabelScore::new(label, score)],
        }
    }

    /// The score for an exact label, if present.
    pub fn score_for(&self, label: &str) -> Option<f32> {
        self.scores
            .iter()
            .find(|s| s.label == label)
            .map(|s| s.score)
    }

    /// The highest-scoring entry.
    pub fn top(&self) -> Option<&LabelScore> {
        self.scores
            .iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
    }

    /// True if any score is strictly greater than `threshold`.
    pub fn any_above(&self, threshold: f32) -> bool {
        self.scores.iter().any(|s| s.score > threshold)
    }

    /// The maximum score across the given labels, 0.0 when none are present.
    pub fn max_over(&self, labels: &[&str]) -> f32 {
        self.scores
            .iter()
            .filter(|s| labels.contains(&s.label.as_str()))
            .map(|s| s.score)
            .fold(0.0, f32::max)
    }
}

/// The image candidate labels as owned strings, for oracle requests.
pub fn image_candidate_labels() -> Vec<String> {
    IMAGE_CANDIDATE_LABELS.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_lookup_and_top() {
        let result = ClassificationResult::new(vec![
            LabelScore::new("safe", 0.1),
            LabelScore::new("unsafe", 0.7),
            LabelScore::new("adult content", 0.4),
        ]);
        assert_eq!(result.score_for("unsafe"), Some(0.7));
        assert_eq!(result.score_for("missing"), None);
        assert_eq!(result.top().unwrap().label, "unsafe");
    }

    #[test]
    fn any_above_is_strict() {
        let result = ClassificationResult::single("toxic", 0.8);
        assert!(!result.any_above(0.8));
        assert!(result.any_above(0.79));
    }

    #[test]
    fn max_over_unsafe_labels() {
        let result = ClassificationResult::new(vec![
            LabelScore::new("safe", 0.9),
            LabelScore::new("inappropriate", 0.3),
            LabelScore::new("adult content", 0.6),
        ]);
        assert_eq!(result.max_over(UNSAFE_IMAGE_LABELS), 0.6);
        assert_eq!(ClassificationResult::default().max_over(UNSAFE_IMAGE_LABELS), 0.0);
    }

    #[test]
    fn serialization_round_trip() {
        let result = ClassificationResult::single("toxic", 0.91);
        let json = serde_json::to_string(&result).unwrap();
        let back: ClassificationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
