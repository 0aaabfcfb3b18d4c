use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Sentiment label with its softmax probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: String,
    /// Probability in `[0.0, 1.0]`, rounded to two decimal places
    pub confidence: f32,
}

impl Classification {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence: round_confidence(confidence),
        }
    }

    /// Text appended to the output log for this result.
    ///
    /// Confidence uses the shortest form that round-trips: `1.0`, `0.7`, `0.95`.
    pub fn summary(&self) -> String {
        format!("Label: {}\nConfidence: {:?}", self.label, self.confidence)
    }
}

/// Outcome of a single successful model run
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceResult {
    /// Text-to-image wrote a PNG to this path
    Image { path: Utf8PathBuf },

    /// Sentiment classifier produced a label
    Classification(Classification),
}

impl InferenceResult {
    /// Lines appended to the output log when the run completes
    pub fn output_lines(&self) -> Vec<String> {
        match self {
            Self::Image { path } => vec![format!("Image saved to: {}", path)],
            Self::Classification(classification) => vec![classification.summary()],
        }
    }

    pub fn image_path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::Image { path } => Some(path),
            Self::Classification(_) => None,
        }
    }
}

/// Clamp to `[0, 1]` and round to two decimal places.
pub fn round_confidence(score: f32) -> f32 {
    if score.is_nan() {
        return 0.0;
    }
    (score.clamp(0.0, 1.0) * 100.0).round() / 100.0
}
