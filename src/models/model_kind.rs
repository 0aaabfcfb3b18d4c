use serde::{Deserialize, Serialize};
use std::fmt;

/// The two pretrained models the application can run.
///
/// The order of [`ModelKind::ALL`] is the order of the entries in the model
/// dropdown, so [`ModelKind::index`] doubles as the combo box index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelKind {
    /// Stable Diffusion text-to-image generation
    #[default]
    TextToImage,

    /// DistilBERT sentiment classification
    TextClassification,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::TextToImage, ModelKind::TextClassification];

    /// Label shown in the model dropdown
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::TextToImage => "Text → Image (Stable Diffusion v2.1)",
            Self::TextClassification => "Text Classification (DistilBERT - Sentiment)",
        }
    }

    /// Short stable identifier
    pub fn id(&self) -> &'static str {
        match self {
            Self::TextToImage => "text2image",
            Self::TextClassification => "textclass",
        }
    }

    /// Name of the wrapper, used in "Loading ... model" status text
    pub fn wrapper_name(&self) -> &'static str {
        match self {
            Self::TextToImage => "TextToImage",
            Self::TextClassification => "TextClassifier",
        }
    }

    /// Notes shown in the model info panel
    pub fn description(&self) -> &'static str {
        match self {
            Self::TextToImage => {
                "Stable Diffusion v2.1 by Stability AI. Generates an image from a text description."
            }
            Self::TextClassification => {
                "DistilBERT fine-tuned on SST-2 by Hugging Face. Classifies text sentiment as POSITIVE or NEGATIVE."
            }
        }
    }

    pub fn index(&self) -> i32 {
        match self {
            Self::TextToImage => 0,
            Self::TextClassification => 1,
        }
    }

    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_text_to_image() {
        assert_eq!(ModelKind::default(), ModelKind::TextToImage);
        assert_eq!(ModelKind::default().index(), 0);
    }

    #[test]
    fn test_index_round_trip() {
        for kind in ModelKind::ALL {
            assert_eq!(ModelKind::from_index(kind.index()), Some(kind));
        }
        assert_eq!(ModelKind::from_index(-1), None);
        assert_eq!(ModelKind::from_index(2), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(ModelKind::TextToImage.id(), "text2image");
        assert_eq!(ModelKind::TextClassification.wrapper_name(), "TextClassifier");
        assert_eq!(
            ModelKind::TextClassification.to_string(),
            "Text Classification (DistilBERT - Sentiment)"
        );
    }
}
