//! Model wrappers and the session model cache.
//!
//! Both wrappers fetch pretrained weights from the Hugging Face hub and run them
//! with `candle`. They sit behind small traits so the runner and its tests do not
//! depend on multi-gigabyte downloads:
//!
//! - [`ImageGenerator`]: implemented by [`TextToImage`] (Stable Diffusion v2.1)
//! - [`SentimentClassifier`]: implemented by [`TextClassifier`] (DistilBERT SST-2)
//! - [`ModelLoader`]: constructs wrappers; [`HubModelLoader`] is the real one
//! - [`ModelCache`]: holds at most one live instance of each wrapper

pub mod cache;
pub mod hub;
pub mod text_classifier;
pub mod text_to_image;

pub use cache::ModelCache;
pub use hub::{HubClient, select_device};
pub use text_classifier::TextClassifier;
pub use text_to_image::TextToImage;

use crate::models::{Classification, Settings};
use camino::{Utf8Path, Utf8PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while loading or running a model
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Input text is empty")]
    EmptyInput,

    #[error("Failed to initialise the model hub client: {0}")]
    HubInit(#[source] hf_hub::api::sync::ApiError),

    #[error("Failed to fetch {file} from {repo}: {source}")]
    Download {
        repo: String,
        file: String,
        source: hf_hub::api::sync::ApiError,
    },

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Invalid model config {path}: {source}")]
    ModelConfig {
        path: String,
        source: serde_json::Error,
    },

    #[error("Model error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Failed to save image to {path}: {source}")]
    ImageSave {
        path: Utf8PathBuf,
        source: image::ImageError,
    },

    #[error("Model cache lock poisoned")]
    LockPoisoned,

    #[error("{0}")]
    Invalid(String),
}

/// Text-to-image pipeline
pub trait ImageGenerator: Send + Sync {
    /// Generate an image for `prompt`, write it to `save_path` and return that path.
    fn generate_image(&self, prompt: &str, save_path: &Utf8Path)
    -> Result<Utf8PathBuf, InferenceError>;
}

/// Sentiment classification pipeline
pub trait SentimentClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Classification, InferenceError>;
}

/// Constructs model wrappers on demand
#[cfg_attr(test, mockall::automock)]
pub trait ModelLoader: Send + Sync {
    fn load_image_generator(&self) -> Result<Arc<dyn ImageGenerator>, InferenceError>;

    fn load_classifier(&self) -> Result<Arc<dyn SentimentClassifier>, InferenceError>;
}

/// Loads wrappers from the Hugging Face hub
#[derive(Debug, Clone)]
pub struct HubModelLoader {
    settings: Settings,
}

impl HubModelLoader {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

impl ModelLoader for HubModelLoader {
    fn load_image_generator(&self) -> Result<Arc<dyn ImageGenerator>, InferenceError> {
        let device = select_device(self.settings.force_cpu)?;
        let hub = HubClient::new()?;
        let model = TextToImage::load(&hub, &self.settings.text_to_image, device)?;
        Ok(Arc::new(model))
    }

    fn load_classifier(&self) -> Result<Arc<dyn SentimentClassifier>, InferenceError> {
        let device = select_device(self.settings.force_cpu)?;
        let hub = HubClient::new()?;
        let model = TextClassifier::load(&hub, &self.settings.text_classification, device)?;
        Ok(Arc::new(model))
    }
}

/// Reject empty or whitespace-only input.
pub(crate) fn require_text(text: &str) -> Result<&str, InferenceError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(InferenceError::EmptyInput);
    }
    Ok(trimmed)
}
