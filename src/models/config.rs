use serde::{Deserialize, Serialize};

/// Application settings from `Model Demo Data/settings.yaml`
///
/// Every field has a default, so a missing or partial file is valid.
/// Environment variables prefixed with `MODEL_DEMO_` override file values
/// (see [`crate::config::ConfigManager`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub text_to_image: TextToImageSettings,
    pub text_classification: TextClassificationSettings,

    /// Directory generated images are written to
    pub output_dir: String,

    /// Directory for rotating log files
    pub log_dir: String,

    /// Log at debug level instead of info
    pub debug_mode: bool,

    /// Also log to the console
    pub console_logging: bool,

    /// Run inference on the CPU even when a GPU is available
    pub force_cpu: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            text_to_image: TextToImageSettings::default(),
            text_classification: TextClassificationSettings::default(),
            output_dir: "outputs".to_string(),
            log_dir: "logs".to_string(),
            debug_mode: false,
            console_logging: true,
            force_cpu: false,
        }
    }
}

/// Stable Diffusion pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextToImageSettings {
    /// Hub repository holding the UNet, VAE and text encoder weights
    pub model_id: String,

    /// Hub repository holding the CLIP `tokenizer.json`
    pub tokenizer_id: String,

    /// Number of denoising steps
    pub steps: usize,

    /// Classifier-free guidance scale
    pub guidance_scale: f64,

    /// Output height in pixels, multiple of 8; model default when unset
    pub height: Option<usize>,

    /// Output width in pixels, multiple of 8; model default when unset
    pub width: Option<usize>,

    /// Attention slice size, trades speed for memory
    pub sliced_attention_size: Option<usize>,
}

impl Default for TextToImageSettings {
    fn default() -> Self {
        Self {
            model_id: "stabilityai/stable-diffusion-2-1".to_string(),
            tokenizer_id: "openai/clip-vit-base-patch32".to_string(),
            steps: 30,
            guidance_scale: 7.5,
            height: None,
            width: None,
            sliced_attention_size: None,
        }
    }
}

/// DistilBERT sentiment settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextClassificationSettings {
    /// Hub repository holding `config.json` and `model.safetensors`
    pub model_id: String,

    /// Hub repository holding `tokenizer.json`
    pub tokenizer_id: String,

    /// Longest token sequence fed to the model
    pub max_length: usize,
}

impl Default for TextClassificationSettings {
    fn default() -> Self {
        Self {
            model_id: "distilbert-base-uncased-finetuned-sst-2-english".to_string(),
            tokenizer_id: "distilbert-base-uncased".to_string(),
            max_length: 512,
        }
    }
}
