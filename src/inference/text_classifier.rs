use super::{HubClient, InferenceError, SentimentClassifier, require_text};
use crate::models::{Classification, TextClassificationSettings};
use candle_core::{D, DType, Device, IndexOp, Module, Tensor};
use candle_nn::{Linear, VarBuilder, linear};
use candle_transformers::models::distilbert::{Config, DistilBertModel};
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tokenizers::{Tokenizer, TruncationParams};

/// Fields of the model's `config.json` needed for the classification head
#[derive(Debug, Deserialize)]
struct HeadConfig {
    dim: usize,
    #[serde(default)]
    id2label: IndexMap<String, String>,
}

/// DistilBERT sequence classifier (sentiment analysis).
///
/// The hub checkpoint stores the encoder under `distilbert.*` and the head as
/// `pre_classifier` (dim -> dim) followed by `classifier` (dim -> labels).
pub struct TextClassifier {
    model: DistilBertModel,
    pre_classifier: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    labels: Vec<String>,
    device: Device,
}

impl TextClassifier {
    /// Download config, tokenizer and weights, then build the model.
    pub fn load(
        hub: &HubClient,
        settings: &TextClassificationSettings,
        device: Device,
    ) -> Result<Self, InferenceError> {
        let config_path = hub.fetch(&settings.model_id, "config.json")?;
        let weights_path = hub.fetch(&settings.model_id, "model.safetensors")?;
        let tokenizer_path = hub.fetch(&settings.tokenizer_id, "tokenizer.json")?;

        let config_json = fs::read_to_string(&config_path)
            .map_err(|e| InferenceError::Invalid(format!("Failed to read model config: {e}")))?;
        let config: Config = parse_config(&config_json, &config_path)?;
        let head: HeadConfig = parse_config(&config_json, &config_path)?;
        let labels = label_names(&head.id2label);

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| InferenceError::Tokenizer(e.to_string()))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: settings.max_length,
                ..Default::default()
            }))
            .map_err(|e| InferenceError::Tokenizer(e.to_string()))?;

        // Safety: the weights file is not modified while mapped
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)?
        };
        let model = DistilBertModel::load(vb.pp("distilbert"), &config)?;
        let pre_classifier = linear(head.dim, head.dim, vb.pp("pre_classifier"))?;
        let classifier = linear(head.dim, labels.len(), vb.pp("classifier"))?;

        tracing::info!(
            "Loaded {} with labels [{}]",
            settings.model_id,
            labels.join(", ")
        );

        Ok(Self {
            model,
            pre_classifier,
            classifier,
            tokenizer,
            labels,
            device,
        })
    }

    fn probabilities(&self, text: &str) -> Result<Vec<f32>, InferenceError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| InferenceError::Tokenizer(e.to_string()))?;
        let ids = encoding.get_ids();

        let input_ids = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        // Single unpadded sequence: nothing is masked
        let mask = Tensor::zeros((ids.len(), ids.len()), DType::U8, &self.device)?;

        let hidden = self.model.forward(&input_ids, &mask)?;
        let pooled = hidden.i((.., 0))?;
        let pooled = self.pre_classifier.forward(&pooled)?.relu()?;
        let logits = self.classifier.forward(&pooled)?;

        let probs = candle_nn::ops::softmax(&logits, D::Minus1)?
            .squeeze(0)?
            .to_vec1::<f32>()?;
        Ok(probs)
    }
}

impl SentimentClassifier for TextClassifier {
    fn classify(&self, text: &str) -> Result<Classification, InferenceError> {
        let text = require_text(text)?;
        let probs = self.probabilities(text)?;
        let classification = pick_label(&probs, &self.labels)?;

        tracing::debug!(
            "Classified {} chars as {} ({:.2})",
            text.len(),
            classification.label,
            classification.confidence
        );
        Ok(classification)
    }
}

fn parse_config<T: for<'de> Deserialize<'de>>(
    json: &str,
    path: &Path,
) -> Result<T, InferenceError> {
    serde_json::from_str(json).map_err(|source| InferenceError::ModelConfig {
        path: path.display().to_string(),
        source,
    })
}

/// Label names ordered by class index.
///
/// `id2label` keys are stringified indices; gaps fall back to `LABEL_<i>`.
fn label_names(id2label: &IndexMap<String, String>) -> Vec<String> {
    if id2label.is_empty() {
        return vec!["NEGATIVE".to_string(), "POSITIVE".to_string()];
    }

    let count = id2label
        .keys()
        .filter_map(|k| k.parse::<usize>().ok())
        .max()
        .map_or(0, |max| max + 1);

    (0..count)
        .map(|i| {
            id2label
                .get(&i.to_string())
                .cloned()
                .unwrap_or_else(|| format!("LABEL_{i}"))
        })
        .collect()
}

/// Argmax over class probabilities.
fn pick_label(probs: &[f32], labels: &[String]) -> Result<Classification, InferenceError> {
    let (index, score) = probs
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .ok_or_else(|| InferenceError::Invalid("Classifier produced no scores".to_string()))?;

    let label = labels
        .get(index)
        .cloned()
        .unwrap_or_else(|| format!("LABEL_{index}"));

    Ok(Classification::new(label, score))
}
