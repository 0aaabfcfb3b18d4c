use super::{HubClient, ImageGenerator, InferenceError, require_text};
use crate::models::TextToImageSettings;
use camino::{Utf8Path, Utf8PathBuf};
use candle_core::{DType, Device, IndexOp, Module, Tensor};
use candle_transformers::models::stable_diffusion::{
    self, StableDiffusionConfig, clip::ClipTextTransformer, schedulers::Scheduler,
    unet_2d::UNet2DConditionModel, vae::AutoEncoderKL,
};
use tokenizers::Tokenizer;

/// Latent scaling factor of the Stable Diffusion VAE
const VAE_SCALE: f64 = 0.18215;

/// Token used to pad prompts when the CLIP config does not name one
const DEFAULT_PAD_TOKEN: &str = "<|endoftext|>";

/// Stable Diffusion v2.1 text-to-image pipeline.
///
/// Runs classifier-free guidance: every step evaluates the UNet on the
/// unconditional and the prompt embedding as one batch of two.
pub struct TextToImage {
    config: StableDiffusionConfig,
    tokenizer: Tokenizer,
    pad_id: u32,
    text_model: ClipTextTransformer,
    unet: UNet2DConditionModel,
    vae: AutoEncoderKL,
    device: Device,
    dtype: DType,
    steps: usize,
    guidance_scale: f64,
}

impl TextToImage {
    /// Download the tokenizer, text encoder, UNet and VAE, then build them.
    ///
    /// Weights are half precision on GPU and single precision on CPU.
    pub fn load(
        hub: &HubClient,
        settings: &TextToImageSettings,
        device: Device,
    ) -> Result<Self, InferenceError> {
        let use_f16 = device.is_cuda();
        let dtype = if use_f16 { DType::F16 } else { DType::F32 };

        let config = StableDiffusionConfig::v2_1(
            settings.sliced_attention_size,
            settings.height,
            settings.width,
        );

        let tokenizer_path = hub.fetch(&settings.tokenizer_id, "tokenizer.json")?;
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| InferenceError::Tokenizer(e.to_string()))?;
        let pad_token = config.clip.pad_with.as_deref().unwrap_or(DEFAULT_PAD_TOKEN);
        let pad_id = tokenizer.token_to_id(pad_token).ok_or_else(|| {
            InferenceError::Tokenizer(format!("Pad token {pad_token} missing from vocabulary"))
        })?;

        let clip_weights = hub.fetch(&settings.model_id, &weights_file("text_encoder", "model", use_f16))?;
        let unet_weights = hub.fetch(
            &settings.model_id,
            &weights_file("unet", "diffusion_pytorch_model", use_f16),
        )?;
        let vae_weights = hub.fetch(
            &settings.model_id,
            &weights_file("vae", "diffusion_pytorch_model", use_f16),
        )?;

        tracing::info!("Building text encoder");
        let text_model =
            stable_diffusion::build_clip_transformer(&config.clip, clip_weights, &device, DType::F32)?;
        tracing::info!("Building UNet");
        let unet = config.build_unet(unet_weights, &device, 4, false, dtype)?;
        tracing::info!("Building VAE");
        let vae = config.build_vae(vae_weights, &device, dtype)?;

        Ok(Self {
            config,
            tokenizer,
            pad_id,
            text_model,
            unet,
            vae,
            device,
            dtype,
            steps: settings.steps,
            guidance_scale: settings.guidance_scale,
        })
    }

    /// Prompt tokens padded or truncated to the CLIP context length.
    fn tokens(&self, text: &str) -> Result<Tensor, InferenceError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| InferenceError::Tokenizer(e.to_string()))?;
        let ids = pad_tokens(
            encoding.get_ids(),
            self.config.clip.max_position_embeddings,
            self.pad_id,
        );
        Ok(Tensor::new(ids.as_slice(), &self.device)?.unsqueeze(0)?)
    }

    /// Unconditional and prompt embeddings stacked along the batch axis.
    fn text_embeddings(&self, prompt: &str) -> Result<Tensor, InferenceError> {
        let cond = self.text_model.forward(&self.tokens(prompt)?)?;
        let uncond = self.text_model.forward(&self.tokens("")?)?;
        Ok(Tensor::cat(&[uncond, cond], 0)?.to_dtype(self.dtype)?)
    }

    /// Run the denoising loop and decode to a `(3, height, width)` u8 tensor.
    fn sample(&self, prompt: &str) -> Result<Tensor, InferenceError> {
        let text_embeddings = self.text_embeddings(prompt)?;
        let mut scheduler = self.config.build_scheduler(self.steps)?;
        let timesteps = scheduler.timesteps().to_vec();

        let latents = Tensor::randn(
            0f32,
            1f32,
            (1, 4, self.config.height / 8, self.config.width / 8),
            &self.device,
        )?;
        let mut latents = (latents * scheduler.init_noise_sigma())?.to_dtype(self.dtype)?;

        for (index, &timestep) in timesteps.iter().enumerate() {
            tracing::debug!("Denoising step {}/{}", index + 1, timesteps.len());

            let model_input = Tensor::cat(&[&latents, &latents], 0)?;
            let model_input = scheduler.scale_model_input(model_input, timestep)?;
            let noise_pred = self
                .unet
                .forward(&model_input, timestep as f64, &text_embeddings)?;

            let noise_pred = noise_pred.chunk(2, 0)?;
            let (uncond, cond) = (&noise_pred[0], &noise_pred[1]);
            let guided = (uncond + ((cond - uncond)? * self.guidance_scale)?)?;

            latents = scheduler.step(&guided, timestep, &latents)?;
        }

        let image = self.vae.decode(&(&latents / VAE_SCALE)?)?;
        let image = ((image / 2.)? + 0.5)?.to_device(&Device::Cpu)?;
        let image = (image.clamp(0f32, 1.)? * 255.)?.to_dtype(DType::U8)?.i(0)?;
        Ok(image)
    }
}

impl ImageGenerator for TextToImage {
    fn generate_image(
        &self,
        prompt: &str,
        save_path: &Utf8Path,
    ) -> Result<Utf8PathBuf, InferenceError> {
        let prompt = require_text(prompt)?;
        tracing::info!(
            "Generating {}x{} image in {} steps",
            self.config.width,
            self.config.height,
            self.steps
        );

        let image = self.sample(prompt)?;
        save_png(&image, save_path)?;

        tracing::info!("Image written to {}", save_path);
        Ok(save_path.to_path_buf())
    }
}

/// Hub path of a component's safetensors file.
fn weights_file(component: &str, stem: &str, use_f16: bool) -> String {
    if use_f16 {
        format!("{component}/{stem}.fp16.safetensors")
    } else {
        format!("{component}/{stem}.safetensors")
    }
}

/// Truncate or pad token ids to exactly `len`.
fn pad_tokens(ids: &[u32], len: usize, pad_id: u32) -> Vec<u32> {
    let mut tokens: Vec<u32> = ids.iter().copied().take(len).collect();
    tokens.resize(len, pad_id);
    tokens
}

/// Write a `(3, height, width)` u8 tensor as a PNG.
fn save_png(image: &Tensor, path: &Utf8Path) -> Result<(), InferenceError> {
    let (channels, height, width) = image.dims3()?;
    if channels != 3 {
        return Err(InferenceError::Invalid(format!(
            "Expected an RGB image, got {channels} channels"
        )));
    }

    let pixels = image.permute((1, 2, 0))?.flatten_all()?.to_vec1::<u8>()?;
    let buffer = image::RgbImage::from_raw(width as u32, height as u32, pixels)
        .ok_or_else(|| InferenceError::Invalid("Image buffer size mismatch".to_string()))?;

    buffer
        .save(path.as_std_path())
        .map_err(|source| InferenceError::ImageSave {
            path: path.to_path_buf(),
            source,
        })
}
