use super::InferenceError;
use candle_core::Device;
use hf_hub::api::sync::Api;
use std::path::PathBuf;

/// Blocking Hugging Face hub client.
///
/// Files are cached under the standard hub cache directory, so only the first
/// fetch of a file downloads anything.
pub struct HubClient {
    api: Api,
}

impl HubClient {
    pub fn new() -> Result<Self, InferenceError> {
        let api = Api::new().map_err(InferenceError::HubInit)?;
        Ok(Self { api })
    }

    /// Fetch a single file from a model repository, returning its local path.
    pub fn fetch(&self, repo: &str, file: &str) -> Result<PathBuf, InferenceError> {
        tracing::debug!("Fetching {} from {}", file, repo);

        let path = self
            .api
            .model(repo.to_string())
            .get(file)
            .map_err(|source| InferenceError::Download {
                repo: repo.to_string(),
                file: file.to_string(),
                source,
            })?;

        tracing::debug!("Resolved {}/{} to {}", repo, file, path.display());
        Ok(path)
    }
}

/// Pick the inference device: first CUDA GPU if available, otherwise CPU.
pub fn select_device(force_cpu: bool) -> Result<Device, InferenceError> {
    if force_cpu {
        tracing::info!("Inference device: CPU (forced)");
        return Ok(Device::Cpu);
    }

    let device = Device::cuda_if_available(0)?;
    if device.is_cuda() {
        tracing::info!("Inference device: CUDA");
    } else {
        tracing::info!("Inference device: CPU");
    }
    Ok(device)
}
