use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

/// What "Save Last Output As..." would write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    /// Copy the last generated image
    Image { source: Utf8PathBuf },

    /// Write the output log as UTF-8 text
    Text { contents: String },

    /// No image and an empty output log
    Nothing,
}

impl SaveTarget {
    /// Extension appended to a chosen destination that has none
    pub fn default_extension(&self) -> Option<&'static str> {
        match self {
            Self::Image { .. } => Some("png"),
            Self::Text { .. } => Some("txt"),
            Self::Nothing => None,
        }
    }
}

/// Decide what to save.
///
/// The last image wins while it still exists on disk; otherwise the trimmed
/// output text is saved if there is any.
pub fn save_target(last_image: Option<&Utf8Path>, output_text: &str) -> SaveTarget {
    if let Some(path) = last_image.filter(|p| p.exists()) {
        return SaveTarget::Image {
            source: path.to_path_buf(),
        };
    }

    let text = output_text.trim();
    if text.is_empty() {
        SaveTarget::Nothing
    } else {
        SaveTarget::Text {
            contents: text.to_string(),
        }
    }
}

/// Write a save target to `dest`.
///
/// Returns the message shown in the confirmation dialog.
pub fn save_to(target: &SaveTarget, dest: &Utf8Path) -> Result<String> {
    match target {
        SaveTarget::Image { source } => {
            fs::copy(source, dest)
                .with_context(|| format!("Failed to copy {} to {}", source, dest))?;
            tracing::info!("Copied image {} to {}", source, dest);
            Ok(format!("Image saved to {}", dest))
        }
        SaveTarget::Text { contents } => {
            fs::write(dest, contents)
                .with_context(|| format!("Failed to write text output to {}", dest))?;
            tracing::info!("Wrote {} bytes of text output to {}", contents.len(), dest);
            Ok(format!("Text output saved to {}", dest))
        }
        SaveTarget::Nothing => anyhow::bail!("No output to save."),
    }
}

/// Append `extension` when the chosen file name has none.
pub fn with_default_extension(path: Utf8PathBuf, extension: &str) -> Utf8PathBuf {
    if path.extension().is_some() {
        path
    } else {
        path.with_extension(extension)
    }
}

/// Path of a generated image: `<dir>/tti_output_<unix seconds>.png`
pub fn image_output_path(output_dir: &Utf8Path, timestamp: u64) -> Utf8PathBuf {
    output_dir.join(format!("tti_output_{timestamp}.png"))
}

/// Create the output directory and return the path for a new image.
pub fn prepare_image_output(output_dir: &Utf8Path) -> Result<Utf8PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir))?;
    Ok(image_output_path(output_dir, unix_timestamp()))
}

fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
