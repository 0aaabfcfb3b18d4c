// Image display adapter - scales generated images into the canvas
//
// Decoding and resizing happen off the UI thread. The result is a
// SharedPixelBuffer, which is Send; the slint::Image itself is built
// on the event loop thread.

use crate::services::runner::ImagePresenter;
use anyhow::{Context, Result};
use camino::Utf8Path;
use image::{DynamicImage, RgbaImage, imageops::FilterType};
use slint::{Rgba8Pixel, SharedPixelBuffer};
use std::sync::{Arc, Mutex};

/// Canvas size used before the window has been laid out
pub const DEFAULT_CANVAS: (u32, u32) = (600, 320);

/// Canvas size captured on the UI thread when a run starts
pub type CanvasSize = Arc<Mutex<(u32, u32)>>;

/// Canvas size in whole pixels.
///
/// Layouts report zero or fractional sizes before the first paint, so
/// anything smaller than one pixel falls back to [`DEFAULT_CANVAS`].
pub fn canvas_box(width: f32, height: f32) -> (u32, u32) {
    if width.is_finite() && height.is_finite() && width >= 1.0 && height >= 1.0 {
        (width as u32, height as u32)
    } else {
        DEFAULT_CANVAS
    }
}

/// Downscale `image` to fit within `max_width` x `max_height`, keeping its
/// aspect ratio. Images that already fit are returned unchanged.
pub fn fit_within(image: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    if image.width() <= max_width && image.height() <= max_height {
        return image;
    }
    image.resize(max_width.max(1), max_height.max(1), FilterType::Lanczos3)
}

/// Open the image at `path` and scale it for the canvas.
pub fn load_thumbnail(path: &Utf8Path, max_width: u32, max_height: u32) -> Result<RgbaImage> {
    let image = image::open(path.as_std_path())
        .with_context(|| format!("Failed to open image: {}", path))?;
    let thumbnail = fit_within(image, max_width, max_height);
    tracing::debug!(
        "Prepared {}x{} thumbnail of {}",
        thumbnail.width(),
        thumbnail.height(),
        path
    );
    Ok(thumbnail.to_rgba8())
}

pub fn to_pixel_buffer(image: &RgbaImage) -> SharedPixelBuffer<Rgba8Pixel> {
    SharedPixelBuffer::clone_from_slice(image.as_raw(), image.width(), image.height())
}

/// Presents generated images by handing a scaled pixel buffer to `show`.
///
/// `show` is called from the inference worker, so it must forward the
/// buffer to the event loop rather than touch the window.
pub struct ThumbnailPresenter<F> {
    canvas: CanvasSize,
    show: F,
}

impl<F> ThumbnailPresenter<F>
where
    F: Fn(SharedPixelBuffer<Rgba8Pixel>) + Send + Sync,
{
    pub fn new(canvas: CanvasSize, show: F) -> Self {
        Self { canvas, show }
    }

    fn canvas_size(&self) -> (u32, u32) {
        self.canvas.lock().map(|slot| *slot).unwrap_or(DEFAULT_CANVAS)
    }
}

impl<F> ImagePresenter for ThumbnailPresenter<F>
where
    F: Fn(SharedPixelBuffer<Rgba8Pixel>) + Send + Sync,
{
    fn present(&self, path: &Utf8Path) -> Result<()> {
        let (max_width, max_height) = self.canvas_size();
        let thumbnail = load_thumbnail(path, max_width, max_height)?;
        (self.show)(to_pixel_buffer(&thumbnail));
        Ok(())
    }
}
