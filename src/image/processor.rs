use super::{Surface, SurfaceProvider};
use crate::models::{OutputFormat, Quality};
use crate::{Error, Result};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{ExtendedColorType, ImageFormat};
use std::io::Cursor;

/// JPEG quality used when the caller leaves it unset, the same 0.92 a canvas defaults to.
pub const DEFAULT_JPEG_QUALITY: u8 = 92;

/// Bilinear, close to canvas image smoothing.
const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Surface provider backed by the `image` crate. Pixel work runs on the
/// blocking pool so callers on the async runtime stay responsive.
#[derive(Debug, Clone, Default)]
pub struct ImageProcessor;

impl ImageProcessor {
    pub fn new() -> Self {
        Self
    }

    fn decode_sync(data: &[u8]) -> Result<Surface> {
        let pixels = image::load_from_memory(data).map_err(|e| Error::Decode(e.to_string()))?;
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(Error::Decode("image has no pixels".to_string()));
        }
        Ok(Surface::new(pixels))
    }

    fn draw_sync(surface: Surface, width: u32, height: u32) -> Surface {
        if surface.dimensions() == (width, height) {
            return surface;
        }
        Surface::new(surface.pixels().resize_exact(width, height, RESIZE_FILTER))
    }

    fn encode_sync(
        surface: Surface,
        format: OutputFormat,
        quality: Option<Quality>,
    ) -> Result<Vec<u8>> {
        let pixels = surface.into_pixels();
        let mut buffer = Vec::new();

        match format {
            OutputFormat::Jpeg => {
                let percent = quality
                    .map(|q| q.as_percent())
                    .unwrap_or(DEFAULT_JPEG_QUALITY);
                let encoder = JpegEncoder::new_with_quality(&mut buffer, percent);
                pixels
                    .to_rgb8()
                    .write_with_encoder(encoder)
                    .map_err(|e| Error::Encode(format!("JPEG encode failed: {}", e)))?;
            }
            OutputFormat::Png => {
                // Lossless: any quality passes through untouched.
                pixels
                    .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
                    .map_err(|e| Error::Encode(format!("PNG encode failed: {}", e)))?;
            }
            OutputFormat::WebP => {
                let mut rgba = pixels.to_rgba8();
                if let Some(quality) = quality.filter(|q| q.value() < 1.0) {
                    quantize_rgb(rgba.as_mut(), quality.as_percent());
                }
                let (width, height) = rgba.dimensions();
                WebPEncoder::new_lossless(Cursor::new(&mut buffer))
                    .encode(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(|e| Error::Encode(format!("WebP encode failed: {}", e)))?;
            }
        }

        if buffer.is_empty() {
            return Err(Error::Encode(format!("{} encoder produced no data", format)));
        }
        Ok(buffer)
    }
}

/// The pure-Rust WebP encoder is lossless only, so lossy quality is
/// approximated by reducing the colour palette before encoding. Alpha is kept.
fn quantize_rgb(data: &mut [u8], quality: u8) {
    if quality >= 100 {
        return;
    }
    let levels = levels_from_quality(quality);
    let step = 255.0 / (levels as f32 - 1.0);
    for pixel in data.chunks_exact_mut(4) {
        for channel in pixel.iter_mut().take(3) {
            let bucket = (f32::from(*channel) / step).round();
            *channel = (bucket * step).round().clamp(0.0, 255.0) as u8;
        }
    }
}

fn levels_from_quality(quality: u8) -> u16 {
    if quality >= 100 {
        return 256;
    }
    let normalized = (quality as f32).clamp(1.0, 100.0) / 100.0;
    let levels = 2.0 + normalized * normalized * 254.0;
    levels.round().clamp(2.0, 256.0) as u16
}

async fn run_blocking<T, F>(task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| Error::Invariant(format!("Image processing task join error: {}", e)))?
}

#[async_trait]
impl SurfaceProvider for ImageProcessor {
    async fn decode(&self, data: &[u8]) -> Result<Surface> {
        let data = data.to_vec();
        let surface = run_blocking(move || Self::decode_sync(&data)).await?;
        tracing::debug!("Decoded surface {}x{}", surface.width(), surface.height());
        Ok(surface)
    }

    async fn draw(&self, surface: &Surface, width: u32, height: u32) -> Result<Surface> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidParameters(format!(
                "Cannot draw into a {}x{} surface",
                width, height
            )));
        }
        let surface = surface.clone();
        run_blocking(move || Ok(Self::draw_sync(surface, width, height))).await
    }

    async fn encode(
        &self,
        surface: &Surface,
        format: OutputFormat,
        quality: Option<Quality>,
    ) -> Result<Vec<u8>> {
        if !format.is_lossy() && quality.is_some() {
            tracing::debug!("Ignoring quality for lossless {}", format);
        }
        let surface = surface.clone();
        run_blocking(move || Self::encode_sync(surface, format, quality)).await
    }
}
