//! Rendering surface capability
//!
//! Decoding bytes into a pixel surface, drawing a surface into one of new
//! dimensions, and encoding a surface to JPEG, PNG or WebP. Conversion logic
//! depends only on the trait so it can run against a fake in tests.

pub mod mock;
pub mod processor;

pub use mock::MockImageProcessor;
pub use processor::ImageProcessor;

use crate::models::{OutputFormat, Quality};
use crate::Result;
use async_trait::async_trait;
use image::DynamicImage;

/// A decoded raster with known pixel dimensions.
#[derive(Debug, Clone)]
pub struct Surface {
    pixels: DynamicImage,
}

impl Surface {
    pub fn new(pixels: DynamicImage) -> Self {
        Self { pixels }
    }

    /// Transparent surface of the given size.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::new(DynamicImage::new_rgba8(width, height))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width(), self.height())
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    pub fn into_pixels(self) -> DynamicImage {
        self.pixels
    }
}

#[async_trait]
pub trait SurfaceProvider: Send + Sync {
    async fn decode(&self, data: &[u8]) -> Result<Surface>;

    /// Draw `surface` scaled to fill exactly `width` x `height`, ignoring aspect ratio.
    async fn draw(&self, surface: &Surface, width: u32, height: u32) -> Result<Surface>;

    /// `None` quality means the encoder's default.
    async fn encode(
        &self,
        surface: &Surface,
        format: OutputFormat,
        quality: Option<Quality>,
    ) -> Result<Vec<u8>>;
}
