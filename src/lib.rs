//! Image multitool - resize and compress-to-target-size for raster images
//!
//! Two independent conversions sit on top of an injected rendering surface:
//! stretching a source to exact pixel dimensions, and re-encoding a source
//! at a quality estimated from a target byte budget.

pub mod app;
pub mod error;
pub mod export;
pub mod image;
pub mod mime;
pub mod models;
pub mod quality;
pub mod store;
pub mod tool;

pub use error::{Error, Result};
