//! Data models and structures
//!
//! Defines the source image, conversion requests and results, the output
//! formats the tools can produce, and environment configuration.

use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
}

impl OutputFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }

    /// Lossless formats ignore any requested quality.
    pub fn is_lossy(&self) -> bool {
        !matches!(self, Self::Png)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    /// Accepts either a MIME type from the format selector or a bare extension.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "image/jpeg" | "image/jpg" | "jpeg" | "jpg" => Ok(Self::Jpeg),
            "image/png" | "png" => Ok(Self::Png),
            "image/webp" | "webp" => Ok(Self::WebP),
            other => Err(Error::UnsupportedMediaType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    Resize,
    Compress,
}

impl ToolKind {
    /// Stem of the downloaded file name.
    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::Resize => "resized-image",
            Self::Compress => "compressed-image",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resize => f.write_str("resize"),
            Self::Compress => f.write_str("compress"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SizeUnit {
    #[default]
    #[serde(rename = "KB")]
    Kb,
    #[serde(rename = "MB")]
    Mb,
}

impl FromStr for SizeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "KB" => Ok(Self::Kb),
            "MB" => Ok(Self::Mb),
            other => Err(Error::InvalidParameters(format!(
                "Unknown size unit '{}'. Expected KB or MB",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSize {
    pub value: f64,
    pub unit: SizeUnit,
}

impl TargetSize {
    pub fn new(value: f64, unit: SizeUnit) -> Self {
        Self { value, unit }
    }

    pub fn in_kb(&self) -> f64 {
        crate::quality::normalize_to_kb(self.value, self.unit)
    }
}

/// Encoder quality in the closed interval [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Quality(f64);

impl Quality {
    pub const MAX: Quality = Quality(1.0);

    /// NaN collapses to the maximum.
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::MAX;
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Scale onto the 1..=100 range codecs take.
    pub fn as_percent(&self) -> u8 {
        ((self.0 * 100.0).round() as u8).clamp(1, 100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ConversionRequest {
    Resize {
        width: u32,
        height: u32,
        format: OutputFormat,
    },
    Compress {
        target: TargetSize,
        format: OutputFormat,
    },
}

impl ConversionRequest {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Resize { width, height, .. } => {
                if *width == 0 || *height == 0 {
                    return Err(Error::InvalidParameters(format!(
                        "Resize dimensions must be positive, got {}x{}",
                        width, height
                    )));
                }
            }
            Self::Compress { target, .. } => {
                if !target.value.is_finite() || target.value <= 0.0 {
                    return Err(Error::InvalidParameters(format!(
                        "Target size must be a positive number, got {}",
                        target.value
                    )));
                }
            }
        }
        Ok(())
    }
}

/// User-supplied file bytes plus what decoding learned about them.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
    pub media_type: String,
    pub width: u32,
    pub height: u32,
}

impl SourceImage {
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn size_label(&self) -> String {
        format_size(self.bytes.len())
    }

    pub fn preview_data_url(&self) -> String {
        data_url(&self.media_type, &self.bytes)
    }
}

/// `"12.34 KB"`, with the MB figure appended once the size passes 1 MB.
pub fn format_size(bytes: usize) -> String {
    let kb = bytes as f64 / 1024.0;
    if bytes > 1024 * 1024 {
        format!("{:.2} KB ({:.2} MB)", kb, kb / 1024.0)
    } else {
        format!("{:.2} KB", kb)
    }
}

#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub quality: Option<Quality>,
}

impl ConversionResult {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn data_url(&self) -> String {
        data_url(self.mime_type(), &self.bytes)
    }
}

fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub output_dir: PathBuf,
    pub default_format: OutputFormat,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let default_format = match std::env::var("IMAGE_MULTITOOL_DEFAULT_FORMAT") {
            Ok(value) => value.parse::<OutputFormat>().map_err(|_| {
                Error::Generic(format!(
                    "IMAGE_MULTITOOL_DEFAULT_FORMAT has unsupported value '{}'",
                    value
                ))
            })?,
            Err(_) => OutputFormat::Jpeg,
        };

        Ok(Self {
            output_dir: std::env::var("IMAGE_MULTITOOL_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("output")),
            default_format,
        })
    }
}
