//! Error handling and custom error types
//!
//! Provides unified error handling across the library using thiserror.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] dotenvy::Error),

    #[error("Decode failure: {0}")]
    Decode(String),

    #[error("Encode failure: {0}")]
    Encode(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Generic error: {0}")]
    Generic(String),
}

pub type Result<T> = std::result::Result<T, Error>;
