//! Application orchestration for one-shot conversions from the command line.

use crate::export::save_download;
use crate::image::{ImageProcessor, SurfaceProvider};
use crate::mime;
use crate::models::{Config, OutputFormat, SizeUnit, ToolKind};
use crate::store::{BlobStore, MemoryBlobStore};
use crate::tool::{ImageTool, Outcome, ResultInfo, SourceInfo};
use crate::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Width/height default to the source's natural dimensions.
    Resize {
        input: PathBuf,
        width: Option<u32>,
        height: Option<u32>,
        format: OutputFormat,
    },
    Compress {
        input: PathBuf,
        target: f64,
        unit: SizeUnit,
        format: OutputFormat,
    },
}

impl Command {
    fn kind(&self) -> ToolKind {
        match self {
            Self::Resize { .. } => ToolKind::Resize,
            Self::Compress { .. } => ToolKind::Compress,
        }
    }

    fn input(&self) -> &Path {
        match self {
            Self::Resize { input, .. } | Self::Compress { input, .. } => input,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub tool: ToolKind,
    pub input: PathBuf,
    pub source: SourceInfo,
    pub result: ResultInfo,
    pub output_path: PathBuf,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub surfaces: Arc<dyn SurfaceProvider>,
    pub store: Arc<dyn BlobStore>,
}

/// Loads a file into a fresh tool, converts it and saves the download.
pub struct App {
    surfaces: Arc<dyn SurfaceProvider>,
    store: Arc<dyn BlobStore>,
    output_dir: PathBuf,
}

impl App {
    pub fn with_services(services: AppServices, output_dir: PathBuf) -> Self {
        Self {
            surfaces: services.surfaces,
            store: services.store,
            output_dir,
        }
    }

    pub fn new(config: &Config) -> Self {
        Self::with_services(
            AppServices {
                surfaces: Arc::new(ImageProcessor::new()),
                store: Arc::new(MemoryBlobStore::new()),
            },
            config.output_dir.clone(),
        )
    }

    pub async fn run(&self, command: Command) -> Result<ConversionReport> {
        let kind = command.kind();
        let input = command.input().to_path_buf();
        info!("[{}] Reading {}", kind, input.display());

        let bytes = tokio::fs::read(&input).await?;
        let declared = input
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(mime::media_type_for_extension);
        let file_name = input.file_name().and_then(|name| name.to_str());

        let tool = ImageTool::new(kind, Arc::clone(&self.surfaces), Arc::clone(&self.store));
        let loaded = tool.load_file(bytes, declared, file_name).await?;
        let source = Self::expect_applied(loaded, "load")?;

        // The tool owns the result's object URL; clear it whether or not the save worked.
        let saved = self.convert_and_save(&tool, &source, command).await;
        tool.clear().await;
        let (result, output_path) = saved?;

        Ok(ConversionReport {
            tool: kind,
            input,
            source,
            result,
            output_path,
        })
    }

    async fn convert_and_save(
        &self,
        tool: &ImageTool,
        source: &SourceInfo,
        command: Command,
    ) -> Result<(ResultInfo, PathBuf)> {
        let kind = tool.kind();
        let outcome = match command {
            Command::Resize {
                width,
                height,
                format,
                ..
            } => {
                let width = width.unwrap_or(source.width);
                let height = height.unwrap_or(source.height);
                info!("[{}] Resizing to {}x{} as {}", kind, width, height, format);
                tool.resize(width, height, format).await?
            }
            Command::Compress {
                target,
                unit,
                format,
                ..
            } => {
                info!(
                    "[{}] Compressing {} toward {} {:?} as {}",
                    kind,
                    source.size_label(),
                    target,
                    unit,
                    format
                );
                tool.compress(target, unit, format).await?
            }
        };
        let result = Self::expect_applied(outcome, "conversion")?;

        let download = tool
            .download()
            .ok_or_else(|| Error::Invariant("Result produced without a download".to_string()))?;
        let output_path = save_download(self.store.as_ref(), &download, &self.output_dir).await?;
        Ok((result, output_path))
    }

    fn expect_applied<T>(outcome: Outcome<T>, step: &str) -> Result<T> {
        match outcome {
            Outcome::Applied(value) => Ok(value),
            Outcome::Disabled => Err(Error::InvalidParameters(format!(
                "{} is disabled for these parameters",
                step
            ))),
            Outcome::Superseded => Err(Error::Invariant(format!(
                "{} was superseded by another request",
                step
            ))),
        }
    }
}
