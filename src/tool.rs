//! Per-operation state machine
//!
//! An [`ImageTool`] owns at most one loaded source and at most one produced
//! result. It moves `Empty -> SourceLoaded -> ResultProduced` and back to
//! `Empty` on [`ImageTool::clear`]. Loads and conversions are asynchronous;
//! a completion that no longer matches the current source, or that was
//! overtaken by a newer conversion request, is dropped.

use crate::export::Download;
use crate::image::{Surface, SurfaceProvider};
use crate::mime;
use crate::models::{
    format_size, ConversionRequest, ConversionResult, OutputFormat, SizeUnit, SourceImage,
    TargetSize, ToolKind,
};
use crate::quality::estimate_quality;
use crate::store::BlobStore;
use crate::{Error, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ToolState {
    Empty,
    SourceLoaded,
    ResultProduced,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Applied(T),
    /// The triggering control would have been disabled: no source, or invalid parameters.
    Disabled,
    /// A newer load, clear or conversion started while this one was in flight.
    Superseded,
}

impl<T> Outcome<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
    pub file_name: Option<String>,
    pub media_type: String,
    pub byte_len: usize,
    pub width: u32,
    pub height: u32,
}

impl From<&SourceImage> for SourceInfo {
    fn from(source: &SourceImage) -> Self {
        Self {
            file_name: source.file_name.clone(),
            media_type: source.media_type.clone(),
            byte_len: source.byte_len(),
            width: source.width,
            height: source.height,
        }
    }
}

impl SourceInfo {
    pub fn size_label(&self) -> String {
        format_size(self.byte_len)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultInfo {
    pub mime_type: String,
    pub byte_len: usize,
    pub width: u32,
    pub height: u32,
    pub quality: Option<f64>,
    pub download: Download,
}

struct Loaded {
    generation: u64,
    source: SourceImage,
    surface: Arc<Surface>,
}

struct Produced {
    result: ConversionResult,
    object_url: String,
}

#[derive(Default)]
struct Inner {
    loaded: Option<Loaded>,
    produced: Option<Produced>,
}

pub struct ImageTool {
    kind: ToolKind,
    surfaces: Arc<dyn SurfaceProvider>,
    store: Arc<dyn BlobStore>,
    inner: Mutex<Inner>,
    generation: AtomicU64,
    conversion: AtomicU64,
}

impl ImageTool {
    pub fn new(
        kind: ToolKind,
        surfaces: Arc<dyn SurfaceProvider>,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            kind,
            surfaces,
            store,
            inner: Mutex::new(Inner::default()),
            generation: AtomicU64::new(0),
            conversion: AtomicU64::new(0),
        }
    }

    pub fn resizer(surfaces: Arc<dyn SurfaceProvider>, store: Arc<dyn BlobStore>) -> Self {
        Self::new(ToolKind::Resize, surfaces, store)
    }

    pub fn compressor(surfaces: Arc<dyn SurfaceProvider>, store: Arc<dyn BlobStore>) -> Self {
        Self::new(ToolKind::Compress, surfaces, store)
    }

    pub fn kind(&self) -> ToolKind {
        self.kind
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn state(&self) -> ToolState {
        let inner = self.inner();
        match (&inner.loaded, &inner.produced) {
            (None, _) => ToolState::Empty,
            (Some(_), None) => ToolState::SourceLoaded,
            (Some(_), Some(_)) => ToolState::ResultProduced,
        }
    }

    pub fn can_convert(&self) -> bool {
        self.inner().loaded.is_some()
    }

    pub fn can_download(&self) -> bool {
        self.inner().produced.is_some()
    }

    pub fn source_info(&self) -> Option<SourceInfo> {
        self.inner()
            .loaded
            .as_ref()
            .map(|loaded| SourceInfo::from(&loaded.source))
    }

    /// Natural dimensions of the loaded source, used to prefill resize fields.
    pub fn default_dimensions(&self) -> Option<(u32, u32)> {
        self.inner()
            .loaded
            .as_ref()
            .map(|loaded| (loaded.source.width, loaded.source.height))
    }

    pub fn preview_data_url(&self) -> Option<String> {
        self.inner()
            .loaded
            .as_ref()
            .map(|loaded| loaded.source.preview_data_url())
    }

    pub fn result(&self) -> Option<ConversionResult> {
        self.inner()
            .produced
            .as_ref()
            .map(|produced| produced.result.clone())
    }

    pub fn download(&self) -> Option<Download> {
        self.inner().produced.as_ref().map(|produced| {
            Download::new(
                self.kind,
                produced.object_url.clone(),
                produced.result.mime_type(),
            )
        })
    }

    /// Decode a user-supplied file and make it the current source.
    ///
    /// The declared media type (from the file picker) wins over the sniffed
    /// signature. A failed decode leaves the tool as it was.
    pub async fn load(
        &self,
        bytes: Vec<u8>,
        declared_media_type: Option<&str>,
    ) -> Result<Outcome<SourceInfo>> {
        self.load_file(bytes, declared_media_type, None).await
    }

    /// Same as [`ImageTool::load`], keeping the picked file's name for display.
    ///
    /// A file rejected by its media type never reaches the decoder and does
    /// not supersede a load already in flight.
    pub async fn load_file(
        &self,
        bytes: Vec<u8>,
        declared_media_type: Option<&str>,
        file_name: Option<&str>,
    ) -> Result<Outcome<SourceInfo>> {
        let media_type = mime::resolve_media_type(declared_media_type, &bytes)
            .ok_or_else(|| Error::UnsupportedMediaType("unrecognized file".to_string()))?;
        if !mime::is_accepted_input(&media_type) {
            return Err(Error::UnsupportedMediaType(media_type));
        }

        let generation = self.next_generation();

        let surface = match self.surfaces.decode(&bytes).await {
            Ok(surface) => surface,
            Err(e) => {
                warn!("[{}] Failed to decode {}: {}", self.kind, media_type, e);
                return Err(e);
            }
        };

        let source = SourceImage {
            file_name: file_name.map(str::to_string),
            bytes,
            media_type,
            width: surface.width(),
            height: surface.height(),
        };
        let info = SourceInfo::from(&source);

        let stale_url = {
            let mut inner = self.inner();
            if self.generation.load(Ordering::SeqCst) != generation {
                drop(inner);
                warn!(
                    "[{}] Discarding stale load (generation {})",
                    self.kind, generation
                );
                return Ok(Outcome::Superseded);
            }
            inner.loaded = Some(Loaded {
                generation,
                source,
                surface: Arc::new(surface),
            });
            inner.produced.take().map(|produced| produced.object_url)
        };
        self.release(stale_url).await;

        info!(
            "[{}] Source loaded: {} {} {}x{} ({})",
            self.kind,
            info.file_name.as_deref().unwrap_or("<unnamed>"),
            info.media_type,
            info.width,
            info.height,
            info.size_label()
        );
        Ok(Outcome::Applied(info))
    }

    /// Drop the source and any result, invalidating in-flight work.
    pub async fn clear(&self) {
        self.next_generation();
        let stale_url = {
            let mut inner = self.inner();
            inner.loaded = None;
            inner.produced.take().map(|produced| produced.object_url)
        };
        self.release(stale_url).await;
        info!("[{}] Cleared", self.kind);
    }

    pub async fn resize(
        &self,
        width: u32,
        height: u32,
        format: OutputFormat,
    ) -> Result<Outcome<ResultInfo>> {
        self.convert(ConversionRequest::Resize {
            width,
            height,
            format,
        })
        .await
    }

    pub async fn compress(
        &self,
        target: f64,
        unit: SizeUnit,
        format: OutputFormat,
    ) -> Result<Outcome<ResultInfo>> {
        self.convert(ConversionRequest::Compress {
            target: TargetSize::new(target, unit),
            format,
        })
        .await
    }

    pub async fn convert(&self, request: ConversionRequest) -> Result<Outcome<ResultInfo>> {
        let request_kind = match request {
            ConversionRequest::Resize { .. } => ToolKind::Resize,
            ConversionRequest::Compress { .. } => ToolKind::Compress,
        };
        if request_kind != self.kind {
            return Err(Error::Invariant(format!(
                "{} tool cannot run a {} request",
                self.kind, request_kind
            )));
        }

        if let Err(e) = request.validate() {
            debug!("[{}] Action disabled: {}", self.kind, e);
            return Ok(Outcome::Disabled);
        }

        let snapshot = self.inner().loaded.as_ref().map(|loaded| {
            (
                loaded.generation,
                Arc::clone(&loaded.surface),
                loaded.source.byte_len(),
            )
        });
        let Some((generation, surface, source_len)) = snapshot else {
            debug!("[{}] Action disabled: no source loaded", self.kind);
            return Ok(Outcome::Disabled);
        };
        let ticket = self.conversion.fetch_add(1, Ordering::SeqCst) + 1;

        let result = match self.render(&surface, source_len, &request).await {
            Ok(result) => result,
            Err(e) => {
                warn!("[{}] Conversion produced no result: {}", self.kind, e);
                return Err(e);
            }
        };

        let object_url = self
            .store
            .create_object_url(&result.bytes, result.mime_type())
            .await?;

        let info = ResultInfo {
            mime_type: result.mime_type().to_string(),
            byte_len: result.bytes.len(),
            width: result.width,
            height: result.height,
            quality: result.quality.map(|q| q.value()),
            download: Download::new(self.kind, object_url.clone(), result.mime_type()),
        };

        let applied = {
            let mut inner = self.inner();
            let current = inner
                .loaded
                .as_ref()
                .is_some_and(|loaded| loaded.generation == generation)
                && self.conversion.load(Ordering::SeqCst) == ticket;
            if current {
                let previous = inner.produced.replace(Produced {
                    result,
                    object_url: object_url.clone(),
                });
                Ok(previous.map(|produced| produced.object_url))
            } else {
                Err(object_url)
            }
        };

        match applied {
            Ok(previous_url) => {
                self.release(previous_url).await;
                info!(
                    "[{}] Result produced: {} {}x{} ({} bytes)",
                    self.kind, info.mime_type, info.width, info.height, info.byte_len
                );
                Ok(Outcome::Applied(info))
            }
            Err(orphan_url) => {
                warn!(
                    "[{}] Discarding result superseded by a newer source or request",
                    self.kind
                );
                self.release(Some(orphan_url)).await;
                Ok(Outcome::Superseded)
            }
        }
    }

    async fn render(
        &self,
        surface: &Surface,
        source_len: usize,
        request: &ConversionRequest,
    ) -> Result<ConversionResult> {
        match *request {
            ConversionRequest::Resize {
                width,
                height,
                format,
            } => {
                let drawn = self.surfaces.draw(surface, width, height).await?;
                let bytes = self.surfaces.encode(&drawn, format, None).await?;
                Ok(ConversionResult {
                    bytes,
                    format,
                    width,
                    height,
                    quality: None,
                })
            }
            ConversionRequest::Compress { target, format } => {
                let quality = estimate_quality(target.in_kb(), source_len);
                debug!(
                    "[{}] Target {:.1} KB from {} bytes gives quality {:.3}",
                    self.kind,
                    target.in_kb(),
                    source_len,
                    quality.value()
                );
                let (width, height) = surface.dimensions();
                let drawn = self.surfaces.draw(surface, width, height).await?;
                let bytes = self.surfaces.encode(&drawn, format, Some(quality)).await?;
                Ok(ConversionResult {
                    bytes,
                    format,
                    width,
                    height,
                    quality: Some(quality),
                })
            }
        }
    }

    async fn release(&self, object_url: Option<String>) {
        if let Some(url) = object_url {
            if let Err(e) = self.store.revoke_object_url(&url).await {
                warn!("[{}] Failed to revoke {}: {}", self.kind, url, e);
            }
        }
    }
}
