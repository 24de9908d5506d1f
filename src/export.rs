//! Result exporter
//!
//! Names a produced result for download and writes it out.

use crate::models::ToolKind;
use crate::store::BlobStore;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Unknown MIME types download as `jpg`.
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

pub fn file_name_for(kind: ToolKind, mime: &str) -> String {
    format!("{}.{}", kind.file_stem(), extension_for_mime(mime))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Download {
    pub file_name: String,
    pub object_url: String,
    pub mime_type: String,
}

impl Download {
    pub fn new(kind: ToolKind, object_url: String, mime_type: &str) -> Self {
        Self {
            file_name: file_name_for(kind, mime_type),
            object_url,
            mime_type: mime_type.to_string(),
        }
    }
}

/// Write the download's bytes into `dir` under its file name, replacing any previous file.
pub async fn save_download(
    store: &dyn BlobStore,
    download: &Download,
    dir: &Path,
) -> Result<PathBuf> {
    let data = store.fetch(&download.object_url).await?;
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(&download.file_name);
    tokio::fs::write(&path, &data).await?;
    tracing::info!("Saved {} ({} bytes)", path.display(), data.len());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlobStore;
    use tempfile::tempdir;

    #[test]
    fn test_extension_mapping() {
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("image/png"), "png");
        assert_eq!(extension_for_mime("image/webp"), "webp");
        assert_eq!(extension_for_mime("image/gif"), "jpg");
        assert_eq!(extension_for_mime(""), "jpg");
    }

    #[test]
    fn test_file_names() {
        assert_eq!(file_name_for(ToolKind::Resize, "image/png"), "resized-image.png");
        assert_eq!(
            file_name_for(ToolKind::Compress, "image/jpeg"),
            "compressed-image.jpg"
        );
        assert_eq!(
            file_name_for(ToolKind::Compress, "image/webp"),
            "compressed-image.webp"
        );
    }

    #[tokio::test]
    async fn test_save_download_writes_file() {
        let dir = tempdir().unwrap();
        let store = MemoryBlobStore::new();
        let url = store
            .create_object_url(b"png bytes", "image/png")
            .await
            .unwrap();
        let download = Download::new(ToolKind::Resize, url, "image/png");

        let path = save_download(&store, &download, &dir.path().join("nested"))
            .await
            .unwrap();

        assert!(path.ends_with("nested/resized-image.png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"png bytes");
    }

    #[tokio::test]
    async fn test_save_revoked_download_fails() {
        let dir = tempdir().unwrap();
        let store = MemoryBlobStore::new();
        let url = store.create_object_url(b"x", "image/jpeg").await.unwrap();
        store.revoke_object_url(&url).await.unwrap();

        let download = Download::new(ToolKind::Compress, url, "image/jpeg");
        assert!(save_download(&store, &download, dir.path()).await.is_err());
        assert!(!dir.path().join("compressed-image.jpg").exists());
    }
}
