use super::BlobStore;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Blob {
    data: Vec<u8>,
    content_type: String,
}

/// Process-local blob registry handing out `blob:` URLs.
#[derive(Clone)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, Blob>>>,
    origin: String,
    created_count: Arc<Mutex<usize>>,
    revoked_count: Arc<Mutex<usize>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(Mutex::new(HashMap::new())),
            origin: "image-multitool".to_string(),
            created_count: Arc::new(Mutex::new(0)),
            revoked_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_origin(mut self, origin: String) -> Self {
        self.origin = origin;
        self
    }

    pub fn live_count(&self) -> usize {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner).contains_key(url)
    }

    pub fn content_type(&self, url: &str) -> Option<String> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .map(|blob| blob.content_type.clone())
    }

    pub fn get_created_count(&self) -> usize {
        *self.created_count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_revoked_count(&self) -> usize {
        *self.revoked_count.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn create_object_url(&self, data: &[u8], content_type: &str) -> Result<String> {
        let url = format!("blob:{}/{}", self.origin, Uuid::new_v4());
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner).insert(
            url.clone(),
            Blob {
                data: data.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        *self.created_count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(url)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .map(|blob| blob.data.clone())
            .ok_or_else(|| Error::BlobNotFound(url.to_string()))
    }

    /// Revoking an unknown URL is a no-op.
    async fn revoke_object_url(&self, url: &str) -> Result<()> {
        if self.blobs.lock().unwrap_or_else(PoisonError::into_inner).remove(url).is_some() {
            *self.revoked_count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_fetch() {
        let store = MemoryBlobStore::new();

        let url = store
            .create_object_url(b"image bytes", "image/png")
            .await
            .unwrap();

        assert!(url.starts_with("blob:image-multitool/"));
        assert_eq!(store.fetch(&url).await.unwrap(), b"image bytes");
        assert_eq!(store.content_type(&url).as_deref(), Some("image/png"));
        assert_eq!(store.get_created_count(), 1);
        assert_eq!(store.live_count(), 1);
    }

    #[test]
    fn test_fetch_unknown_url_is_not_found() {
        let store = MemoryBlobStore::new();
        let result = tokio_test::block_on(store.fetch("blob:image-multitool/missing"));
        assert!(matches!(result, Err(Error::BlobNotFound(_))));
    }

    #[tokio::test]
    async fn test_urls_are_unique() {
        let store = MemoryBlobStore::new();

        let first = store.create_object_url(b"a", "image/jpeg").await.unwrap();
        let second = store.create_object_url(b"a", "image/jpeg").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(store.live_count(), 2);
    }

    #[tokio::test]
    async fn test_revoke_releases_blob() {
        let store = MemoryBlobStore::new().with_origin("test".to_string());
        let url = store.create_object_url(b"a", "image/jpeg").await.unwrap();

        store.revoke_object_url(&url).await.unwrap();
        store.revoke_object_url(&url).await.unwrap();

        assert!(!store.contains(&url));
        assert_eq!(store.get_revoked_count(), 1);
        let result = store.fetch(&url).await;
        assert!(result.unwrap_err().to_string().contains("Blob not found"));
    }
}
