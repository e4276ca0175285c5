use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncRead;

use crate::config::settings::StorageSettings;

pub mod local;
pub mod s3;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type MediaReader = Pin<Box<dyn AsyncRead + Send>>;

/// A readable object together with its total length in bytes.
pub struct MediaObject {
    pub reader: MediaReader,
    pub length: u64,
    pub content_type: Option<String>,
}

impl std::fmt::Debug for MediaObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaObject")
            .field("length", &self.length)
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// Size and type of a stored object, without its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub length: u64,
    pub content_type: Option<String>,
}

/// Object storage keyed by opaque strings. Backends are interchangeable.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Uploads a local file under `key` and returns the stored key.
    async fn put(&self, local_path: &Path, key: &str) -> Result<String, StorageError>;

    async fn get(&self, key: &str) -> Result<MediaObject, StorageError>;

    async fn stat(&self, key: &str) -> Result<ObjectMeta, StorageError>;

    /// Reader over the inclusive byte span `start..=end`, which must lie
    /// within the object.
    async fn get_range(&self, key: &str, start: u64, end: u64) -> Result<MediaReader, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}

pub type SharedMediaStore = Arc<dyn MediaStore>;

pub async fn build_media_store(settings: &StorageSettings) -> Result<SharedMediaStore, StorageError> {
    match settings {
        StorageSettings::S3 {
            endpoint,
            bucket,
            access_key,
            secret_key,
        } => Ok(Arc::new(
            s3::StorageService::new(endpoint, bucket, access_key, secret_key).await,
        )),
        StorageSettings::Local { root } => Ok(Arc::new(local::LocalMediaStore::new(root).await?)),
    }
}

pub const DEFAULT_VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Guesses a content type from the key's extension, falling back to `video/mp4`.
pub fn content_type_for(key: &str) -> String {
    mime_guess::from_path(key)
        .first()
        .filter(|m| m.type_() == mime::VIDEO)
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| DEFAULT_VIDEO_CONTENT_TYPE.to_string())
}
