use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tracing::info;

use super::{MediaObject, MediaReader, MediaStore, ObjectMeta, StorageError, content_type_for};

/// Filesystem-backed media store rooted at a single directory.
#[derive(Clone, Debug)]
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        info!("✅ Local media store at {}", root.display());
        Ok(Self { root })
    }

    async fn open(&self, key: &str) -> Result<fs::File, StorageError> {
        let path = self.key_to_path(key)?;
        match fs::File::open(&path).await {
            Ok(f) => Ok(f),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Keys are relative paths made of plain segments; anything that could
    /// escape the root is rejected.
    fn key_to_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }

        let relative = Path::new(key);
        let all_normal = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !all_normal {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn put(&self, local_path: &Path, key: &str) -> Result<String, StorageError> {
        let destination = self.key_to_path(key)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }

        let bytes = fs::copy(local_path, &destination)
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Failed to copy into {}: {}", key, e)))?;

        info!(key = %key, size_bytes = bytes, "Object stored locally");
        Ok(key.to_string())
    }

    async fn get(&self, key: &str) -> Result<MediaObject, StorageError> {
        let file = self.open(key).await?;
        let length = file.metadata().await?.len();

        Ok(MediaObject {
            reader: Box::pin(file),
            length,
            content_type: Some(content_type_for(key)),
        })
    }

    async fn stat(&self, key: &str) -> Result<ObjectMeta, StorageError> {
        let file = self.open(key).await?;
        Ok(ObjectMeta {
            length: file.metadata().await?.len(),
            content_type: Some(content_type_for(key)),
        })
    }

    async fn get_range(&self, key: &str, start: u64, end: u64) -> Result<MediaReader, StorageError> {
        let mut file = self.open(key).await?;
        file.seek(SeekFrom::Start(start)).await?;
        Ok(Box::pin(file.take(end.saturating_sub(start) + 1)))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.key_to_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(key = %key, "Object deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn put_get_delete_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path().join("media")).await.unwrap();
        let source = dir.path().join("clip.mp4");
        tokio::fs::write(&source, b"0123456789").await.unwrap();

        let key = store.put(&source, "videos/abc/original.mp4").await.unwrap();
        assert_eq!(key, "videos/abc/original.mp4");
        assert!(store.exists(&key).await.unwrap());

        let mut object = store.get(&key).await.unwrap();
        assert_eq!(object.length, 10);
        assert_eq!(object.content_type.as_deref(), Some("video/mp4"));
        let mut body = Vec::new();
        object.reader.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"0123456789");

        store.delete(&key).await.unwrap();
        assert!(!store.exists(&key).await.unwrap());
        // deleting again is a no-op
        store.delete(&key).await.unwrap();
    }

    #[tokio::test]
    async fn ranged_read_starts_at_offset() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path()).await.unwrap();
        let source = dir.path().join("clip.mp4");
        tokio::fs::write(&source, b"0123456789").await.unwrap();
        store.put(&source, "videos/abc/720p.mp4").await.unwrap();

        let meta = store.stat("videos/abc/720p.mp4").await.unwrap();
        assert_eq!(meta.length, 10);

        let mut reader = store.get_range("videos/abc/720p.mp4", 3, 6).await.unwrap();
        let mut body = Vec::new();
        reader.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"3456");

        let err = store.stat("videos/abc/1080p.mp4").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path()).await.unwrap();
        let err = store.get("videos/nope.mp4").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn rejects_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path()).await.unwrap();
        for key in ["../etc/passwd", "/etc/passwd", "videos/../../x", ""] {
            let err = store.get(key).await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidKey(_)), "key {key:?}");
        }
    }
}
