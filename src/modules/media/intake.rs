use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{MediaError, ValidationError};

const DEFAULT_EXTENSION: &str = "mp4";

/// Validates inbound videos and stages them in local scratch storage.
#[derive(Clone, Debug)]
pub struct UploadIntake {
    scratch_dir: PathBuf,
    max_video_size: u64,
}

impl UploadIntake {
    /// Creates the scratch directory if it does not exist yet.
    pub async fn new(scratch_dir: impl Into<PathBuf>, max_video_size: u64) -> std::io::Result<Self> {
        let scratch_dir = scratch_dir.into();
        tokio::fs::create_dir_all(&scratch_dir).await?;
        info!("Scratch directory: {}", scratch_dir.display());

        Ok(Self {
            scratch_dir,
            max_video_size,
        })
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    pub fn max_video_size(&self) -> u64 {
        self.max_video_size
    }

    pub fn check_content_type(&self, content_type: Option<&str>) -> Result<(), ValidationError> {
        let content_type = content_type.unwrap_or_default();
        if content_type.to_ascii_lowercase().starts_with("video/") {
            Ok(())
        } else {
            Err(ValidationError::NotAVideo(content_type.to_string()))
        }
    }

    pub fn check_size(&self, size: u64) -> Result<(), ValidationError> {
        if size > self.max_video_size {
            return Err(ValidationError::TooLarge {
                size,
                limit: self.max_video_size,
            });
        }
        Ok(())
    }

    /// Validates the payload and writes it to scratch storage under a fresh
    /// name, returning the staged path. Nothing is written when validation fails.
    pub async fn intake(
        &self,
        payload: &[u8],
        content_type: Option<&str>,
        size: u64,
        file_name: Option<&str>,
    ) -> Result<PathBuf, MediaError> {
        self.check_content_type(content_type)?;
        self.check_size(size)?;

        let destination = self.scratch_dir.join(safe_file_name(file_name));
        tokio::fs::write(&destination, payload)
            .await
            .map_err(MediaError::Staging)?;

        debug!(path = %destination.display(), size_bytes = size, "Upload staged");
        Ok(destination)
    }
}

/// Builds `{uuid}.{ext}` from the client-supplied name, keeping only a
/// short alphanumeric extension.
pub fn safe_file_name(original: Option<&str>) -> String {
    let extension = original
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string());

    format!("{}.{}", Uuid::new_v4(), extension)
}

/// Scratch path of a rendition derived from a staged original.
pub fn rendition_path(original: &Path, label: &str) -> PathBuf {
    let stem = original
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("video");
    original.with_file_name(format!("{}-{}.mp4", label, stem))
}

/// Best-effort delete of a scratch file. A missing file is not an error and
/// other failures are logged, never raised.
pub async fn remove_scratch(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Scratch file removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), "Failed to remove scratch file: {}", e),
    }
}
