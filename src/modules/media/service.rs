use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::MediaError;
use super::events::TranscodeJob;
use super::intake::remove_scratch;
use super::model::{MediaAsset, RenditionState, original_key};
use crate::common::upload::UploadedVideo;
use crate::state::AppState;

pub struct MediaService;

impl MediaService {
    pub async fn ensure_ad_exists(state: &AppState, ad_id: i64) -> Result<(), MediaError> {
        if state.ads.exists(ad_id).await? {
            Ok(())
        } else {
            Err(MediaError::AdNotFound(ad_id))
        }
    }

    /// Validates and stages an upload, stores the original and schedules
    /// transcoding. Returns as soon as the record exists.
    pub async fn ingest(state: &AppState, ad_id: i64, upload: UploadedVideo) -> Result<MediaAsset, MediaError> {
        let staged = state
            .intake
            .intake(
                &upload.bytes,
                upload.content_type.as_deref(),
                upload.bytes.len() as u64,
                upload.file_name.as_deref(),
            )
            .await?;

        let asset = Self::submit(state, &staged, ad_id).await?;
        Self::schedule_transcode(state, &asset, staged).await;
        Ok(asset)
    }

    /// Uploads the staged original and persists a new asset that only has
    /// its original key. Either both steps happen or neither is visible:
    /// on failure the staged file is removed and an already uploaded
    /// original is deleted again.
    pub async fn submit(state: &AppState, staged: &Path, owner_ad_id: i64) -> Result<MediaAsset, MediaError> {
        let asset_id = Uuid::new_v4();
        let extension = staged
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        let key = original_key(asset_id, extension);

        let stored_key = match state.storage.put(staged, &key).await {
            Ok(k) => k,
            Err(e) => {
                error!(asset_id = %asset_id, key = %key, "Failed to store original: {}", e);
                remove_scratch(staged).await;
                return Err(e.into());
            }
        };

        let asset = MediaAsset::new(asset_id, owner_ad_id, stored_key);
        if let Err(e) = state.assets.create(&asset).await {
            error!(asset_id = %asset_id, "Failed to persist media asset: {}", e);
            if let Err(cleanup) = state.storage.delete(&asset.original_key).await {
                warn!(key = %asset.original_key, "Orphaned original could not be removed: {}", cleanup);
            }
            remove_scratch(staged).await;
            return Err(e.into());
        }

        info!(asset_id = %asset.id, ad_id = owner_ad_id, key = %asset.original_key, "Original stored");
        Ok(asset)
    }

    /// Fire-and-forget: queues the background transcode and returns.
    pub async fn schedule_transcode(state: &AppState, asset: &MediaAsset, original_path: PathBuf) {
        let job = TranscodeJob {
            asset_id: asset.id,
            original_path,
        };

        if let Err(job) = state.queue.enqueue(job) {
            error!(asset_id = %asset.id, "Transcode queue is closed, renditions will not be produced");
            remove_scratch(&job.original_path).await;
        }
    }

    pub async fn get_asset(state: &AppState, id: Uuid) -> Result<MediaAsset, MediaError> {
        state
            .assets
            .find_by_id(id)
            .await?
            .ok_or(MediaError::AssetNotFound(id))
    }

    pub async fn latest_for_ad(state: &AppState, ad_id: i64) -> Result<Option<MediaAsset>, MediaError> {
        Self::ensure_ad_exists(state, ad_id).await?;
        let assets = state.assets.find_by_owner(ad_id).await?;
        Ok(assets.into_iter().next())
    }

    /// Picks the storage key to stream for an asset. A rendition that is not
    /// ready yet is served from the original instead.
    pub async fn resolve_stream_key(state: &AppState, id: Uuid, quality: Option<&str>) -> Result<String, MediaError> {
        let asset = Self::get_asset(state, id).await?;

        let Some(label) = quality else {
            return Ok(asset.original_key);
        };

        match asset.rendition_state(label) {
            RenditionState::Ready => Ok(asset.rendition_keys[label].clone()),
            other => {
                debug!(asset_id = %id, rendition = label, state = ?other, "Rendition unavailable, serving original");
                Ok(asset.original_key)
            }
        }
    }

    /// Removes every asset of an ad. Storage objects go first; a record is
    /// only deleted once all of its objects are gone.
    pub async fn delete_for_ad(state: &AppState, ad_id: i64) -> Result<(usize, usize), MediaError> {
        let assets = state.assets.find_by_owner(ad_id).await?;
        let mut deleted_objects = 0;

        for asset in &assets {
            for key in asset.storage_keys() {
                state.storage.delete(key).await?;
                deleted_objects += 1;
            }
            state.assets.delete(asset.id).await?;
            info!(asset_id = %asset.id, ad_id, "Media asset deleted");
        }

        Ok((assets.len(), deleted_objects))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::MediaStore;
    use crate::modules::media::model::AssetStatus;
    use crate::test_support::{TestContext, video_upload};

    #[tokio::test]
    async fn submit_stores_original_and_returns_before_renditions() {
        let ctx = TestContext::new().await;
        let asset = MediaService::ingest(&ctx.state, 1, video_upload(b"video bytes")).await.unwrap();

        assert_eq!(asset.status, AssetStatus::OriginalStored);
        assert!(asset.rendition_keys.is_empty());
        assert!(asset.original_key.starts_with(&format!("videos/{}/original.", asset.id)));
        assert!(ctx.state.storage.exists(&asset.original_key).await.unwrap());

        let persisted = ctx.assets.get(asset.id).unwrap();
        assert_eq!(persisted.original_key, asset.original_key);

        // the job is queued, not run
        assert_eq!(ctx.state.queue.pending(), 1);
        let job = ctx.jobs.recv().await.unwrap();
        assert_eq!(job.asset_id, asset.id);
        assert!(job.original_path.exists());
    }

    #[tokio::test]
    async fn failed_original_upload_creates_no_record() {
        let ctx = TestContext::new().await;
        let staged = ctx.stage(b"video").await;

        // a storage root that is a plain file makes every put fail
        ctx.storage_root_blocked().await;
        let err = MediaService::submit(&ctx.state, &staged, 1).await.unwrap_err();

        assert!(matches!(err, MediaError::Storage(_)));
        assert!(ctx.assets.is_empty());
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn failed_record_create_removes_uploaded_original() {
        let ctx = TestContext::new().await;
        ctx.assets.fail_writes(true);
        let staged = ctx.stage(b"video").await;

        let err = MediaService::submit(&ctx.state, &staged, 1).await.unwrap_err();

        assert!(matches!(err, MediaError::Repository(_)));
        assert!(ctx.assets.is_empty());
        assert!(ctx.stored_objects().await.is_empty());
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn oversize_upload_is_rejected_before_storage() {
        let ctx = TestContext::with_limit(16).await;
        let err = MediaService::ingest(&ctx.state, 1, video_upload(&[0u8; 32])).await.unwrap_err();

        assert!(matches!(err, MediaError::Validation(_)));
        assert!(ctx.stored_objects().await.is_empty());
        assert!(ctx.assets.is_empty());
        assert_eq!(ctx.state.queue.pending(), 0);
    }

    #[tokio::test]
    async fn unknown_ad_is_not_found() {
        let ctx = TestContext::new().await;
        let err = MediaService::ensure_ad_exists(&ctx.state, 404).await.unwrap_err();
        assert!(matches!(err, MediaError::AdNotFound(404)));
    }

    #[tokio::test]
    async fn stream_key_falls_back_to_original_while_pending() {
        let ctx = TestContext::new().await;
        let mut asset = MediaService::ingest(&ctx.state, 1, video_upload(b"v")).await.unwrap();

        let key = MediaService::resolve_stream_key(&ctx.state, asset.id, Some("720p")).await.unwrap();
        assert_eq!(key, asset.original_key);

        asset.record_rendition("720p", "videos/x/720p.mp4".into());
        ctx.state.assets.update(&asset).await.unwrap();
        let key = MediaService::resolve_stream_key(&ctx.state, asset.id, Some("720p")).await.unwrap();
        assert_eq!(key, "videos/x/720p.mp4");

        let err = MediaService::resolve_stream_key(&ctx.state, Uuid::new_v4(), None).await.unwrap_err();
        assert!(matches!(err, MediaError::AssetNotFound(_)));
    }

    #[tokio::test]
    async fn delete_for_ad_removes_objects_then_records() {
        let ctx = TestContext::new().await;
        let asset = MediaService::ingest(&ctx.state, 1, video_upload(b"v")).await.unwrap();
        let other = MediaService::ingest(&ctx.state, 2, video_upload(b"w")).await.unwrap();

        let (assets, objects) = MediaService::delete_for_ad(&ctx.state, 1).await.unwrap();

        assert_eq!((assets, objects), (1, 1));
        assert!(ctx.assets.get(asset.id).is_none());
        assert!(!ctx.state.storage.exists(&asset.original_key).await.unwrap());
        assert!(ctx.assets.get(other.id).is_some());
        assert!(ctx.state.storage.exists(&other.original_key).await.unwrap());
    }
}
