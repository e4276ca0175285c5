//! In-memory collaborators and a ready-made `AppState` for unit tests.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_channel::Receiver;
use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;
use tempfile::TempDir;
use uuid::Uuid;

use crate::common::upload::UploadedVideo;
use crate::config::settings::TranscodeSettings;
use crate::infrastructure::queue::jobs::TranscodeQueue;
use crate::infrastructure::storage::local::LocalMediaStore;
use crate::modules::ad::repository::AdLookup;
use crate::modules::media::events::TranscodeJob;
use crate::modules::media::intake::{UploadIntake, rendition_path};
use crate::modules::media::model::{MediaAsset, Rendition, original_key};
use crate::modules::media::repository::MediaRepository;
use crate::state::AppState;
use crate::workers::ffmpeg::{TranscodeError, Transcoder};

#[derive(Default)]
pub struct InMemoryMediaRepository {
    assets: Mutex<HashMap<Uuid, MediaAsset>>,
    fail_writes: AtomicBool,
}

impl InMemoryMediaRepository {
    pub fn get(&self, id: Uuid) -> Option<MediaAsset> {
        self.assets.lock().unwrap().get(&id).cloned()
    }

    pub fn insert(&self, asset: MediaAsset) {
        self.assets.lock().unwrap().insert(asset.id, asset);
    }

    pub fn is_empty(&self) -> bool {
        self.assets.lock().unwrap().is_empty()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("database unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl MediaRepository for InMemoryMediaRepository {
    async fn create(&self, asset: &MediaAsset) -> anyhow::Result<Uuid> {
        self.check_writable()?;
        self.insert(asset.clone());
        Ok(asset.id)
    }

    async fn update(&self, asset: &MediaAsset) -> anyhow::Result<bool> {
        self.check_writable()?;
        let mut assets = self.assets.lock().unwrap();
        match assets.get_mut(&asset.id) {
            Some(existing) => {
                *existing = asset.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<MediaAsset>> {
        Ok(self.get(id))
    }

    async fn find_by_owner(&self, owner_ad_id: i64) -> anyhow::Result<Vec<MediaAsset>> {
        let mut owned: Vec<MediaAsset> = self
            .assets
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.owner_ad_id == owner_ad_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        self.check_writable()?;
        self.assets.lock().unwrap().remove(&id);
        Ok(())
    }
}

pub struct StaticAdLookup(BTreeSet<i64>);

#[async_trait]
impl AdLookup for StaticAdLookup {
    async fn exists(&self, ad_id: i64) -> anyhow::Result<bool> {
        Ok(self.0.contains(&ad_id))
    }
}

/// Writes a small file per rendition instead of running ffmpeg. Labels can be
/// made to fail always, or a fixed number of times before succeeding.
#[derive(Clone, Default)]
pub struct ScriptedTranscoder {
    failing: BTreeSet<String>,
    flaky: Arc<Mutex<HashMap<String, u32>>>,
    calls: Arc<Mutex<HashMap<String, u32>>>,
}

impl ScriptedTranscoder {
    pub fn failing(labels: &[&str]) -> Self {
        Self {
            failing: labels.iter().map(|l| l.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn flaky(label: &str, failures: u32) -> Self {
        let transcoder = Self::default();
        transcoder.flaky.lock().unwrap().insert(label.to_string(), failures);
        transcoder
    }

    pub fn calls(&self, label: &str) -> u32 {
        self.calls.lock().unwrap().get(label).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Transcoder for ScriptedTranscoder {
    async fn convert(&self, input: &Path, rendition: &Rendition) -> Result<PathBuf, TranscodeError> {
        *self.calls.lock().unwrap().entry(rendition.label.clone()).or_default() += 1;

        if self.failing.contains(&rendition.label) {
            return Err(TranscodeError::ExitCode(Some(1)));
        }
        {
            let mut flaky = self.flaky.lock().unwrap();
            if let Some(remaining) = flaky.get_mut(&rendition.label) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(TranscodeError::ExitCode(Some(1)));
                }
            }
        }

        let output = rendition_path(input, &rendition.label);
        tokio::fs::write(&output, format!("{} rendition", rendition.label)).await?;
        Ok(output)
    }
}

pub fn video_upload(payload: &[u8]) -> UploadedVideo {
    UploadedVideo {
        bytes: Bytes::copy_from_slice(payload),
        content_type: Some("video/mp4".to_string()),
        file_name: Some("clip.mp4".to_string()),
    }
}

pub struct TestContextBuilder {
    max_video_size: u64,
    transcoder: ScriptedTranscoder,
    max_attempts: u32,
}

impl TestContextBuilder {
    pub fn max_video_size(mut self, limit: u64) -> Self {
        self.max_video_size = limit;
        self
    }

    pub fn transcoder(mut self, transcoder: ScriptedTranscoder) -> Self {
        self.transcoder = transcoder;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub async fn build(self) -> TestContext {
        let dir = tempfile::tempdir().unwrap();
        let storage_root = dir.path().join("media");
        let storage = LocalMediaStore::new(&storage_root).await.unwrap();
        let intake = UploadIntake::new(dir.path().join("scratch"), self.max_video_size)
            .await
            .unwrap();
        let (queue, jobs) = TranscodeQueue::unbounded();
        let assets = Arc::new(InMemoryMediaRepository::default());
        let transcode = TranscodeSettings {
            max_attempts: self.max_attempts,
            ..TranscodeSettings::default()
        };

        let state = AppState::new(
            assets.clone(),
            Arc::new(StaticAdLookup(BTreeSet::from([1, 2]))),
            Arc::new(storage),
            Arc::new(self.transcoder),
            intake,
            queue,
            transcode,
        );

        TestContext {
            state,
            assets,
            jobs,
            storage_root,
            _dir: dir,
        }
    }
}

/// Ads 1 and 2 exist; storage and scratch live in a temp dir.
pub struct TestContext {
    pub state: AppState,
    pub assets: Arc<InMemoryMediaRepository>,
    pub jobs: Receiver<TranscodeJob>,
    storage_root: PathBuf,
    _dir: TempDir,
}

impl TestContext {
    pub fn builder() -> TestContextBuilder {
        TestContextBuilder {
            max_video_size: crate::config::settings::DEFAULT_MAX_VIDEO_SIZE,
            transcoder: ScriptedTranscoder::default(),
            max_attempts: 1,
        }
    }

    pub async fn new() -> Self {
        Self::builder().build().await
    }

    pub async fn with_limit(limit: u64) -> Self {
        Self::builder().max_video_size(limit).build().await
    }

    pub async fn with_transcoder(transcoder: ScriptedTranscoder) -> Self {
        Self::builder().transcoder(transcoder).build().await
    }

    pub fn router(&self) -> Router {
        crate::app::create_app(self.state.clone())
    }

    /// Writes a file into scratch storage as if it had just been uploaded.
    pub async fn stage(&self, payload: &[u8]) -> PathBuf {
        let path = self.state.intake.scratch_dir().join(format!("{}.mp4", Uuid::new_v4()));
        tokio::fs::write(&path, payload).await.unwrap();
        path
    }

    pub async fn store_object(&self, key: &str, payload: &[u8]) {
        let path = self.storage_root.join(key);
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(path, payload).await.unwrap();
    }

    /// Stores an original and records a fresh asset for it.
    pub async fn seed_asset(&self, owner_ad_id: i64, payload: &[u8]) -> MediaAsset {
        let id = Uuid::new_v4();
        let key = original_key(id, "mp4");
        self.store_object(&key, payload).await;
        let asset = MediaAsset::new(id, owner_ad_id, key);
        self.assets.insert(asset.clone());
        asset
    }

    /// Replaces the storage root with a plain file so every put fails.
    pub async fn storage_root_blocked(&self) {
        tokio::fs::remove_dir_all(&self.storage_root).await.unwrap();
        tokio::fs::write(&self.storage_root, b"blocked").await.unwrap();
    }

    /// Keys of every object currently in storage.
    pub async fn stored_objects(&self) -> Vec<String> {
        let mut keys = Vec::new();
        let mut pending = vec![self.storage_root.clone()];
        while let Some(dir) = pending.pop() {
            let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
                continue;
            };
            while let Some(entry) = entries.next_entry().await.unwrap() {
                let path = entry.path();
                if entry.file_type().await.unwrap().is_dir() {
                    pending.push(path);
                } else if let Ok(relative) = path.strip_prefix(&self.storage_root) {
                    keys.push(relative.to_string_lossy().into_owned());
                }
            }
        }
        keys.sort();
        keys
    }
}
