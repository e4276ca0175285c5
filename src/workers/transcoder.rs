use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};

use async_channel::Receiver;
use futures_util::FutureExt;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::infrastructure::storage::StorageError;
use crate::modules::media::events::TranscodeJob;
use crate::modules::media::intake::{remove_scratch, rendition_path};
use crate::modules::media::model::{AssetStatus, MediaAsset, Rendition, rendition_key};
use crate::state::AppState;
use crate::workers::ffmpeg::TranscodeError;

#[derive(Debug, Error)]
enum RenditionError {
    #[error("transcode failed: {0}")]
    Transcode(#[from] TranscodeError),

    #[error("upload failed: {0}")]
    Storage(#[from] StorageError),
}

/// Spawns `count` workers sharing one job receiver. Each worker runs one
/// job at a time, so `count` bounds concurrent ffmpeg processes.
pub fn start_transcoder_workers(state: AppState, receiver: Receiver<TranscodeJob>, count: usize) -> Vec<JoinHandle<()>> {
    info!("🎥 Starting {} transcoder worker(s)...", count);

    (0..count.max(1))
        .map(|worker| {
            let state = state.clone();
            let receiver = receiver.clone();
            tokio::spawn(async move {
                while let Ok(job) = receiver.recv().await {
                    info!(worker, asset_id = %job.asset_id, "📦 Received transcoding job");
                    process_job(&state, &job).await;
                }
                info!(worker, "Transcoder worker stopped, queue closed");
            })
        })
        .collect()
}

/// Runs one job to completion. Never fails: every outcome ends up in the
/// asset record and scratch files are removed no matter what happened.
pub async fn process_job(state: &AppState, job: &TranscodeJob) {
    let outcome = AssertUnwindSafe(run_job(state, job)).catch_unwind().await;
    if outcome.is_err() {
        error!(asset_id = %job.asset_id, "❌ Transcoding job panicked");
    }

    cleanup_scratch(&job.original_path, &state.transcode.renditions).await;
}

async fn run_job(state: &AppState, job: &TranscodeJob) {
    let mut asset = match state.assets.find_by_id(job.asset_id).await {
        Ok(Some(a)) => a,
        Ok(None) => {
            warn!(asset_id = %job.asset_id, "Asset vanished before transcoding, dropping job");
            return;
        }
        Err(e) => {
            error!(asset_id = %job.asset_id, "Failed to load asset: {}", e);
            return;
        }
    };

    asset.status = AssetStatus::Transcoding;
    asset.touch();
    if persist(state, &asset).await == Persisted::Gone {
        warn!(asset_id = %asset.id, "Asset deleted before transcoding started, dropping job");
        return;
    }

    for rendition in &state.transcode.renditions {
        match produce_rendition(state, &asset, &job.original_path, rendition).await {
            Ok(key) => {
                info!(asset_id = %asset.id, rendition = %rendition.label, key = %key, "✅ Rendition stored");
                asset.record_rendition(&rendition.label, key.clone());
                if persist(state, &asset).await == Persisted::Gone {
                    // The delete already ran, so nobody else will remove this object.
                    discard_object(state, &key).await;
                    warn!(asset_id = %asset.id, "Asset deleted during transcoding, stopping job");
                    return;
                }
            }
            Err(e) => {
                error!(asset_id = %asset.id, rendition = %rendition.label, "❌ Rendition failed: {}", e);
                asset.record_failure(&rendition.label);
                if persist(state, &asset).await == Persisted::Gone {
                    warn!(asset_id = %asset.id, "Asset deleted during transcoding, stopping job");
                    return;
                }
            }
        }
    }

    asset.finish(&state.transcode.renditions);
    persist(state, &asset).await;
    info!(asset_id = %asset.id, status = asset.status.as_str(), "Transcoding job finished");
}

/// Transcodes and uploads one rendition, retrying up to the configured
/// number of attempts. The last error is returned.
async fn produce_rendition(
    state: &AppState,
    asset: &MediaAsset,
    original: &Path,
    rendition: &Rendition,
) -> Result<String, RenditionError> {
    let attempts = state.transcode.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match try_rendition(state, asset, original, rendition).await {
            Ok(key) => return Ok(key),
            Err(e) if attempt < attempts => {
                warn!(
                    asset_id = %asset.id,
                    rendition = %rendition.label,
                    attempt,
                    "Rendition attempt failed, retrying: {}",
                    e
                );
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn try_rendition(
    state: &AppState,
    asset: &MediaAsset,
    original: &Path,
    rendition: &Rendition,
) -> Result<String, RenditionError> {
    let output: PathBuf = state.transcoder.convert(original, rendition).await?;
    let key = rendition_key(asset.id, &rendition.label);
    Ok(state.storage.put(&output, &key).await?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persisted {
    /// Written, or the write failed and was logged. Later renditions still land.
    Kept,
    /// The record no longer exists.
    Gone,
}

async fn persist(state: &AppState, asset: &MediaAsset) -> Persisted {
    match state.assets.update(asset).await {
        Ok(true) => Persisted::Kept,
        Ok(false) => Persisted::Gone,
        Err(e) => {
            error!(asset_id = %asset.id, "Failed to update asset record: {}", e);
            Persisted::Kept
        }
    }
}

async fn discard_object(state: &AppState, key: &str) {
    if let Err(e) = state.storage.delete(key).await {
        error!(key = %key, "Failed to remove rendition of a deleted asset: {}", e);
    }
}

async fn cleanup_scratch(original: &Path, renditions: &[Rendition]) {
    for rendition in renditions {
        remove_scratch(&rendition_path(original, &rendition.label)).await;
    }
    remove_scratch(original).await;
}
