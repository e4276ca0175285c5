use std::sync::Arc;

use crate::config::settings::TranscodeSettings;
use crate::infrastructure::queue::jobs::TranscodeQueue;
use crate::infrastructure::storage::SharedMediaStore;
use crate::modules::ad::repository::AdLookup;
use crate::modules::media::intake::UploadIntake;
use crate::modules::media::repository::MediaRepository;
use crate::workers::ffmpeg::Transcoder;

#[derive(Clone)]
pub struct AppState {
    pub assets: Arc<dyn MediaRepository>,
    pub ads: Arc<dyn AdLookup>,
    pub storage: SharedMediaStore,
    pub transcoder: Arc<dyn Transcoder>,
    pub intake: UploadIntake,
    pub queue: TranscodeQueue,
    pub transcode: TranscodeSettings,
}

impl AppState {
    pub fn new(
        assets: Arc<dyn MediaRepository>,
        ads: Arc<dyn AdLookup>,
        storage: SharedMediaStore,
        transcoder: Arc<dyn Transcoder>,
        intake: UploadIntake,
        queue: TranscodeQueue,
        transcode: TranscodeSettings,
    ) -> Self {
        Self {
            assets,
            ads,
            storage,
            transcoder,
            intake,
            queue,
            transcode,
        }
    }
}
