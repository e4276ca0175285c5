use std::path::PathBuf;

use uuid::Uuid;

/// Background work for one asset: transcode the staged original into
/// every configured rendition, then clear scratch storage.
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub asset_id: Uuid,
    pub original_path: PathBuf,
}
