use std::collections::{BTreeMap, BTreeSet};

use anyhow::anyhow;
use serde::Serialize;
use sqlx::FromRow;
use sqlx::types::Json;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// A target output of the transcoder, e.g. `720p` at height 720.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Rendition {
    pub label: String,
    pub height: u32,
}

impl Rendition {
    pub fn from_height(height: u32) -> Self {
        Self {
            label: format!("{}p", height),
            height,
        }
    }
}

pub fn original_key(asset_id: Uuid, extension: &str) -> String {
    format!("videos/{}/original.{}", asset_id, extension)
}

pub fn rendition_key(asset_id: Uuid, label: &str) -> String {
    format!("videos/{}/{}.mp4", asset_id, label)
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetStatus {
    OriginalStored,
    Transcoding,
    Completed,
    Degraded,
    Failed,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::OriginalStored => "ORIGINAL_STORED",
            AssetStatus::Transcoding => "TRANSCODING",
            AssetStatus::Completed => "COMPLETED",
            AssetStatus::Degraded => "DEGRADED",
            AssetStatus::Failed => "FAILED",
        }
    }
}

impl TryFrom<String> for AssetStatus {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "ORIGINAL_STORED" => Ok(AssetStatus::OriginalStored),
            "TRANSCODING" => Ok(AssetStatus::Transcoding),
            "COMPLETED" => Ok(AssetStatus::Completed),
            "DEGRADED" => Ok(AssetStatus::Degraded),
            "FAILED" => Ok(AssetStatus::Failed),
            other => Err(anyhow!("Unknown asset status '{}'", other)),
        }
    }
}

/// One uploaded video and the renditions derived from it.
///
/// `original_key` is always set: a record is only created after the
/// original has been stored. A label missing from both `rendition_keys`
/// and `failed_renditions` is still pending.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaAsset {
    pub id: Uuid,
    pub owner_ad_id: i64,
    pub original_key: String,
    pub rendition_keys: BTreeMap<String, String>,
    pub failed_renditions: BTreeSet<String>,
    pub status: AssetStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl MediaAsset {
    pub fn new(id: Uuid, owner_ad_id: i64, original_key: String) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id,
            owner_ad_id,
            original_key,
            rendition_keys: BTreeMap::new(),
            failed_renditions: BTreeSet::new(),
            status: AssetStatus::OriginalStored,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn record_rendition(&mut self, label: &str, key: String) {
        self.failed_renditions.remove(label);
        self.rendition_keys.insert(label.to_string(), key);
        self.touch();
    }

    pub fn record_failure(&mut self, label: &str) {
        if !self.rendition_keys.contains_key(label) {
            self.failed_renditions.insert(label.to_string());
        }
        self.touch();
    }

    /// Settles the status once every configured rendition has been attempted.
    pub fn finish(&mut self, renditions: &[Rendition]) {
        let stored = renditions
            .iter()
            .filter(|r| self.rendition_keys.contains_key(&r.label))
            .count();

        self.status = if stored == renditions.len() {
            AssetStatus::Completed
        } else if stored == 0 {
            AssetStatus::Failed
        } else {
            AssetStatus::Degraded
        };
        self.touch();
    }

    pub fn rendition_state(&self, label: &str) -> RenditionState {
        if self.rendition_keys.contains_key(label) {
            RenditionState::Ready
        } else if self.failed_renditions.contains(label) {
            RenditionState::Failed
        } else {
            RenditionState::Pending
        }
    }

    /// Every storage object owned by this asset.
    pub fn storage_keys(&self) -> Vec<&str> {
        std::iter::once(self.original_key.as_str())
            .chain(self.rendition_keys.values().map(String::as_str))
            .collect()
    }

    pub fn touch(&mut self) {
        self.updated_at = OffsetDateTime::now_utc();
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RenditionState {
    Pending,
    Ready,
    Failed,
}

// Row shape of `media_assets`
#[derive(Debug, FromRow)]
pub struct MediaAssetRow {
    pub id: Uuid,
    pub owner_ad_id: i64,
    pub original_key: String,
    pub rendition_keys: Json<BTreeMap<String, String>>,
    pub failed_renditions: Vec<String>,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<MediaAssetRow> for MediaAsset {
    type Error = anyhow::Error;

    fn try_from(row: MediaAssetRow) -> Result<Self, Self::Error> {
        let status = AssetStatus::try_from(row.status)
            .map_err(|e| e.context(format!("media asset {}", row.id)))?;

        Ok(Self {
            id: row.id,
            owner_ad_id: row.owner_ad_id,
            original_key: row.original_key,
            rendition_keys: row.rendition_keys.0,
            failed_renditions: row.failed_renditions.into_iter().collect(),
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
