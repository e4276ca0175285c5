use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::model::{AssetStatus, MediaAsset, Rendition, RenditionState};

#[derive(Debug, Serialize, ToSchema)]
pub struct RenditionView {
    pub state: RenditionState,
    pub key: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MediaAssetResponse {
    pub id: Uuid,
    pub owner_ad_id: i64,
    pub status: AssetStatus,
    pub original_key: String,
    /// Every configured rendition, pending ones included.
    pub renditions: BTreeMap<String, RenditionView>,
    #[schema(value_type = String, format = DateTime)]
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[schema(value_type = String, format = DateTime)]
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl MediaAssetResponse {
    pub fn from_asset(asset: MediaAsset, configured: &[Rendition]) -> Self {
        let mut renditions: BTreeMap<String, RenditionView> = configured
            .iter()
            .map(|r| {
                let view = RenditionView {
                    state: asset.rendition_state(&r.label),
                    key: asset.rendition_keys.get(&r.label).cloned(),
                };
                (r.label.clone(), view)
            })
            .collect();

        // Renditions stored under an older configuration are still reported.
        for (label, key) in &asset.rendition_keys {
            renditions.entry(label.clone()).or_insert_with(|| RenditionView {
                state: RenditionState::Ready,
                key: Some(key.clone()),
            });
        }

        Self {
            id: asset.id,
            owner_ad_id: asset.owner_ad_id,
            status: asset.status,
            original_key: asset.original_key,
            renditions,
            created_at: asset.created_at,
            updated_at: asset.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StreamQuery {
    /// Rendition label such as `720p`. The original is served when absent,
    /// pending or failed.
    pub quality: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteMediaResponse {
    pub deleted_assets: usize,
    pub deleted_objects: usize,
}
