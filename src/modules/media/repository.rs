use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use super::model::{MediaAsset, MediaAssetRow};
use anyhow::Result;

/// Persistence for media asset records.
#[async_trait]
pub trait MediaRepository: Send + Sync {
    async fn create(&self, asset: &MediaAsset) -> Result<Uuid>;

    /// Overwrites the mutable columns of an existing record. Returns `false`
    /// when the record no longer exists.
    async fn update(&self, asset: &MediaAsset) -> Result<bool>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MediaAsset>>;

    /// Newest first.
    async fn find_by_owner(&self, owner_ad_id: i64) -> Result<Vec<MediaAsset>>;

    async fn delete(&self, id: Uuid) -> Result<()>;
}

#[derive(Clone)]
pub struct PgMediaRepository {
    pool: PgPool,
}

impl PgMediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MediaRepository for PgMediaRepository {
    async fn create(&self, asset: &MediaAsset) -> Result<Uuid> {
        let failed: Vec<String> = asset.failed_renditions.iter().cloned().collect();

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO media_assets
                (id, owner_ad_id, original_key, rendition_keys, failed_renditions, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(asset.id)
        .bind(asset.owner_ad_id)
        .bind(&asset.original_key)
        .bind(Json(&asset.rendition_keys))
        .bind(&failed)
        .bind(asset.status.as_str())
        .bind(asset.created_at)
        .bind(asset.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn update(&self, asset: &MediaAsset) -> Result<bool> {
        let failed: Vec<String> = asset.failed_renditions.iter().cloned().collect();

        let result = sqlx::query(
            r#"
            UPDATE media_assets
            SET rendition_keys = $2, failed_renditions = $3, status = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(asset.id)
        .bind(Json(&asset.rendition_keys))
        .bind(&failed)
        .bind(asset.status.as_str())
        .bind(asset.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MediaAsset>> {
        let row = sqlx::query_as::<_, MediaAssetRow>("SELECT * FROM media_assets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(MediaAsset::try_from).transpose()
    }

    async fn find_by_owner(&self, owner_ad_id: i64) -> Result<Vec<MediaAsset>> {
        let rows = sqlx::query_as::<_, MediaAssetRow>(
            "SELECT * FROM media_assets WHERE owner_ad_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_ad_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MediaAsset::try_from).collect()
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM media_assets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
