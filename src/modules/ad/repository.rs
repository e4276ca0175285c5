use async_trait::async_trait;
use sqlx::PgPool;
use anyhow::Result;

/// Read-only view of the ads owned by the listing service.
#[async_trait]
pub trait AdLookup: Send + Sync {
    async fn exists(&self, ad_id: i64) -> Result<bool>;
}

#[derive(Clone)]
pub struct PgAdRepository {
    pool: PgPool,
}

impl PgAdRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AdLookup for PgAdRepository {
    async fn exists(&self, ad_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM ads WHERE id = $1)")
            .bind(ad_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}
