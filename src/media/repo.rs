use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use super::repo_types::{Media, NewMedia};

#[async_trait]
pub trait MediaRepository: Send + Sync {
    async fn attach(&self, media: &NewMedia) -> anyhow::Result<Media>;

    /// Oldest first.
    async fn list(&self, user_id: i64, collection: &str) -> anyhow::Result<Vec<Media>>;
}

const COLUMNS: &str = "id, user_id, collection, file_name, mime_type, size, s3_key, created_at";

#[derive(Clone)]
pub struct PgMediaRepository {
    db: PgPool,
}

impl PgMediaRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MediaRepository for PgMediaRepository {
    async fn attach(&self, media: &NewMedia) -> anyhow::Result<Media> {
        let row = sqlx::query_as::<_, Media>(&format!(
            r#"
            INSERT INTO media (user_id, collection, file_name, mime_type, size, s3_key)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(media.user_id)
        .bind(&media.collection)
        .bind(&media.file_name)
        .bind(&media.mime_type)
        .bind(media.size)
        .bind(&media.s3_key)
        .fetch_one(&self.db)
        .await
        .context("insert media")?;
        Ok(row)
    }

    async fn list(&self, user_id: i64, collection: &str) -> anyhow::Result<Vec<Media>> {
        let rows = sqlx::query_as::<_, Media>(&format!(
            r#"
            SELECT {COLUMNS}
              FROM media
             WHERE user_id = $1 AND collection = $2
             ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(user_id)
        .bind(collection)
        .fetch_all(&self.db)
        .await
        .context("list media")?;
        Ok(rows)
    }
}
