//! Like repository: normalized rows and the `liked_by` projection

use async_trait::async_trait;
use common::error::DatabaseResult;
use sqlx::PgPool;
use tracing::info;

use super::LikeRepository;
use crate::models::LikeToggle;

/// PostgreSQL like repository
#[derive(Clone)]
pub struct PgLikeRepository {
    pool: PgPool,
}

impl PgLikeRepository {
    /// Create a new like repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LikeRepository for PgLikeRepository {
    async fn toggle(&self, user_id: i64, image_id: i64) -> DatabaseResult<Option<LikeToggle>> {
        let mut tx = self.pool.begin().await?;

        // The row lock serializes toggles on one image, so the projection
        // below always sees the rows the other toggles committed.
        let image: Option<i64> = sqlx::query_scalar("SELECT id FROM images WHERE id = $1 FOR UPDATE")
            .bind(image_id)
            .fetch_optional(&mut *tx)
            .await?;

        if image.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let removed = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND image_id = $2")
            .bind(user_id)
            .bind(image_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let is_liked = if removed > 0 {
            false
        } else {
            sqlx::query(
                r#"
                INSERT INTO likes (user_id, image_id)
                VALUES ($1, $2)
                ON CONFLICT (user_id, image_id) DO NOTHING
                "#,
            )
            .bind(user_id)
            .bind(image_id)
            .execute(&mut *tx)
            .await?;
            true
        };

        let liked_by: Vec<i64> = sqlx::query_scalar(
            r#"
            UPDATE images
            SET liked_by = COALESCE(
                    (SELECT array_agg(user_id ORDER BY user_id) FROM likes WHERE image_id = $1),
                    '{}'
                ),
                updated_at = NOW()
            WHERE id = $1
            RETURNING liked_by
            "#,
        )
        .bind(image_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            "User {} {} image {}",
            user_id,
            if is_liked { "liked" } else { "unliked" },
            image_id
        );

        Ok(Some(LikeToggle::new(is_liked, liked_by)))
    }

    async fn exists(&self, user_id: i64, image_id: i64) -> DatabaseResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM likes WHERE user_id = $1 AND image_id = $2)",
        )
        .bind(user_id)
        .bind(image_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn count(&self, image_id: i64) -> DatabaseResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE image_id = $1")
            .bind(image_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }

}
