//! Image repository for database operations

use async_trait::async_trait;
use common::error::DatabaseResult;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;

use super::{ImageRepository, like_pattern};
use crate::models::{Image, NewImage, Pagination};

const IMAGE_COLUMNS: &str =
    "id, name, vibe, image_path, user_id, liked_by, created_at, updated_at";

/// PostgreSQL image repository
#[derive(Clone)]
pub struct PgImageRepository {
    pool: PgPool,
}

impl PgImageRepository {
    /// Create a new image repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn image_from_row(row: &PgRow) -> Image {
    Image {
        id: row.get("id"),
        name: row.get("name"),
        vibe: row.get("vibe"),
        image_path: row.get("image_path"),
        user_id: row.get("user_id"),
        liked_by: row.get("liked_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl ImageRepository for PgImageRepository {
    async fn create(&self, new_image: &NewImage) -> DatabaseResult<Image> {
        info!("Creating image record: {}", new_image.name);

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO images (name, vibe, image_path, user_id, liked_by)
            VALUES ($1, $2, $3, $4, '{{}}')
            RETURNING {IMAGE_COLUMNS}
            "#
        ))
        .bind(&new_image.name)
        .bind(&new_image.vibe)
        .bind(&new_image.image_path)
        .bind(new_image.user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(image_from_row(&row))
    }

    async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Image>> {
        let row = sqlx::query(&format!("SELECT {IMAGE_COLUMNS} FROM images WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(image_from_row))
    }

    async fn list(
        &self,
        search: Option<&str>,
        pagination: Pagination,
    ) -> DatabaseResult<(Vec<Image>, u64)> {
        let pattern = search.map(like_pattern);

        let rows = sqlx::query(&format!(
            r#"
            SELECT {IMAGE_COLUMNS}
            FROM images
            WHERE $1::text IS NULL OR vibe ILIKE $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(pattern.as_deref())
        .bind(pagination.per_page as i64)
        .bind(pagination.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM images WHERE $1::text IS NULL OR vibe ILIKE $1")
                .bind(pattern.as_deref())
                .fetch_one(&self.pool)
                .await?;

        let images = rows.iter().map(image_from_row).collect();

        Ok((images, total.max(0) as u64))
    }
}
