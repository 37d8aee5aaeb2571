//! Repositories for database operations
//!
//! Each concern has an `async_trait` seam with a PostgreSQL implementation
//! and an in-process one ([`memory::MemoryStore`]) used for the anonymous demo
//! deployment and for tests.

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::PgPool;
use tracing::info;

use crate::models::{Image, LikeToggle, NewImage, NewUser, Pagination, User};

pub mod image;
pub mod like;
pub mod memory;
pub mod user;

pub use image::PgImageRepository;
pub use like::PgLikeRepository;
pub use memory::MemoryStore;
pub use user::PgUserRepository;

/// User storage
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; `Ok(None)` when the email is already taken
    async fn create(&self, new_user: &NewUser) -> DatabaseResult<Option<User>>;

    /// Return the user with `new_user.email`, inserting it first if missing
    async fn get_or_create(&self, new_user: &NewUser) -> DatabaseResult<User>;

    async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>>;
}

/// Persisted image catalog storage
#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// Insert an image with an empty `liked_by` cache
    async fn create(&self, new_image: &NewImage) -> DatabaseResult<Image>;

    async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Image>>;

    /// Newest first, optionally filtered by a case-insensitive substring of
    /// the description. Returns the page and the filtered total.
    async fn list(
        &self,
        search: Option<&str>,
        pagination: Pagination,
    ) -> DatabaseResult<(Vec<Image>, u64)>;
}

/// Normalized like rows plus the `images.liked_by` projection
#[async_trait]
pub trait LikeRepository: Send + Sync {
    /// Flip the (user, image) like and rewrite `liked_by` atomically.
    /// `Ok(None)` when the image does not exist.
    async fn toggle(&self, user_id: i64, image_id: i64) -> DatabaseResult<Option<LikeToggle>>;

    async fn exists(&self, user_id: i64, image_id: i64) -> DatabaseResult<bool>;

    async fn count(&self, image_id: i64) -> DatabaseResult<u64>;
}

/// Apply the embedded schema migrations
pub async fn migrate(pool: &PgPool) -> DatabaseResult<()> {
    info!("Running database migrations");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;
    Ok(())
}

/// Escape `%`, `_` and `\` so user input matches literally inside `ILIKE`
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
