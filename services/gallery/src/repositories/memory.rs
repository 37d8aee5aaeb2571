//! In-process store for the anonymous demo deployment and tests
//!
//! All tables sit behind a single mutex, so every trait method observes and
//! mutates a consistent snapshot just like one database transaction.

use async_trait::async_trait;
use chrono::Utc;
use common::error::DatabaseResult;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{ImageRepository, LikeRepository, UserRepository};
use crate::models::{Image, Like, LikeToggle, NewImage, NewUser, Pagination, User};

#[derive(Debug)]
struct Tables {
    users: BTreeMap<i64, User>,
    images: BTreeMap<i64, Image>,
    likes: BTreeMap<(i64, i64), Like>,
    next_user_id: i64,
    next_image_id: i64,
    next_like_id: i64,
}

impl Tables {
    fn recompute_liked_by(&mut self, image_id: i64) -> Vec<i64> {
        let liked_by: BTreeSet<i64> = self
            .likes
            .keys()
            .filter(|(_, liked_image)| *liked_image == image_id)
            .map(|(user_id, _)| *user_id)
            .collect();
        let liked_by: Vec<i64> = liked_by.into_iter().collect();

        if let Some(image) = self.images.get_mut(&image_id) {
            image.liked_by = liked_by.clone();
            image.updated_at = Utc::now();
        }
        liked_by
    }
}

/// Memory-backed users, images and likes
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Image ids start at `first_image_id`, mirroring the identity column
    /// that keeps persisted ids clear of the demo range.
    pub fn new(first_image_id: i64) -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables {
                users: BTreeMap::new(),
                images: BTreeMap::new(),
                likes: BTreeMap::new(),
                next_user_id: 1,
                next_image_id: first_image_id,
                next_like_id: 1,
            })),
        }
    }

    /// Number of like rows across all images
    pub async fn like_rows(&self) -> usize {
        self.tables.lock().await.likes.len()
    }

    #[cfg(test)]
    async fn likers_of(&self, image_id: i64) -> Vec<i64> {
        let tables = self.tables.lock().await;
        tables
            .likes
            .keys()
            .filter(|(_, i)| *i == image_id)
            .map(|(user_id, _)| *user_id)
            .collect()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, new_user: &NewUser) -> DatabaseResult<Option<User>> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.email == new_user.email) {
            return Ok(None);
        }

        let now = Utc::now();
        let user = User {
            id: tables.next_user_id,
            name: new_user.name.clone(),
            email: new_user.email.clone(),
            password_hash: new_user.password_hash.clone(),
            role: new_user.role,
            created_at: now,
            updated_at: now,
        };
        tables.next_user_id += 1;
        tables.users.insert(user.id, user.clone());
        Ok(Some(user))
    }

    async fn get_or_create(&self, new_user: &NewUser) -> DatabaseResult<User> {
        if let Some(user) = UserRepository::create(self, new_user).await? {
            return Ok(user);
        }
        let tables = self.tables.lock().await;
        tables
            .users
            .values()
            .find(|u| u.email == new_user.email)
            .cloned()
            .ok_or(common::error::DatabaseError::MissingRow("users"))
    }

    async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }
}

#[async_trait]
impl ImageRepository for MemoryStore {
    async fn create(&self, new_image: &NewImage) -> DatabaseResult<Image> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let image = Image {
            id: tables.next_image_id,
            name: new_image.name.clone(),
            vibe: new_image.vibe.clone(),
            image_path: new_image.image_path.clone(),
            user_id: new_image.user_id,
            liked_by: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        tables.next_image_id += 1;
        tables.images.insert(image.id, image.clone());
        Ok(image)
    }

    async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Image>> {
        Ok(self.tables.lock().await.images.get(&id).cloned())
    }

    async fn list(
        &self,
        search: Option<&str>,
        pagination: Pagination,
    ) -> DatabaseResult<(Vec<Image>, u64)> {
        let tables = self.tables.lock().await;
        let needle = search.map(str::to_lowercase);

        let mut matching: Vec<&Image> = tables
            .images
            .values()
            .filter(|image| match &needle {
                Some(needle) => image.vibe.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.per_page as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }
}

#[async_trait]
impl LikeRepository for MemoryStore {
    async fn toggle(&self, user_id: i64, image_id: i64) -> DatabaseResult<Option<LikeToggle>> {
        let mut tables = self.tables.lock().await;
        if !tables.images.contains_key(&image_id) {
            return Ok(None);
        }

        let is_liked = if tables.likes.remove(&(user_id, image_id)).is_some() {
            false
        } else {
            let like = Like {
                id: tables.next_like_id,
                user_id,
                image_id,
                created_at: Utc::now(),
            };
            tables.next_like_id += 1;
            tables.likes.insert((user_id, image_id), like);
            true
        };

        let liked_by = tables.recompute_liked_by(image_id);
        Ok(Some(LikeToggle::new(is_liked, liked_by)))
    }

    async fn exists(&self, user_id: i64, image_id: i64) -> DatabaseResult<bool> {
        Ok(self
            .tables
            .lock()
            .await
            .likes
            .contains_key(&(user_id, image_id)))
    }

    async fn count(&self, image_id: i64) -> DatabaseResult<u64> {
        let tables = self.tables.lock().await;
        Ok(tables.likes.keys().filter(|(_, i)| *i == image_id).count() as u64)
    }

}
