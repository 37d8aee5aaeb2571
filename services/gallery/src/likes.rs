//! Like ledgers and the id-threshold dispatch between them
//!
//! Persisted images keep likes as rows with a `liked_by` projection on the
//! image. Demo images keep them as an id array in the viewer's session.
//! Both sit behind [`LikeLedger`]; [`Favorites::ledger_for`] is the only
//! place that chooses between them.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::demo::{DemoCatalog, DemoImage};
use crate::error::{GalleryError, GalleryResult};
use crate::models::{LikeToggle, User};
use crate::repositories::LikeRepository;
use crate::session::Session;

/// Who is liking, and the session their demo state lives in
#[derive(Clone, Copy)]
pub struct Actor<'a> {
    pub user: &'a User,
    pub session: &'a Session,
}

#[async_trait]
pub trait LikeLedger: Send + Sync {
    async fn toggle(&self, actor: Actor<'_>, image_id: i64) -> GalleryResult<LikeToggle>;

    async fn is_liked(&self, actor: Actor<'_>, image_id: i64) -> GalleryResult<bool>;

    /// Likes visible to `viewer`; anonymous viewers see no session likes
    async fn count(&self, viewer: Option<Actor<'_>>, image_id: i64) -> GalleryResult<u64>;
}

/// Ledger over the `likes` table
#[derive(Clone)]
pub struct PersistedLikes {
    likes: Arc<dyn LikeRepository>,
}

impl PersistedLikes {
    pub fn new(likes: Arc<dyn LikeRepository>) -> Self {
        Self { likes }
    }
}

#[async_trait]
impl LikeLedger for PersistedLikes {
    async fn toggle(&self, actor: Actor<'_>, image_id: i64) -> GalleryResult<LikeToggle> {
        self.likes
            .toggle(actor.user.id, image_id)
            .await?
            .ok_or(GalleryError::NotFound)
    }

    async fn is_liked(&self, actor: Actor<'_>, image_id: i64) -> GalleryResult<bool> {
        Ok(self.likes.exists(actor.user.id, image_id).await?)
    }

    async fn count(&self, _viewer: Option<Actor<'_>>, image_id: i64) -> GalleryResult<u64> {
        Ok(self.likes.count(image_id).await?)
    }
}

/// Ledger over the session-scoped demo like arrays
#[derive(Clone)]
pub struct DemoLikes {
    catalog: DemoCatalog,
}

impl DemoLikes {
    pub fn new(catalog: DemoCatalog) -> Self {
        Self { catalog }
    }

    pub async fn image(&self, image_id: i64) -> GalleryResult<DemoImage> {
        let id = u32::try_from(image_id).map_err(|_| GalleryError::NotFound)?;
        self.catalog.find(id).await?.ok_or(GalleryError::NotFound)
    }

    /// Demo ids liked by `viewer` in its session
    pub async fn liked_ids(&self, viewer: Option<Actor<'_>>) -> GalleryResult<Vec<u32>> {
        match viewer {
            Some(actor) => actor.session.demo_likes(actor.user.id).await,
            None => Ok(Vec::new()),
        }
    }

    /// The actor's liked demo images, in catalog order
    pub async fn favorites(&self, actor: Actor<'_>) -> GalleryResult<Vec<DemoImage>> {
        let liked = self.liked_ids(Some(actor)).await?;
        Ok(self
            .catalog
            .images()
            .await?
            .into_iter()
            .filter(|image| liked.contains(&image.id))
            .collect())
    }
}

#[async_trait]
impl LikeLedger for DemoLikes {
    async fn toggle(&self, actor: Actor<'_>, image_id: i64) -> GalleryResult<LikeToggle> {
        let image = self.image(image_id).await?;
        let mut liked = actor.session.demo_likes(actor.user.id).await?;

        let is_liked = if liked.contains(&image.id) {
            liked.retain(|id| *id != image.id);
            false
        } else {
            liked.push(image.id);
            true
        };
        actor.session.set_demo_likes(actor.user.id, &liked).await?;

        info!(
            "User {} {} demo image {}",
            actor.user.id,
            if is_liked { "liked" } else { "unliked" },
            image.id
        );

        let liked_by = if is_liked { vec![actor.user.id] } else { Vec::new() };
        Ok(LikeToggle::new(is_liked, liked_by))
    }

    async fn is_liked(&self, actor: Actor<'_>, image_id: i64) -> GalleryResult<bool> {
        let liked = self.liked_ids(Some(actor)).await?;
        Ok(u32::try_from(image_id).is_ok_and(|id| liked.contains(&id)))
    }

    async fn count(&self, viewer: Option<Actor<'_>>, image_id: i64) -> GalleryResult<u64> {
        match viewer {
            Some(actor) => Ok(self.is_liked(actor, image_id).await? as u64),
            None => Ok(0),
        }
    }
}

/// Dispatches like operations by image id
#[derive(Clone)]
pub struct Favorites {
    persisted: PersistedLikes,
    demo: DemoLikes,
    demo_max_id: i64,
}

impl Favorites {
    pub fn new(persisted: PersistedLikes, demo: DemoLikes, demo_max_id: u32) -> Self {
        Self {
            persisted,
            demo,
            demo_max_id: demo_max_id as i64,
        }
    }

    pub fn is_demo_id(&self, image_id: i64) -> bool {
        (1..=self.demo_max_id).contains(&image_id)
    }

    pub fn ledger_for(&self, image_id: i64) -> &dyn LikeLedger {
        if self.is_demo_id(image_id) {
            &self.demo
        } else {
            &self.persisted
        }
    }

    pub async fn toggle(&self, actor: Actor<'_>, image_id: i64) -> GalleryResult<LikeToggle> {
        self.ledger_for(image_id).toggle(actor, image_id).await
    }

    pub fn demo(&self) -> &DemoLikes {
        &self.demo
    }
}
