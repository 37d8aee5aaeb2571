//! Image catalog: listing, lookup and upload of images

use std::sync::Arc;
use tracing::info;

use crate::config::{CatalogConfig, CatalogMode};
use crate::demo::DemoCatalog;
use crate::error::{GalleryError, GalleryResult};
use crate::identity::RequestContext;
use crate::likes::Favorites;
use crate::models::{Image, ImageView, NewImage, Paginated, Pagination};
use crate::repositories::ImageRepository;
use crate::storage::FileStorage;
use crate::validation::ValidUpload;

#[derive(Clone)]
pub struct ImageCatalog {
    images: Arc<dyn ImageRepository>,
    favorites: Favorites,
    storage: Arc<dyn FileStorage>,
    demo: DemoCatalog,
    mode: CatalogMode,
    per_page: u32,
}

/// Trimmed search term, `None` when nothing is left
fn search_term(search: Option<&str>) -> Option<&str> {
    search.map(str::trim).filter(|term| !term.is_empty())
}

impl ImageCatalog {
    pub fn new(
        images: Arc<dyn ImageRepository>,
        favorites: Favorites,
        storage: Arc<dyn FileStorage>,
        demo: DemoCatalog,
        config: &CatalogConfig,
    ) -> Self {
        Self {
            images,
            favorites,
            storage,
            demo,
            mode: config.mode,
            per_page: config.per_page,
        }
    }

    /// One page of images annotated for the acting user
    pub async fn list(
        &self,
        ctx: &RequestContext,
        search: Option<&str>,
        page: Option<u32>,
    ) -> GalleryResult<Paginated<ImageView>> {
        let pagination = Pagination::new(page, self.per_page);
        let search = search_term(search);

        match self.mode {
            CatalogMode::Persisted => {
                let (images, total) = self.images.list(search, pagination).await?;
                let viewer = ctx.user_id();
                let items = images
                    .into_iter()
                    .map(|image| ImageView::for_viewer(image, viewer))
                    .collect();
                Ok(Paginated::new(items, pagination, total))
            }
            CatalogMode::Demo => {
                let viewer = ctx.user_id();
                let liked = self.favorites.demo().liked_ids(ctx.actor()).await?;
                let needle = search.map(str::to_lowercase);
                let views: Vec<ImageView> = self
                    .demo
                    .images()
                    .await?
                    .iter()
                    .map(|image| image.view(viewer, &liked))
                    .filter(|view| {
                        needle
                            .as_deref()
                            .is_none_or(|needle| view.name_or_vibe_matches(needle))
                    })
                    .collect();
                Ok(Paginated::from_vec(views, pagination))
            }
        }
    }

    /// One image annotated by the ledger its id routes to
    pub async fn find(&self, ctx: &RequestContext, id: i64) -> GalleryResult<ImageView> {
        let ledger = self.favorites.ledger_for(id);
        let is_liked = match ctx.actor() {
            Some(actor) => ledger.is_liked(actor, id).await?,
            None => false,
        };

        let mut view = if self.favorites.is_demo_id(id) {
            let image = self.favorites.demo().image(id).await?;
            let liked = if is_liked { vec![image.id] } else { Vec::new() };
            image.view(ctx.user_id(), &liked)
        } else {
            let image = self
                .images
                .find_by_id(id)
                .await?
                .ok_or(GalleryError::NotFound)?;
            ImageView::for_viewer(image, ctx.user_id())
        };

        view.is_liked = is_liked;
        view.likes_count = ledger.count(ctx.actor(), id).await? as usize;
        Ok(view)
    }

    /// Store the file, then insert the row. A failed store creates no row.
    pub async fn create(&self, upload: ValidUpload, owner: Option<i64>) -> GalleryResult<Image> {
        let image_path = self.storage.put(upload.bytes, upload.format).await?;

        let image = self
            .images
            .create(&NewImage {
                name: upload.name,
                vibe: upload.vibe,
                image_path,
                user_id: owner,
            })
            .await?;

        info!("Created image {} for owner {:?}", image.id, owner);
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DemoConfig, UploadConfig};
    use crate::likes::{Actor, DemoLikes, PersistedLikes};
    use crate::models::{Role, User};
    use crate::repositories::MemoryStore;
    use crate::session::{MemorySessionStore, Session, SessionStore};
    use crate::storage::LocalStorage;
    use image::ImageFormat;
    use tempfile::TempDir;

    struct Fixture {
        _uploads: TempDir,
        _demo: TempDir,
        store: MemoryStore,
        sessions: Arc<dyn SessionStore>,
        demo: DemoCatalog,
        storage: Arc<dyn FileStorage>,
    }

    fn fixture() -> Fixture {
        let uploads = tempfile::tempdir().unwrap();
        let demo_dir = tempfile::tempdir().unwrap();
        for id in 1..=12 {
            std::fs::write(demo_dir.path().join(format!("chihiro{:03}.jpg", id)), b"x").unwrap();
        }
        let storage: Arc<dyn FileStorage> = Arc::new(LocalStorage::new(&UploadConfig {
            local_root: uploads.path().to_path_buf(),
            ..UploadConfig::default()
        }));
        let demo = DemoCatalog::new(&DemoConfig {
            directory: demo_dir.path().to_path_buf(),
            ..DemoConfig::default()
        });
        Fixture {
            _uploads: uploads,
            _demo: demo_dir,
            store: MemoryStore::new(51),
            sessions: Arc::new(MemorySessionStore::new()),
            demo,
            storage,
        }
    }

    fn catalog(f: &Fixture, mode: CatalogMode) -> ImageCatalog {
        let favorites = Favorites::new(
            PersistedLikes::new(Arc::new(f.store.clone())),
            DemoLikes::new(f.demo.clone()),
            50,
        );
        ImageCatalog::new(
            Arc::new(f.store.clone()),
            favorites,
            f.storage.clone(),
            f.demo.clone(),
            &CatalogConfig { mode, per_page: 9 },
        )
    }

    async fn anonymous(f: &Fixture) -> RequestContext {
        RequestContext {
            session: Session::start(f.sessions.clone()).await.unwrap(),
            user: None,
        }
    }

    async fn viewer(f: &Fixture, id: i64) -> RequestContext {
        let now = chrono::Utc::now();
        RequestContext {
            session: Session::start(f.sessions.clone()).await.unwrap(),
            user: Some(User {
                id,
                name: "示範訪客".to_string(),
                email: format!("guest_{}@demo.local", id),
                password_hash: String::new(),
                role: Role::Guest,
                created_at: now,
                updated_at: now,
            }),
        }
    }

    fn upload(name: &str, vibe: &str) -> ValidUpload {
        ValidUpload {
            name: name.to_string(),
            vibe: vibe.to_string(),
            bytes: b"\xff\xd8\xff\xe0".to_vec(),
            format: ImageFormat::Jpeg,
        }
    }

    #[tokio::test]
    async fn test_upload_appears_first_with_no_likes() {
        let f = fixture();
        let catalog = catalog(&f, CatalogMode::Persisted);
        catalog.create(upload("Older", "calm"), None).await.unwrap();
        let created = catalog.create(upload("Sunset", "peaceful"), Some(7)).await.unwrap();
        assert_eq!(created.user_id, Some(7));
        assert!(created.image_path.starts_with("/storage/images/"));

        let page = catalog.list(&anonymous(&f).await, None, None).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].name, "Sunset");
        assert!(page.items[0].liked_by.is_empty());
        assert!(!page.items[0].is_liked);
    }

    #[tokio::test]
    async fn test_search_filters_descriptions() {
        let f = fixture();
        let catalog = catalog(&f, CatalogMode::Persisted);
        catalog.create(upload("One", "A Cozy cabin"), None).await.unwrap();
        catalog.create(upload("Cozy", "stormy sea"), None).await.unwrap();

        let page = catalog.list(&anonymous(&f).await, Some("cozy"), None).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].name, "One");

        let page = catalog.list(&anonymous(&f).await, Some("   "), None).await.unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_demo_mode_paginates_and_searches() {
        let f = fixture();
        let catalog = catalog(&f, CatalogMode::Demo);
        let ctx = anonymous(&f).await;

        let first = catalog.list(&ctx, None, Some(1)).await.unwrap();
        assert_eq!(first.items.len(), 9);
        assert_eq!(first.last_page, 2);
        assert_eq!(first.items[0].id, 1);

        let second = catalog.list(&ctx, None, Some(2)).await.unwrap();
        assert_eq!(second.items.len(), 3);

        let beyond = catalog.list(&ctx, None, Some(5)).await.unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 12);

        let named = catalog.list(&ctx, Some("007"), None).await.unwrap();
        assert_eq!(named.total, 1);
        assert_eq!(named.items[0].id, 7);
    }

    #[tokio::test]
    async fn test_find_missing_image() {
        let f = fixture();
        let catalog = catalog(&f, CatalogMode::Persisted);
        assert!(matches!(
            catalog.find(&anonymous(&f).await, 99).await,
            Err(GalleryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_find_routes_demo_ids_to_session_ledger() {
        let f = fixture();
        let catalog = catalog(&f, CatalogMode::Persisted);
        let ctx = viewer(&f, 5).await;
        let actor = ctx.actor().unwrap();

        let fresh = catalog.find(&ctx, 7).await.unwrap();
        assert_eq!(fresh.name, "千尋示範圖片 007");
        assert!(!fresh.is_liked);
        assert_eq!(fresh.likes_count, 0);

        catalog.favorites.toggle(actor, 7).await.unwrap();
        let liked = catalog.find(&ctx, 7).await.unwrap();
        assert!(liked.is_liked);
        assert_eq!(liked.likes_count, 1);
        assert_eq!(liked.liked_by, vec![5]);

        let seen_by_stranger = catalog.find(&anonymous(&f).await, 7).await.unwrap();
        assert!(!seen_by_stranger.is_liked);
        assert_eq!(seen_by_stranger.likes_count, 0);

        assert!(matches!(
            catalog.find(&ctx, 40).await,
            Err(GalleryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_find_persisted_counts_rows() {
        let f = fixture();
        let catalog = catalog(&f, CatalogMode::Persisted);
        let image = catalog.create(upload("Sunset", "peaceful"), None).await.unwrap();
        let ctx = viewer(&f, 5).await;
        catalog.favorites.toggle(ctx.actor().unwrap(), image.id).await.unwrap();

        let mine = catalog.find(&ctx, image.id).await.unwrap();
        assert!(mine.is_liked);
        assert_eq!(mine.likes_count, 1);

        let theirs = catalog.find(&anonymous(&f).await, image.id).await.unwrap();
        assert!(!theirs.is_liked);
        assert_eq!(theirs.likes_count, 1);
        assert_eq!(theirs.liked_by, vec![5]);
    }
}
