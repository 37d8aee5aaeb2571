//! Application state shared across handlers

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use common::{
    cache::{RedisConfig, RedisPool},
    database,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use crate::catalog::ImageCatalog;
use crate::config::{GalleryConfig, Persistence, SessionBackend, UploadBackend};
use crate::demo::DemoCatalog;
use crate::identity::IdentityResolver;
use crate::likes::{DemoLikes, Favorites, PersistedLikes};
use crate::repositories::{
    self, ImageRepository, LikeRepository, MemoryStore, PgImageRepository, PgLikeRepository,
    PgUserRepository, UserRepository,
};
use crate::session::{MemorySessionStore, RedisSessionStore, SessionStore};
use crate::storage::{FileStorage, LocalStorage, S3Storage};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GalleryConfig>,
    /// Present when users, images and likes live in PostgreSQL
    pub db_pool: Option<PgPool>,
    pub sessions: Arc<dyn SessionStore>,
    pub users: Arc<dyn UserRepository>,
    pub identity: IdentityResolver,
    pub catalog: ImageCatalog,
    pub favorites: Favorites,
    pub demo: DemoCatalog,
}

/// Storage seams the state is assembled from
pub struct Backends {
    pub db_pool: Option<PgPool>,
    pub users: Arc<dyn UserRepository>,
    pub images: Arc<dyn ImageRepository>,
    pub likes: Arc<dyn LikeRepository>,
    pub sessions: Arc<dyn SessionStore>,
    pub storage: Arc<dyn FileStorage>,
}

impl Backends {
    /// Memory repositories and sessions with local upload storage
    pub fn in_memory(config: &GalleryConfig) -> Self {
        let store = MemoryStore::new(config.demo.max_id as i64 + 1);
        Self {
            db_pool: None,
            users: Arc::new(store.clone()),
            images: Arc::new(store.clone()),
            likes: Arc::new(store),
            sessions: Arc::new(MemorySessionStore::new()),
            storage: Arc::new(LocalStorage::new(&config.uploads)),
        }
    }

    /// Backends selected by `config`, connected and migrated
    pub async fn connect(config: &GalleryConfig) -> Result<Self> {
        let (db_pool, users, images, likes): (
            Option<PgPool>,
            Arc<dyn UserRepository>,
            Arc<dyn ImageRepository>,
            Arc<dyn LikeRepository>,
        ) = match config.persistence {
            Persistence::Postgres => {
                let db_config = database::DatabaseConfig::from_env()?;
                let pool = database::init_pool(&db_config).await?;

                if database::health_check(&pool).await? {
                    info!("Database connection successful");
                } else {
                    anyhow::bail!("Failed to connect to database");
                }
                repositories::migrate(&pool).await?;

                (
                    Some(pool.clone()),
                    Arc::new(PgUserRepository::new(pool.clone())),
                    Arc::new(PgImageRepository::new(pool.clone())),
                    Arc::new(PgLikeRepository::new(pool)),
                )
            }
            Persistence::Memory => {
                info!("Using in-memory persistence; data is lost on restart");
                let store = MemoryStore::new(config.demo.max_id as i64 + 1);
                (
                    None,
                    Arc::new(store.clone()),
                    Arc::new(store.clone()),
                    Arc::new(store),
                )
            }
        };

        let sessions: Arc<dyn SessionStore> = match config.session.backend {
            SessionBackend::Redis => {
                let redis_config = RedisConfig::from_env()?;
                let redis_pool = RedisPool::new(&redis_config)?;
                Arc::new(RedisSessionStore::new(
                    redis_pool,
                    config.session.lifetime_seconds(),
                ))
            }
            SessionBackend::Memory => Arc::new(MemorySessionStore::new()),
        };

        let storage: Arc<dyn FileStorage> = match config.uploads.backend {
            UploadBackend::Local => Arc::new(LocalStorage::new(&config.uploads)),
            UploadBackend::S3 => {
                let bucket = config
                    .uploads
                    .s3_bucket
                    .clone()
                    .context("uploads.s3_bucket is not set")?;
                let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
                let s3_client = aws_sdk_s3::Client::new(&aws_config);
                Arc::new(S3Storage::new(s3_client, bucket, &config.uploads))
            }
        };

        Ok(Self {
            db_pool,
            users,
            images,
            likes,
            sessions,
            storage,
        })
    }
}

impl AppState {
    pub fn new(config: GalleryConfig, backends: Backends) -> Self {
        let demo = DemoCatalog::new(&config.demo);
        let identity =
            IdentityResolver::new(backends.users.clone(), config.identity.guest_fallback);
        let favorites = Favorites::new(
            PersistedLikes::new(backends.likes),
            DemoLikes::new(demo.clone()),
            config.demo.max_id,
        );
        let catalog = ImageCatalog::new(
            backends.images,
            favorites.clone(),
            backends.storage,
            demo.clone(),
            &config.catalog,
        );

        Self {
            config: Arc::new(config),
            db_pool: backends.db_pool,
            sessions: backends.sessions,
            users: backends.users,
            identity,
            catalog,
            favorites,
            demo,
        }
    }

    /// State over memory backends only
    pub fn in_memory(config: GalleryConfig) -> Self {
        let backends = Backends::in_memory(&config);
        Self::new(config, backends)
    }

    /// Backend health keyed by component name
    pub async fn health(&self) -> Vec<(&'static str, bool)> {
        let mut checks = Vec::new();
        if let Some(pool) = &self.db_pool {
            checks.push(("database", database::health_check(pool).await.unwrap_or(false)));
        }
        checks.push(("sessions", self.sessions.health_check().await.unwrap_or(false)));
        checks
    }
}
