//! Session management
//!
//! A session is a cookie-borne UUID plus a small key-value record in a
//! [`SessionStore`]. It carries the logged-in user id, the demo-mode like
//! arrays and one-shot flash messages. Only ids the store issued are
//! resumed, and the id changes whenever the authenticated user does.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use common::cache::RedisPool;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::GalleryResult;

const AUTH_USER_KEY: &str = "auth_user_id";
const FLASH_KEY: &str = "flash";
const CREATED_AT_KEY: &str = "created_at";

/// Key under which a user's liked demo-image ids are kept
pub fn demo_likes_key(user_id: i64) -> String {
    format!("demo_likes_{}", user_id)
}

/// Per-session string records
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Register a new, empty session
    async fn create(&self, session_id: &str) -> Result<()>;

    /// Whether the session exists. Extends its lifetime when it does.
    async fn touch(&self, session_id: &str) -> Result<bool>;

    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>>;

    async fn put(&self, session_id: &str, key: &str, value: &str) -> Result<()>;

    async fn forget(&self, session_id: &str, key: &str) -> Result<()>;

    /// Move every key of `old_id` to `new_id`; `old_id` stops existing
    async fn rename(&self, old_id: &str, new_id: &str) -> Result<()>;

    async fn health_check(&self) -> Result<bool>;
}

/// Redis-backed sessions: one hash per session, one TTL for the whole hash
#[derive(Clone)]
pub struct RedisSessionStore {
    redis_pool: RedisPool,
    ttl_seconds: u64,
}

impl RedisSessionStore {
    pub fn new(redis_pool: RedisPool, ttl_seconds: u64) -> Self {
        Self {
            redis_pool,
            ttl_seconds,
        }
    }

    fn key(session_id: &str) -> String {
        format!("session:{}", session_id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self, session_id: &str) -> Result<()> {
        let created_at = Utc::now().timestamp().to_string();
        self.redis_pool
            .put_field(&Self::key(session_id), CREATED_AT_KEY, &created_at, self.ttl_seconds)
            .await
    }

    async fn touch(&self, session_id: &str) -> Result<bool> {
        self.redis_pool
            .touch(&Self::key(session_id), self.ttl_seconds)
            .await
    }

    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>> {
        self.redis_pool.get_field(&Self::key(session_id), key).await
    }

    async fn put(&self, session_id: &str, key: &str, value: &str) -> Result<()> {
        self.redis_pool
            .put_field(&Self::key(session_id), key, value, self.ttl_seconds)
            .await
    }

    async fn forget(&self, session_id: &str, key: &str) -> Result<()> {
        self.redis_pool
            .remove_field(&Self::key(session_id), key)
            .await
    }

    async fn rename(&self, old_id: &str, new_id: &str) -> Result<()> {
        // RENAME fails on a missing key; a session that expired mid-request
        // starts over empty.
        if !self.touch(old_id).await? {
            return self.create(new_id).await;
        }
        self.redis_pool
            .rename(&Self::key(old_id), &Self::key(new_id), self.ttl_seconds)
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        self.redis_pool.ping().await
    }
}

type Record = HashMap<String, String>;

/// Process-local sessions, lost on restart
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<Mutex<HashMap<String, Record>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        let record = sessions.entry(session_id.to_string()).or_default();
        record.insert(CREATED_AT_KEY.to_string(), Utc::now().timestamp().to_string());
        Ok(())
    }

    async fn touch(&self, session_id: &str) -> Result<bool> {
        Ok(self.sessions.lock().await.contains_key(session_id))
    }

    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>> {
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .get(session_id)
            .and_then(|record| record.get(key))
            .cloned())
    }

    async fn put(&self, session_id: &str, key: &str, value: &str) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .entry(session_id.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn forget(&self, session_id: &str, key: &str) -> Result<()> {
        if let Some(record) = self.sessions.lock().await.get_mut(session_id) {
            record.remove(key);
        }
        Ok(())
    }

    async fn rename(&self, old_id: &str, new_id: &str) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        let record = sessions.remove(old_id).unwrap_or_default();
        sessions.insert(new_id.to_string(), record);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// One-shot messages shown on the next rendered page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: Some(message.into()),
            errors: BTreeMap::new(),
        }
    }

    pub fn errors(errors: BTreeMap<String, String>) -> Self {
        Self {
            success: None,
            errors,
        }
    }

    pub fn error(field: &str, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.to_string(), message.into());
        Self::errors(errors)
    }
}

#[derive(Debug, Clone, Copy)]
struct Handle {
    id: Uuid,
    /// The client does not hold the current id yet
    cookie_pending: bool,
}

/// Request-scoped handle to the caller's session. Clones share the id, so a
/// regeneration inside a handler is seen by the cookie middleware.
#[derive(Clone)]
pub struct Session {
    handle: Arc<StdMutex<Handle>>,
    store: Arc<dyn SessionStore>,
}

impl Session {
    /// Register a fresh session in `store`
    pub async fn start(store: Arc<dyn SessionStore>) -> GalleryResult<Self> {
        let id = Uuid::new_v4();
        store.create(&id.simple().to_string()).await?;
        Ok(Self {
            handle: Arc::new(StdMutex::new(Handle {
                id,
                cookie_pending: true,
            })),
            store,
        })
    }

    /// Resume the session named by a cookie value. Missing, malformed and
    /// unknown ids all start a fresh session instead.
    pub async fn resume(
        cookie_value: Option<&str>,
        store: Arc<dyn SessionStore>,
    ) -> GalleryResult<Self> {
        let Some(id) = cookie_value.and_then(|value| Uuid::parse_str(value).ok()) else {
            return Self::start(store).await;
        };
        if !store.touch(&id.simple().to_string()).await? {
            warn!("Ignoring unknown session id from cookie");
            return Self::start(store).await;
        }
        Ok(Self {
            handle: Arc::new(StdMutex::new(Handle {
                id,
                cookie_pending: false,
            })),
            store,
        })
    }

    fn handle(&self) -> MutexGuard<'_, Handle> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> String {
        self.handle().id.simple().to_string()
    }

    /// True when the response must (re)issue the session cookie
    pub fn cookie_pending(&self) -> bool {
        self.handle().cookie_pending
    }

    /// Move the session's data to a new id and drop the old one
    pub async fn regenerate(&self) -> GalleryResult<()> {
        let old_id = self.id();
        let new_id = Uuid::new_v4();
        self.store
            .rename(&old_id, &new_id.simple().to_string())
            .await?;

        let mut handle = self.handle();
        handle.id = new_id;
        handle.cookie_pending = true;
        info!("Regenerated session id");
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> GalleryResult<Option<T>> {
        let raw = self.store.get(&self.id(), key).await?;
        let value = raw
            .map(|raw| {
                serde_json::from_str(&raw)
                    .with_context(|| format!("Corrupt session value for key {}", key))
            })
            .transpose()?;
        Ok(value)
    }

    pub async fn insert<T: Serialize>(&self, key: &str, value: &T) -> GalleryResult<()> {
        let raw = serde_json::to_string(value).context("Failed to encode session value")?;
        self.store.put(&self.id(), key, &raw).await?;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> GalleryResult<()> {
        self.store.forget(&self.id(), key).await?;
        Ok(())
    }

    /// Id of the user logged into this session
    pub async fn user_id(&self) -> GalleryResult<Option<i64>> {
        self.get(AUTH_USER_KEY).await
    }

    pub async fn login(&self, user_id: i64) -> GalleryResult<()> {
        info!("Logging user {} into session {}", user_id, self.id());
        self.insert(AUTH_USER_KEY, &user_id).await
    }

    /// Log `user_id` in under a new session id
    pub async fn login_fresh(&self, user_id: i64) -> GalleryResult<()> {
        self.regenerate().await?;
        self.login(user_id).await
    }

    pub async fn logout(&self) -> GalleryResult<()> {
        info!("Logging out session {}", self.id());
        self.remove(AUTH_USER_KEY).await
    }

    /// Demo-image ids liked by `user_id` in this session
    pub async fn demo_likes(&self, user_id: i64) -> GalleryResult<Vec<u32>> {
        Ok(self.get(&demo_likes_key(user_id)).await?.unwrap_or_default())
    }

    pub async fn set_demo_likes(&self, user_id: i64, ids: &[u32]) -> GalleryResult<()> {
        self.insert(&demo_likes_key(user_id), &ids).await
    }

    pub async fn flash(&self, flash: &Flash) -> GalleryResult<()> {
        self.insert(FLASH_KEY, flash).await
    }

    /// Read and clear the pending flash
    pub async fn take_flash(&self) -> GalleryResult<Option<Flash>> {
        let flash = self.get(FLASH_KEY).await?;
        if flash.is_some() {
            self.remove(FLASH_KEY).await?;
        }
        Ok(flash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Arc<dyn SessionStore> {
        Arc::new(MemorySessionStore::new())
    }

    #[tokio::test]
    async fn test_resume_only_known_sessions() {
        let store = store();
        let session = Session::resume(Some("not-a-uuid"), store.clone()).await.unwrap();
        assert!(session.cookie_pending());

        let planted = Uuid::new_v4().simple().to_string();
        let session = Session::resume(Some(&planted), store.clone()).await.unwrap();
        assert!(session.cookie_pending());
        assert_ne!(session.id(), planted);

        let issued = Session::start(store.clone()).await.unwrap();
        let resumed = Session::resume(Some(&issued.id()), store.clone()).await.unwrap();
        assert!(!resumed.cookie_pending());
        assert_eq!(resumed.id(), issued.id());
    }

    #[tokio::test]
    async fn test_login_persists_across_handles() {
        let store = store();
        let first = Session::start(store.clone()).await.unwrap();
        first.login(7).await.unwrap();

        let again = Session::resume(Some(&first.id()), store.clone()).await.unwrap();
        assert_eq!(again.user_id().await.unwrap(), Some(7));

        again.logout().await.unwrap();
        assert_eq!(first.user_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_login_fresh_moves_data_to_new_id() {
        let store = store();
        let session = Session::start(store.clone()).await.unwrap();
        session.set_demo_likes(1, &[5]).await.unwrap();
        let old_id = session.id();
        let observer = session.clone();

        session.login_fresh(9).await.unwrap();
        assert_ne!(session.id(), old_id);
        assert_eq!(observer.id(), session.id());
        assert!(observer.cookie_pending());
        assert_eq!(session.user_id().await.unwrap(), Some(9));
        assert_eq!(session.demo_likes(1).await.unwrap(), vec![5]);

        assert!(!store.touch(&old_id).await.unwrap());
        let stale = Session::resume(Some(&old_id), store.clone()).await.unwrap();
        assert_eq!(stale.user_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_demo_likes_are_scoped_per_user_and_session() {
        let store = store();
        let a = Session::start(store.clone()).await.unwrap();
        let b = Session::start(store.clone()).await.unwrap();

        a.set_demo_likes(1, &[3, 14]).await.unwrap();
        assert_eq!(a.demo_likes(1).await.unwrap(), vec![3, 14]);
        assert!(a.demo_likes(2).await.unwrap().is_empty());
        assert!(b.demo_likes(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flash_is_read_once() {
        let session = Session::start(store()).await.unwrap();
        session.flash(&Flash::success("圖片上傳成功！")).await.unwrap();

        let flash = session.take_flash().await.unwrap().unwrap();
        assert_eq!(flash.success.as_deref(), Some("圖片上傳成功！"));
        assert!(session.take_flash().await.unwrap().is_none());
    }
}
