//! Redis access for session-scoped state
//!
//! Every key is written under the configured namespace. Session state is one
//! hash per session with a single TTL, so abandoned guest sessions expire as
//! a whole.

use anyhow::Result;
use redis::{AsyncCommands, Client, aio::MultiplexedConnection};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    pub namespace: String,
}

impl RedisConfig {
    /// Reads `REDIS_URL` and `REDIS_NAMESPACE`
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into()),
            namespace: std::env::var("REDIS_NAMESPACE").unwrap_or_else(|_| "gallery".into()),
        })
    }
}

/// Shared handle over one lazily opened multiplexed connection
#[derive(Clone)]
pub struct RedisPool {
    client: Client,
    namespace: Arc<str>,
    connection: Arc<OnceCell<MultiplexedConnection>>,
}

impl RedisPool {
    /// Validates the URL. No connection is opened until the first command.
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        info!(
            "Redis client ready for {} (namespace {})",
            config.url, config.namespace
        );
        Ok(Self {
            client,
            namespace: config.namespace.as_str().into(),
            connection: Arc::new(OnceCell::new()),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        let conn = self
            .connection
            .get_or_try_init(|| async {
                debug!("Opening multiplexed Redis connection");
                self.client.get_multiplexed_async_connection().await
            })
            .await?;
        Ok(conn.clone())
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    /// Write one field of the hash at `key` and restart the hash's expiry
    pub async fn put_field(
        &self,
        key: &str,
        field: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<()> {
        let mut conn = self.connection().await?;
        let key = self.key(key);
        let _: () = redis::pipe()
            .atomic()
            .hset(&key, field, value)
            .ignore()
            .expire(&key, seconds(ttl_seconds))
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn get_field(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        Ok(conn.hget(self.key(key), field).await?)
    }

    pub async fn remove_field(&self, key: &str, field: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: u64 = conn.hdel(self.key(key), field).await?;
        Ok(())
    }

    /// Restart the expiry of `key`. False when the key does not exist.
    pub async fn touch(&self, key: &str, ttl_seconds: u64) -> Result<bool> {
        let mut conn = self.connection().await?;
        Ok(conn.expire(self.key(key), seconds(ttl_seconds)).await?)
    }

    /// Move `from` to `to`, keeping its fields, and restart the expiry
    pub async fn rename(&self, from: &str, to: &str, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.connection().await?;
        let to = self.key(to);
        let _: () = redis::pipe()
            .atomic()
            .rename(self.key(from), &to)
            .ignore()
            .expire(&to, seconds(ttl_seconds))
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    /// Returns whether the key existed
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection().await?;
        let removed: u64 = conn.del(self.key(key)).await?;
        Ok(removed > 0)
    }

    pub async fn ping(&self) -> Result<bool> {
        let mut conn = self.connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}

fn seconds(ttl_seconds: u64) -> i64 {
    i64::try_from(ttl_seconds).unwrap_or(i64::MAX)
}
