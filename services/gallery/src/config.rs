//! Service configuration
//!
//! Settings are read from an optional `gallery.toml` next to the binary and
//! then from `GALLERY_*` environment variables, where `__` separates the
//! section from the key (`GALLERY_SERVER__PORT=8080`). Connection strings for
//! PostgreSQL and Redis stay in `common` (`DATABASE_URL`, `REDIS_URL`).

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// Top-level service configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    pub server: ServerConfig,
    pub persistence: Persistence,
    pub session: SessionConfig,
    pub identity: IdentityConfig,
    pub catalog: CatalogConfig,
    pub demo: DemoConfig,
    pub uploads: UploadConfig,
}

impl GalleryConfig {
    /// Load configuration from `gallery.toml` (optional) and the environment
    pub fn load() -> Result<Self> {
        let config = Config::builder()
            .add_source(File::with_name("gallery").required(false))
            .add_source(
                Environment::with_prefix("GALLERY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: GalleryConfig = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.catalog.per_page == 0 {
            anyhow::bail!("catalog.per_page must be greater than zero");
        }
        if self.uploads.backend == UploadBackend::S3 && self.uploads.s3_bucket.is_none() {
            anyhow::bail!("uploads.s3_bucket is required when uploads.backend = \"s3\"");
        }
        Ok(())
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for request bodies; must stay above `uploads.max_bytes`
    /// so oversized images reach validation instead of being cut off.
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3002,
            body_limit_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Where users, images and likes live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persistence {
    #[default]
    Postgres,
    Memory,
}

/// Session store backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    #[default]
    Redis,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub backend: SessionBackend,
    pub cookie_name: String,
    pub lifetime_minutes: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::Redis,
            cookie_name: "gallery_session".to_string(),
            lifetime_minutes: 120,
        }
    }
}

impl SessionConfig {
    pub fn lifetime_seconds(&self) -> u64 {
        self.lifetime_minutes * 60
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Provision a guest account for sessions without a logged-in user.
    /// When disabled, like and favorites requests need a real login.
    pub guest_fallback: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            guest_fallback: true,
        }
    }
}

/// Which records the home page lists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogMode {
    #[default]
    Persisted,
    Demo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub mode: CatalogMode,
    pub per_page: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            mode: CatalogMode::Persisted,
            per_page: 9,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub directory: PathBuf,
    pub file_prefix: String,
    pub extension: String,
    /// Highest identifier routed to the session overlay
    pub max_id: u32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("public/images"),
            file_prefix: "chihiro".to_string(),
            extension: "jpg".to_string(),
            max_id: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadBackend {
    #[default]
    Local,
    S3,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub backend: UploadBackend,
    /// Directory files are written to for the local backend
    pub local_root: PathBuf,
    /// URL prefix under which `local_root` is served
    pub public_prefix: String,
    /// Sub-directory (or key prefix) for uploaded images
    pub directory: String,
    pub max_bytes: usize,
    pub s3_bucket: Option<String>,
    /// Public base URL of the bucket; defaults to the virtual-hosted S3 URL
    pub s3_public_base: Option<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            backend: UploadBackend::Local,
            local_root: PathBuf::from("storage/app/public"),
            public_prefix: "/storage".to_string(),
            directory: "images".to_string(),
            max_bytes: 2 * 1024 * 1024,
            s3_bucket: None,
            s3_public_base: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_defaults_without_overrides() {
        let config = GalleryConfig::load().unwrap();
        assert_eq!(config.server.port, 3002);
        assert_eq!(config.persistence, Persistence::Postgres);
        assert_eq!(config.session.backend, SessionBackend::Redis);
        assert_eq!(config.session.cookie_name, "gallery_session");
        assert!(config.identity.guest_fallback);
        assert_eq!(config.catalog.mode, CatalogMode::Persisted);
        assert_eq!(config.catalog.per_page, 9);
        assert_eq!(config.demo.max_id, 50);
        assert_eq!(config.uploads.max_bytes, 2 * 1024 * 1024);
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        unsafe {
            std::env::set_var("GALLERY_SERVER__PORT", "8080");
            std::env::set_var("GALLERY_CATALOG__MODE", "demo");
            std::env::set_var("GALLERY_CATALOG__PER_PAGE", "12");
            std::env::set_var("GALLERY_IDENTITY__GUEST_FALLBACK", "false");
        }

        let config = GalleryConfig::load().unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.catalog.mode, CatalogMode::Demo);
        assert_eq!(config.catalog.per_page, 12);
        assert!(!config.identity.guest_fallback);

        unsafe {
            std::env::remove_var("GALLERY_SERVER__PORT");
            std::env::remove_var("GALLERY_CATALOG__MODE");
            std::env::remove_var("GALLERY_CATALOG__PER_PAGE");
            std::env::remove_var("GALLERY_IDENTITY__GUEST_FALLBACK");
        }
    }

    #[test]
    #[serial]
    fn test_s3_backend_requires_bucket() {
        unsafe {
            std::env::set_var("GALLERY_UPLOADS__BACKEND", "s3");
        }

        assert!(GalleryConfig::load().is_err());

        unsafe {
            std::env::remove_var("GALLERY_UPLOADS__BACKEND");
        }
    }
}
