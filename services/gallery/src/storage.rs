//! Upload storage
//!
//! Uploaded images are written under a random name and addressed by the
//! public path stored in `images.image_path`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::{Client, primitives::ByteStream};
use image::ImageFormat;
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

use crate::config::UploadConfig;

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store `bytes` and return the public path of the stored file
    async fn put(&self, bytes: Vec<u8>, format: ImageFormat) -> Result<String>;
}

/// `{uuid}.{ext}` for a freshly uploaded file
fn file_name_for(format: ImageFormat) -> String {
    let extension = format.extensions_str().first().copied().unwrap_or("bin");
    format!("{}.{}", Uuid::new_v4().simple(), extension)
}

/// Files on the local disk, served by the static file route
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    directory: String,
    public_prefix: String,
}

impl LocalStorage {
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            root: config.local_root.clone(),
            directory: config.directory.trim_matches('/').to_string(),
            public_prefix: config.public_prefix.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl FileStorage for LocalStorage {
    async fn put(&self, bytes: Vec<u8>, format: ImageFormat) -> Result<String> {
        let directory = self.root.join(&self.directory);
        tokio::fs::create_dir_all(&directory)
            .await
            .with_context(|| format!("Failed to create {}", directory.display()))?;

        let file_name = file_name_for(format);
        let path = directory.join(&file_name);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Stored upload at {}", path.display());
        Ok(format!("{}/{}/{}", self.public_prefix, self.directory, file_name))
    }
}

/// Objects in an S3 bucket
#[derive(Clone)]
pub struct S3Storage {
    s3_client: Client,
    bucket: String,
    directory: String,
    public_base: String,
}

impl S3Storage {
    pub fn new(s3_client: Client, bucket: String, config: &UploadConfig) -> Self {
        let public_base = config
            .s3_public_base
            .clone()
            .unwrap_or_else(|| format!("https://{}.s3.amazonaws.com", bucket));
        Self {
            s3_client,
            bucket,
            directory: config.directory.trim_matches('/').to_string(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    fn key_for(&self, file_name: &str) -> String {
        format!("{}/{}", self.directory, file_name)
    }
}

#[async_trait]
impl FileStorage for S3Storage {
    async fn put(&self, bytes: Vec<u8>, format: ImageFormat) -> Result<String> {
        let key = self.key_for(&file_name_for(format));
        info!("Uploading image to S3: {}", key);

        self.s3_client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(format.to_mime_type())
            .send()
            .await
            .with_context(|| format!("Failed to upload {} to bucket {}", key, self.bucket))?;

        Ok(format!("{}/{}", self.public_base, key))
    }
}
