//! Demo images synthesized from files on disk
//!
//! A file named `{prefix}{NNN}.{ext}` in the demo directory becomes a
//! read-only pseudo-image with id `NNN`. The listing is rebuilt on every
//! call, so dropping a file into the directory shows up on the next request.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::warn;

use crate::config::DemoConfig;
use crate::models::ImageView;

const DEMO_NAME_PREFIX: &str = "千尋示範圖片";
const DEMO_VIBE: &str = "宮崎駿動畫《神隱少女》的經典場景";

/// Path under which demo files are served
pub const URL_PREFIX: &str = "/images";

/// A demo image before it is annotated for a viewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoImage {
    pub id: u32,
    pub file_name: String,
    pub name: String,
    pub vibe: String,
    pub image_path: String,
}

impl DemoImage {
    /// Payload for `viewer`, whose liked ids are `liked`
    pub fn view(&self, viewer: Option<i64>, liked: &[u32]) -> ImageView {
        let liked_by = match viewer {
            Some(user_id) if liked.contains(&self.id) => vec![user_id],
            _ => Vec::new(),
        };
        ImageView {
            id: self.id as i64,
            name: self.name.clone(),
            vibe: self.vibe.clone(),
            image_path: self.image_path.clone(),
            user_id: None,
            is_liked: !liked_by.is_empty(),
            likes_count: liked_by.len(),
            liked_by,
            created_at: None,
        }
    }
}

/// Enumerates the demo directory
#[derive(Debug, Clone)]
pub struct DemoCatalog {
    directory: PathBuf,
    file_prefix: String,
    extension: String,
    max_id: u32,
}

impl DemoCatalog {
    pub fn new(config: &DemoConfig) -> Self {
        Self {
            directory: config.directory.clone(),
            file_prefix: config.file_prefix.clone(),
            extension: config.extension.to_lowercase(),
            max_id: config.max_id,
        }
    }

    /// On-disk location of `file_name`, for names following the demo pattern
    pub fn file_path(&self, file_name: &str) -> Option<PathBuf> {
        self.id_for(file_name)
            .map(|_| self.directory.join(file_name))
    }

    /// Id encoded in a matching file name, if any
    fn id_for(&self, file_name: &str) -> Option<u32> {
        let (stem, extension) = file_name.rsplit_once('.')?;
        if extension.to_lowercase() != self.extension {
            return None;
        }
        let digits = stem.strip_prefix(&self.file_prefix)?;
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let id: u32 = digits.parse().ok()?;
        (1..=self.max_id).contains(&id).then_some(id)
    }

    /// All demo images, ordered by id. A missing directory yields an empty
    /// catalog.
    pub async fn images(&self) -> Result<Vec<DemoImage>> {
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Demo directory {} does not exist", self.directory.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read demo directory {}", self.directory.display())
                });
            }
        };

        let mut images: Vec<DemoImage> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(id) = self.id_for(&file_name) else {
                continue;
            };
            if images.iter().any(|image| image.id == id) {
                warn!("Skipping {}: demo id {} already taken", file_name, id);
                continue;
            }
            images.push(DemoImage {
                id,
                name: format!("{} {:03}", DEMO_NAME_PREFIX, id),
                vibe: DEMO_VIBE.to_string(),
                image_path: format!("{}/{}", URL_PREFIX, file_name),
                file_name,
            });
        }

        images.sort_by_key(|image| image.id);
        Ok(images)
    }

    pub async fn find(&self, id: u32) -> Result<Option<DemoImage>> {
        if !(1..=self.max_id).contains(&id) {
            return Ok(None);
        }
        Ok(self.images().await?.into_iter().find(|image| image.id == id))
    }
}
