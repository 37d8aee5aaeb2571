//! Image models for the gallery service

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Persisted image record
#[derive(Debug, Clone, Serialize)]
pub struct Image {
    pub id: i64,
    pub name: String,
    /// Free-text description, called "vibe" throughout the UI
    pub vibe: String,
    pub image_path: String,
    pub user_id: Option<i64>,
    /// Denormalized cache of the user ids with a like row on this image.
    /// Only the like ledger writes it.
    pub liked_by: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Image creation payload
#[derive(Debug, Clone)]
pub struct NewImage {
    pub name: String,
    pub vibe: String,
    pub image_path: String,
    pub user_id: Option<i64>,
}

/// Image as shown to a particular viewer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageView {
    pub id: i64,
    pub name: String,
    pub vibe: String,
    pub image_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    pub liked_by: Vec<i64>,
    pub is_liked: bool,
    pub likes_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ImageView {
    /// Annotate a persisted image for `viewer`
    pub fn for_viewer(image: Image, viewer: Option<i64>) -> Self {
        let is_liked = viewer.is_some_and(|id| image.liked_by.contains(&id));
        Self {
            id: image.id,
            name: image.name,
            vibe: image.vibe,
            image_path: image.image_path,
            user_id: image.user_id,
            likes_count: image.liked_by.len(),
            liked_by: image.liked_by,
            is_liked,
            created_at: Some(image.created_at),
        }
    }

    /// Case-insensitive substring match on the description
    pub fn vibe_matches(&self, needle_lowercase: &str) -> bool {
        self.vibe.to_lowercase().contains(needle_lowercase)
    }

    /// Case-insensitive substring match on name or description
    pub fn name_or_vibe_matches(&self, needle_lowercase: &str) -> bool {
        self.name.to_lowercase().contains(needle_lowercase) || self.vibe_matches(needle_lowercase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(liked_by: Vec<i64>) -> Image {
        let now = Utc::now();
        Image {
            id: 51,
            name: "Sunset".to_string(),
            vibe: "Cozy evening".to_string(),
            image_path: "/storage/images/a.jpg".to_string(),
            user_id: Some(7),
            liked_by,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_view_reflects_viewer_like_state() {
        let view = ImageView::for_viewer(image(vec![3, 7]), Some(7));
        assert!(view.is_liked);
        assert_eq!(view.likes_count, 2);

        let view = ImageView::for_viewer(image(vec![3]), Some(7));
        assert!(!view.is_liked);

        let view = ImageView::for_viewer(image(vec![3]), None);
        assert!(!view.is_liked);
    }

    #[test]
    fn test_search_matchers_ignore_case() {
        let view = ImageView::for_viewer(image(vec![]), None);
        assert!(view.vibe_matches("cozy"));
        assert!(!view.vibe_matches("sunset"));
        assert!(view.name_or_vibe_matches("sunset"));
    }
}
