//! Like model

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Normalized (user, image) favorite row
#[derive(Debug, Clone, Serialize)]
pub struct Like {
    pub id: i64,
    pub user_id: i64,
    pub image_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a toggle, for both persisted and demo images
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LikeToggle {
    #[serde(rename = "isLiked")]
    pub is_liked: bool,
    #[serde(rename = "likesCount")]
    pub likes_count: usize,
    pub liked_by: Vec<i64>,
}

impl LikeToggle {
    pub fn new(is_liked: bool, liked_by: Vec<i64>) -> Self {
        Self {
            is_liked,
            likes_count: liked_by.len(),
            liked_by,
        }
    }
}
