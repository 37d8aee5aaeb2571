//! Custom error types for the gallery service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::error;

/// Field-level validation messages, keyed by form field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First message recorded for `field`
    pub fn first(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(|messages| messages.first())
            .map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// One message per field, the shape flashed back to forms
    pub fn to_flash(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .filter_map(|(field, messages)| {
                messages
                    .first()
                    .map(|message| (field.clone(), message.clone()))
            })
            .collect()
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> GalleryResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(GalleryError::Validation(self))
        }
    }
}

/// Custom error type for the gallery service
#[derive(Error, Debug)]
pub enum GalleryError {
    /// Malformed or missing input
    #[error("The given data was invalid")]
    Validation(FieldErrors),

    /// Request body could not be read
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The requested image does not exist
    #[error("Resource not found")]
    NotFound,

    /// No acting user could be resolved for the request
    #[error("Authentication required")]
    Unauthenticated,

    /// Login attempt with a wrong password or a guest account
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Unique constraint violation surfaced to the client
    #[error("{0}")]
    Conflict(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] common::error::DatabaseError),

    /// Session store, upload storage or hashing failure
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl IntoResponse for GalleryError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            GalleryError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": "The given data was invalid",
                    "errors": errors,
                }),
            ),
            GalleryError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, json!({ "error": message }))
            }
            GalleryError::NotFound => (
                StatusCode::NOT_FOUND,
                json!({ "error": "Resource not found" }),
            ),
            GalleryError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Authentication required" }),
            ),
            GalleryError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "Invalid email or password" }),
            ),
            GalleryError::Conflict(message) => {
                (StatusCode::CONFLICT, json!({ "error": message }))
            }
            GalleryError::Database(e) => {
                error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Database error" }),
                )
            }
            GalleryError::Backend(e) => {
                error!("Backend error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Type alias for gallery results
pub type GalleryResult<T> = Result<T, GalleryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_keep_first_message_per_field() {
        let mut errors = FieldErrors::new();
        errors.add("name", "圖片名稱是必填的");
        errors.add("name", "second");
        errors.add("image", "請選擇要上傳的圖片");

        let flash = errors.to_flash();
        assert_eq!(flash.get("name").map(String::as_str), Some("圖片名稱是必填的"));
        assert_eq!(flash.len(), 2);
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            GalleryError::NotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GalleryError::Unauthenticated.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GalleryError::Validation(FieldErrors::new())
                .into_response()
                .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
