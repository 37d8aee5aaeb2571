//! Image gallery service
//!
//! Serves a searchable, paginated image catalog with uploads and per-user
//! likes. Images with ids up to `demo.max_id` are synthesized from files in
//! the demo directory and keep their likes in the session; every other image
//! is a database row whose likes live in the `likes` table.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod demo;
pub mod error;
pub mod identity;
pub mod likes;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod session;
pub mod state;
pub mod storage;
pub mod validation;
pub mod view;

pub use config::GalleryConfig;
pub use error::{GalleryError, GalleryResult};
pub use routes::create_router;
pub use state::{AppState, Backends};
