//! Domain models and response payloads

pub mod image;
pub mod like;
pub mod page;
pub mod user;

// Re-export for convenience
pub use image::{Image, ImageView, NewImage};
pub use like::{Like, LikeToggle};
pub use page::{Paginated, Pagination};
pub use user::{NewUser, Role, User, UserSummary};
