//! Acting-user resolution
//!
//! Every request runs on behalf of either the account logged into its
//! session or, when guest fallback is on, a guest account derived from the
//! session id.

use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth;
use crate::error::{GalleryError, GalleryResult};
use crate::likes::Actor;
use crate::models::{NewUser, Role, User};
use crate::repositories::UserRepository;
use crate::session::Session;
use crate::state::AppState;

/// Display name given to every guest account
pub const GUEST_NAME: &str = "示範訪客";

/// Email that keys the guest account of a session
pub fn guest_email(session_id: &str) -> String {
    format!("guest_{}@demo.local", session_id)
}

/// Resolves the acting user for a session
#[derive(Clone)]
pub struct IdentityResolver {
    users: Arc<dyn UserRepository>,
    guest_fallback: bool,
}

impl IdentityResolver {
    pub fn new(users: Arc<dyn UserRepository>, guest_fallback: bool) -> Self {
        Self {
            users,
            guest_fallback,
        }
    }

    /// The logged-in account, else a guest when fallback is enabled
    pub async fn resolve(&self, session: &Session) -> GalleryResult<Option<User>> {
        if let Some(user_id) = session.user_id().await? {
            match self.users.find_by_id(user_id).await? {
                Some(user) => return Ok(Some(user)),
                None => {
                    warn!("Session {} refers to missing user {}", session.id(), user_id);
                    session.logout().await?;
                }
            }
        }

        if !self.guest_fallback {
            return Ok(None);
        }

        let guest = self.get_or_create_guest(session).await?;
        session.login(guest.id).await?;
        Ok(Some(guest))
    }

    /// Idempotent per session: the same session always maps to the same row
    pub async fn get_or_create_guest(&self, session: &Session) -> GalleryResult<User> {
        let email = guest_email(&session.id());
        if let Some(user) = self.users.find_by_email(&email).await? {
            return Ok(user);
        }

        let new_guest = NewUser {
            name: GUEST_NAME.to_string(),
            email,
            password_hash: auth::unguessable_password_hash().await?,
            role: Role::Guest,
        };
        let guest = self.users.get_or_create(&new_guest).await?;
        info!("Provisioned guest user {} for session {}", guest.id, session.id());
        Ok(guest)
    }
}

/// Per-request context: the session handle and the resolved acting user
#[derive(Clone)]
pub struct RequestContext {
    pub session: Session,
    pub user: Option<User>,
}

impl RequestContext {
    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|user| user.id)
    }

    pub fn actor(&self) -> Option<Actor<'_>> {
        self.user.as_ref().map(|user| Actor {
            user,
            session: &self.session,
        })
    }

    /// The acting user, or `Unauthenticated` in strict mode
    pub fn require_user(&self) -> GalleryResult<&User> {
        self.user.as_ref().ok_or(GalleryError::Unauthenticated)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = GalleryError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| GalleryError::Backend(anyhow::anyhow!("Session layer is not installed")))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = GalleryError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        let user = state.identity.resolve(&session).await?;
        Ok(RequestContext { session, user })
    }
}
