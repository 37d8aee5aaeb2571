//! Password hashing and credential checks

use anyhow::anyhow;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand::{Rng, distributions::Alphanumeric};
use tracing::info;

use crate::error::{GalleryError, GalleryResult};
use crate::models::User;
use crate::repositories::UserRepository;

/// Hash a password with argon2 on a blocking thread
pub async fn hash_password(password: String) -> GalleryResult<String> {
    let hash = tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut rand::thread_rng());
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow!("Failed to hash password: {}", e))
    })
    .await
    .map_err(|e| anyhow!("Password hashing task failed: {}", e))??;

    Ok(hash)
}

/// Verify a password against a stored argon2 hash
pub async fn verify_password(password_hash: String, password: String) -> GalleryResult<bool> {
    let verified = tokio::task::spawn_blocking(move || {
        let parsed_hash = PasswordHash::new(&password_hash)
            .map_err(|e| anyhow!("Failed to parse password hash: {}", e))?;
        Ok::<bool, anyhow::Error>(
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok(),
        )
    })
    .await
    .map_err(|e| anyhow!("Password verification task failed: {}", e))??;

    Ok(verified)
}

/// Hash of a random secret nobody knows, for accounts that never log in
pub async fn unguessable_password_hash() -> GalleryResult<String> {
    let secret: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect();
    hash_password(secret).await
}

/// Check an email/password pair. Guest accounts are always rejected, even
/// when the password happens to match.
pub async fn authenticate(
    users: &dyn UserRepository,
    email: &str,
    password: &str,
) -> GalleryResult<User> {
    let user = users
        .find_by_email(email)
        .await?
        .ok_or(GalleryError::InvalidCredentials)?;

    if !user.can_login() {
        info!("Rejected password login for guest account {}", user.id);
        return Err(GalleryError::InvalidCredentials);
    }

    if !verify_password(user.password_hash.clone(), password.to_string()).await? {
        return Err(GalleryError::InvalidCredentials);
    }

    Ok(user)
}
