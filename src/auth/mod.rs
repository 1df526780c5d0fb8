//! Accounts and bearer-token authentication.
//!
//! Passwords are hashed with Argon2id. Tokens are 32 random bytes encoded as
//! URL-safe base64 and stored with an expiry; clients send them as
//! `Authorization: Bearer <token>`.

mod error;
mod extract;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub use error::AuthError;
pub use extract::{authenticate, OptionalUser, RequireAdmin, RequireUser, ValidatedJson};

use crate::db::Store;
use crate::domain::aggregates::{NewUser, User};
use crate::domain::events::DomainEvent;
use crate::notifications::EventBus;

/// Signup payload.
#[derive(Debug, Deserialize, Validate)]
pub struct Registration {
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Creates the user and runs the signup listeners.
///
/// A required listener error fails the signup, so a registered user always
/// has a customer. Best-effort listener failures are only logged.
pub async fn register_user(store: &dyn Store, events: &EventBus, registration: Registration) -> Result<User, AuthError> {
    let password_hash = hash_password(&registration.password)?;
    let user = store
        .create_user(&NewUser {
            username: registration.username,
            email: registration.email,
            first_name: registration.first_name,
            last_name: registration.last_name,
            password_hash,
            is_staff: false,
        })
        .await?;
    events.dispatch(&DomainEvent::UserCreated { user_id: user.id }).await?;
    tracing::info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user)
}

/// Exchanges credentials for a new bearer token.
pub async fn issue_token(store: &dyn Store, username: &str, password: &str, ttl: Duration) -> Result<IssuedToken, AuthError> {
    let (user, hash) = store.find_credentials(username).await?.ok_or(AuthError::InvalidCredentials)?;
    verify_password(password, &hash)?;

    let now = Utc::now();
    let purged = store.purge_expired_tokens(now).await?;
    if purged > 0 {
        tracing::debug!(purged, "expired tokens removed");
    }

    let token = generate_token();
    let expires_at = now + ttl;
    store.store_token(&token, user.id, expires_at).await?;
    tracing::debug!(user_id = %user.id, %expires_at, "token issued");
    Ok(IssuedToken { token, expires_at })
}

/// Hash a password using Argon2id.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
