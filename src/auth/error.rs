//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::error::AppError;
use crate::notifications::EventError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Wrong password or unknown username.
    #[error("Invalid username or password.")]
    InvalidCredentials,

    /// Bearer token unknown, expired or malformed.
    #[error("Invalid or expired token.")]
    InvalidToken,

    /// No credentials on a route that needs them.
    #[error("Authentication credentials were not provided.")]
    MissingCredentials,

    /// Authenticated user is not staff.
    #[error("You do not have permission to perform this action.")]
    NotStaff,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// A signup listener failed.
    #[error("signup hook failed: {0}")]
    Event(#[from] EventError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials | AuthError::InvalidToken | AuthError::MissingCredentials => {
                Self::Unauthorized(e.to_string())
            }
            AuthError::NotStaff => Self::Forbidden(e.to_string()),
            AuthError::Repository(e) | AuthError::Event(EventError::Storage(e)) => Self::Repository(e),
            AuthError::Event(_) | AuthError::PasswordHash => Self::Internal(e.to_string()),
        }
    }
}
