//! Error types for the chat client.

use thiserror::Error;

use crate::{
    domain::error::{SessionError, ValidationError},
    infrastructure::auth::AuthError,
};

/// Errors that end a client run
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server or the API refused our identity
    #[error("Not authenticated. Please log in again.")]
    Unauthenticated,

    /// Reconnect attempts were exhausted
    #[error("Failed to reconnect after {attempts} attempts")]
    ConnectionFailed { attempts: u32 },

    #[error(transparent)]
    Auth(AuthError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl From<AuthError> for ClientError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Unauthenticated => Self::Unauthenticated,
            other => Self::Auth(other),
        }
    }
}
