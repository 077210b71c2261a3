//! Error taxonomy for the credential core
//!
//! Every failure a caller can act on has its own variant. Storage and crypto
//! failures keep their source for logging but are reported to clients as a
//! generic internal error.

use common::{crypto::CryptoError, error::DatabaseError};
use thiserror::Error;

use crate::models::Permission;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Session-only endpoint called without the cookie
    #[error("Session token not found")]
    MissingSessionToken,

    /// No usable credential
    #[error("Authentication required")]
    Unauthenticated,

    /// Wrong email or password
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Valid credential without any of the required permissions
    #[error("Insufficient permissions")]
    Forbidden { required: Vec<Permission> },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Whether the detail must stay server-side
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AuthError::Storage(_) | AuthError::Crypto(_) | AuthError::Internal(_)
        )
    }
}

/// Type alias for Result with AuthError
pub type AuthResult<T> = Result<T, AuthError>;
