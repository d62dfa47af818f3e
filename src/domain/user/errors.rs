//! User domain errors

use thiserror::Error;

/// Errors raised while reading or mutating user records
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProfileError {
    /// The subject does not exist or is not visible to this viewer.
    /// Deliberately identical for both cases.
    #[error("User not found")]
    NotFound,

    #[error("Display name already registered")]
    DisplayNameTaken,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid email: {reason}")]
    InvalidEmail { reason: String },

    #[error("Invalid display name: {reason}")]
    InvalidDisplayName { reason: String },

    #[error("Password does not meet requirements: {requirements}")]
    WeakPassword { requirements: String },

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Password hashing failed")]
    PasswordHashing,
}

impl ProfileError {
    /// Whether the caller caused the failure (4xx) as opposed to the backend (5xx)
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            ProfileError::Database { .. } | ProfileError::PasswordHashing
        )
    }

    /// Message safe to place in a response body
    pub fn public_message(&self) -> String {
        match self {
            ProfileError::Database { .. } | ProfileError::PasswordHashing => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}
