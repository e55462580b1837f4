//! Resolver error types.

use thiserror::Error;

use fleetbridge_core::CoreError;

/// Errors from resolution and override-store operations.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// An override rule failed validation.
    #[error("invalid override rule: {message}")]
    InvalidRule { message: String },

    /// Core file/envelope error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResolverError {
    /// Create an invalid-rule error.
    pub fn invalid_rule(message: impl Into<String>) -> Self {
        Self::InvalidRule {
            message: message.into(),
        }
    }
}

/// Result type for resolver operations.
pub type ResolverResult<T> = Result<T, ResolverError>;
