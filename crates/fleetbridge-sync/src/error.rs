//! Sync error types.

use thiserror::Error;

use fleetbridge_core::CoreError;

/// Errors that can occur while building or dispatching payloads.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network/transport failure talking to the Target API.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The Target rejected our credentials and a refresh did not help.
    #[error("authentication failed: no valid token available")]
    Unauthenticated,

    /// Another run holds the lock for this job.
    #[error("job '{job}' is already running")]
    LockHeld { job: String },

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

impl SyncError {
    /// Create a lock-held error.
    pub fn lock_held(job: impl Into<String>) -> Self {
        Self::LockHeld { job: job.into() }
    }

    /// Whether retrying the same operation later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Network(_) | SyncError::LockHeld { .. })
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
