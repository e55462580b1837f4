//! CLI error type.

use thiserror::Error;

/// Errors surfaced to the operator.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration file problems.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] fleetbridge_core::CoreError),

    #[error(transparent)]
    Resolver(#[from] fleetbridge_resolver::ResolverError),

    #[error(transparent)]
    Sync(#[from] fleetbridge_sync::SyncError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;
