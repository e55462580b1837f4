//! Shared error type for core plumbing.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from core file and envelope handling.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A required input file is missing.
    #[error("required file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// A snapshot or payload file could not be decoded.
    #[error("malformed file {path}: {message}")]
    MalformedFile { path: PathBuf, message: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Create a file-not-found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a malformed-file error.
    pub fn malformed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::MalformedFile {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
