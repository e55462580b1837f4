//! fleetbridge Core Library
//!
//! Shared plumbing for the fleetbridge reconciliation engine.
//!
//! # Modules
//!
//! - [`document`] - Tax-document normalization used as the cross-system join key
//! - [`envelope`] - Snapshot/payload file envelopes and boundary unwrapping
//! - [`status`] - Per-job run status store
//! - [`error`] - Shared error type ([`CoreError`])

pub mod document;
pub mod envelope;
pub mod error;
pub mod status;

// Re-export main types for convenient access
pub use document::normalize_document;
pub use envelope::{decode_records, PayloadFile, PayloadMeta};
pub use error::{CoreError, Result};
pub use status::{JobOutcome, RunStatusStore};
