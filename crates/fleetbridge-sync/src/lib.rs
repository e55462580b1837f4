//! Payload Building and Dispatch
//!
//! Converts resolved, enriched device state into minimal create/update
//! instructions for the Target platform, and replays them against the
//! Target API under retry, backoff, and token-expiry constraints.
//!
//! ## Key Components
//!
//! - [`spec`] - Derives human-readable specification rows from telemetry
//! - [`payload`] - Diffs devices against the Target equipment index into
//!   create/update payload items
//! - [`gateway`] - Target API boundary (trait + reqwest implementation)
//! - [`token`] - Cached bearer credential with transparent refresh
//! - [`dispatcher`] - Strictly sequential, rate-limited replay of payloads
//! - [`lock`] - Advisory per-job lock files
//!
//! ## Dispatch Flow
//!
//! ```text
//! ┌───────────────┐     ┌──────────────┐     ┌─────────────────┐
//! │ Payload files │────►│  Dispatcher  │────►│  Target API     │
//! │ (create/patch)│     │ (sequential) │     │ (POST / PATCH)  │
//! └───────────────┘     └──────┬───────┘     └─────────────────┘
//!                              │ 401 → refresh (≤3) · 403 → backoff (≤6)
//!                              ▼
//!                       ┌──────────────┐
//!                       │ TokenManager │
//!                       └──────────────┘
//! ```

pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod lock;
pub mod payload;
pub mod spec;
pub mod token;

// Re-exports for convenience
pub use dispatcher::{DispatchOutcome, DispatchSummary, Dispatcher, RetryPolicy};
pub use error::{SyncError, SyncResult};
pub use gateway::{HttpTargetGateway, SendStatus, TargetGateway};
pub use lock::JobLock;
pub use payload::{
    build_payloads, CategoryMap, CreateEquipment, EquipmentIndex, FieldPatch, PayloadBundle,
    SyncPayloadItem, UpdateEquipment,
};
pub use spec::{build_specifications, DeviceCounters, DeviceSupplies, SpecificationRow};
pub use token::{TokenGrant, TokenManager};
