//! Identity Resolution
//!
//! Decides which Target customer record owns each Source device, honoring
//! manually curated overrides for documents that are ambiguous, duplicated
//! across branches, or absent.
//!
//! ## Key Components
//!
//! - [`resolve`] - Three-tier lookup (exception override → direct match →
//!   unresolved) for a (document, department) pair
//! - [`partition`] - Splits the device population into an automatic view and
//!   a manual-review view with inspectable escalation reasons
//! - [`ExceptionStore`] / [`ManualFlagStore`] - Durable operator overrides
//!
//! ## Resolution Flow
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────────┐
//! │ DeviceRecord │────►│ Exception scan    │────►│ Direct tax-id    │
//! │ (doc, dept)  │     │ (first doc match) │     │ match            │
//! └──────────────┘     └─────────┬─────────┘     └────────┬─────────┘
//!                                │ hit                    │ miss
//!                                ▼                        ▼
//!                          source=exception          source=none
//! ```

pub mod error;
pub mod partition;
pub mod resolver;
pub mod store;
pub mod types;

// Re-exports for convenience
pub use error::{ResolverError, ResolverResult};
pub use partition::{
    partition, AutomaticEntry, ClassifiedView, DepartmentEntry, EscalationReason, MappingStatus,
    ManualGroup,
};
pub use resolver::resolve;
pub use store::{ExceptionStore, ManualFlagSet, ManualFlagStore};
pub use types::{
    CustomerRecord, DeviceRecord, DeviceStatus, ExceptionRule, ResolutionResult, ResolutionSource,
    TargetEquipment,
};
