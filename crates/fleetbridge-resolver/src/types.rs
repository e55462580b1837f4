//! Data model for Source devices, Target customers, and override rules.
//!
//! Wire structs mirror the snapshot JSON of both platforms (camelCase
//! fields, missing-field tolerant). Snapshots are read-only reference data
//! to this crate; only the override rules are mutated, through
//! [`crate::store`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fleetbridge_core::normalize_document;

/// Operational status reported by the Source for a device.
///
/// Unrecognized codes are preserved verbatim so they can be rendered
/// as-is downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceStatus {
    /// Device is communicating normally.
    Online,
    /// Device stopped communicating.
    Offline,
    /// Counters are read manually.
    CountManual,
    /// Device is in dealer stock, not at a customer.
    InDealer,
    /// Any other (or missing) status code, kept raw.
    Other(String),
}

impl DeviceStatus {
    /// Whether this status counts as an active installation.
    ///
    /// Only `online` and `countManual` devices are active; everything else
    /// is dormant from the Target's point of view.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, DeviceStatus::Online | DeviceStatus::CountManual)
    }

    /// Canonical wire token for this status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
            DeviceStatus::CountManual => "countManual",
            DeviceStatus::InDealer => "inDealer",
            DeviceStatus::Other(raw) => raw,
        }
    }
}

impl Default for DeviceStatus {
    fn default() -> Self {
        DeviceStatus::Other(String::new())
    }
}

impl From<String> for DeviceStatus {
    fn from(raw: String) -> Self {
        match raw.to_lowercase().as_str() {
            "online" => DeviceStatus::Online,
            "offline" => DeviceStatus::Offline,
            "countmanual" => DeviceStatus::CountManual,
            "indealer" => DeviceStatus::InDealer,
            _ => DeviceStatus::Other(raw),
        }
    }
}

impl From<DeviceStatus> for String {
    fn from(status: DeviceStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Customer block embedded in a Source device record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerRef {
    /// Customer display name as the Source knows it.
    #[serde(default)]
    pub name: String,
}

/// Location block embedded in a Source device record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationRef {
    /// Organizational department / branch.
    #[serde(default)]
    pub department: String,
    /// City of the installation.
    #[serde(default)]
    pub city: String,
    /// Person tax id, when the holder is an individual.
    #[serde(default)]
    pub cpf: Option<String>,
    /// Business tax id, when the holder is a company.
    #[serde(default)]
    pub cnpj: Option<String>,
}

/// One device record from the Source inventory snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    /// Source-side device id.
    pub id: Uuid,
    /// Hardware serial number; the join key against Target equipment.
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub model: String,
    /// Color mode token (`monochrome`, `colorful`, ...).
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub status: DeviceStatus,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub mac_address: String,
    /// Whether this unit is a backup device.
    #[serde(default)]
    pub is_backup: bool,
    #[serde(default)]
    pub observation: String,
    #[serde(default)]
    pub installation_point: String,
    /// Last time the Source heard from the device.
    #[serde(default)]
    pub last_communication: Option<DateTime<Utc>>,
    #[serde(default)]
    pub customer: CustomerRef,
    #[serde(default)]
    pub location: LocationRef,
}

impl DeviceRecord {
    /// Raw tax document for this device: business id first, person id as
    /// fallback. `None` when the Source has neither.
    #[must_use]
    pub fn document(&self) -> Option<&str> {
        fn pick(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.trim().is_empty())
        }
        pick(&self.location.cnpj).or_else(|| pick(&self.location.cpf))
    }

    /// Normalized (digits-only) document, empty when absent.
    #[must_use]
    pub fn document_normalized(&self) -> String {
        normalize_document(self.document())
    }

    /// Department, trimmed.
    #[must_use]
    pub fn department(&self) -> &str {
        self.location.department.trim()
    }
}

/// One customer record from the Target registry snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    /// Target-side customer id.
    #[serde(default)]
    pub id: i64,
    /// Registered tax id.
    #[serde(default)]
    pub cpf_cnpj: Option<String>,
    /// Display description.
    #[serde(default)]
    pub description: String,
}

/// One equipment record from the Target snapshot, reduced to what the
/// differencer needs: the serial-to-id mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetEquipment {
    #[serde(default)]
    pub id: i64,
    /// Serial number the equipment was registered under.
    #[serde(default)]
    pub identifier: String,
}

/// A manually authored override binding a (document, department) pair to a
/// fixed Target customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionRule {
    /// Document the rule applies to (stored raw, compared normalized).
    pub document: String,
    /// Department the rule applies to (compared case-insensitively).
    pub department_match: String,
    /// Target customer the pair is pinned to.
    pub target_customer_id: i64,
    /// Display description of that customer, captured at save time.
    #[serde(default)]
    pub target_customer_description: String,
}

impl ExceptionRule {
    /// Normalized document of this rule.
    #[must_use]
    pub fn document_normalized(&self) -> String {
        normalize_document(Some(self.document.as_str()))
    }

    /// Normalized department key of this rule.
    #[must_use]
    pub fn department_key(&self) -> String {
        self.department_match.trim().to_uppercase()
    }
}

/// Where a resolution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionSource {
    /// A curated exception rule matched.
    Exception,
    /// The document matched a Target customer's tax id exactly.
    Direct,
    /// No owner could be determined.
    None,
}

/// Outcome of resolving one (document, department) pair.
///
/// Computed on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    /// Owning Target customer, when resolved.
    pub target_customer_id: Option<i64>,
    /// That customer's description, when resolved.
    pub target_customer_description: Option<String>,
    /// Which tier produced the answer.
    pub source: ResolutionSource,
}

impl ResolutionResult {
    /// The unresolved result.
    #[must_use]
    pub fn none() -> Self {
        Self {
            target_customer_id: None,
            target_customer_description: None,
            source: ResolutionSource::None,
        }
    }

    /// Whether a customer id was determined.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.target_customer_id.is_some()
    }
}
