//! Payload differencing.
//!
//! For each Source device, decides whether a matching Target equipment
//! record already exists (serial lookup) and emits either a full creation
//! object or a minimal ordered field-patch list. Each run is a fresh diff
//! against the current snapshots; no prior payload state is consulted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, warn};
use uuid::Uuid;

use fleetbridge_resolver::{resolve, CustomerRecord, DeviceRecord, ExceptionRule, TargetEquipment};

use crate::spec::{build_specifications, DeviceCounters, DeviceSupplies, SpecificationRow};

/// Placeholder name for devices with neither manufacturer nor model.
const UNNAMED_EQUIPMENT: &str = "Unnamed equipment";

/// Target category ids per color mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryMap {
    #[serde(default = "default_monochrome_id")]
    pub monochrome_id: i64,
    #[serde(default = "default_color_id")]
    pub color_id: i64,
    #[serde(default = "default_unknown_id")]
    pub unknown_id: i64,
}

fn default_monochrome_id() -> i64 {
    44_958
}

fn default_color_id() -> i64 {
    44_959
}

fn default_unknown_id() -> i64 {
    44_961
}

impl Default for CategoryMap {
    fn default() -> Self {
        Self {
            monochrome_id: default_monochrome_id(),
            color_id: default_color_id(),
            unknown_id: default_unknown_id(),
        }
    }
}

impl CategoryMap {
    /// Category id for a raw color-mode token.
    #[must_use]
    pub fn category_for(&self, color: &str) -> i64 {
        match color.to_lowercase().as_str() {
            "monochrome" | "black" | "mono" => self.monochrome_id,
            "colorful" | "color" => self.color_id,
            _ => self.unknown_id,
        }
    }
}

/// Serial-to-id index over the Target equipment snapshot, built once per run.
#[derive(Debug, Clone, Default)]
pub struct EquipmentIndex {
    by_serial: HashMap<String, i64>,
}

impl EquipmentIndex {
    /// Build the index; rows without a serial or a positive id are ignored.
    #[must_use]
    pub fn build(equipment: &[TargetEquipment]) -> Self {
        let mut by_serial = HashMap::new();
        for item in equipment {
            let serial = item.identifier.trim();
            if serial.is_empty() || item.id <= 0 {
                continue;
            }
            by_serial.insert(serial.to_string(), item.id);
        }
        Self { by_serial }
    }

    /// Target equipment id registered under a serial, if any.
    #[must_use]
    pub fn lookup(&self, serial: &str) -> Option<i64> {
        self.by_serial.get(serial.trim()).copied()
    }

    /// Number of indexed serials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_serial.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_serial.is_empty()
    }

    /// Serials present in Target but absent from the given Source set.
    #[must_use]
    pub fn orphans(&self, source_serials: &[&str]) -> Vec<String> {
        let known: std::collections::HashSet<&str> =
            source_serials.iter().map(|s| s.trim()).collect();
        let mut orphans: Vec<String> = self
            .by_serial
            .keys()
            .filter(|serial| !known.contains(serial.as_str()))
            .cloned()
            .collect();
        orphans.sort();
        orphans
    }
}

/// Full creation object for the Target's equipment-creation contract.
///
/// Fields the engine does not populate yet are sent as defined placeholders
/// rather than omitted; the Target requires the complete shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEquipment {
    pub external_id: String,
    pub parent_equipment_id: i64,
    pub associated_customer_id: i64,
    pub associated_user_id: i64,
    pub category_id: i64,
    pub name: String,
    pub description: String,
    pub identifier: String,
    pub base64_image: Option<String>,
    pub expiration_date: Option<String>,
    pub active: bool,
    pub equipment_specifications: Vec<SpecificationRow>,
    pub attachments: Vec<Value>,
    pub warranty_start_date: Option<String>,
    pub warranty_end_date: Option<String>,
}

/// One `{path, value}` entry of an update patch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldPatch {
    pub path: String,
    pub value: Value,
}

/// Minimal update for an equipment record that already exists in Target.
///
/// Carries only the mutable fields a reconciliation run owns; identity
/// fields (name, identifier) are immutable post-creation and never appear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEquipment {
    pub id: i64,
    pub patch: Vec<FieldPatch>,
}

/// A dispatchable payload item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SyncPayloadItem {
    Create(CreateEquipment),
    Update(UpdateEquipment),
}

impl SyncPayloadItem {
    /// Short identifier for logs: serial on create, target id on update.
    #[must_use]
    pub fn log_key(&self) -> String {
        match self {
            SyncPayloadItem::Create(create) if create.identifier.is_empty() => {
                create.name.clone()
            }
            SyncPayloadItem::Create(create) => create.identifier.clone(),
            SyncPayloadItem::Update(update) => update.id.to_string(),
        }
    }
}

/// Output of one differencing run.
#[derive(Debug, Clone, Default)]
pub struct PayloadBundle {
    pub creations: Vec<CreateEquipment>,
    pub updates: Vec<UpdateEquipment>,
    /// Devices whose owner could not be resolved (sent with customer id 0).
    pub unresolved: usize,
}

/// Display name for a device: manufacturer + model, first non-empty part,
/// or a literal placeholder.
fn display_name(device: &DeviceRecord) -> String {
    let manufacturer = device.manufacturer.trim();
    let model = device.model.trim();
    let joined = format!("{manufacturer} {model}");
    let joined = joined.trim();
    if !joined.is_empty() {
        return joined.to_string();
    }
    UNNAMED_EQUIPMENT.to_string()
}

/// Diff the device population against the Target equipment index.
///
/// Resolution is a live call per device, so freshly saved exception rules
/// apply immediately; unresolved owners are emitted with customer id 0 and
/// logged as data-quality issues.
#[must_use]
pub fn build_payloads(
    devices: &[DeviceRecord],
    counters: &HashMap<Uuid, DeviceCounters>,
    supplies: &HashMap<Uuid, DeviceSupplies>,
    index: &EquipmentIndex,
    customers: &[CustomerRecord],
    exceptions: &[ExceptionRule],
    categories: &CategoryMap,
    now: DateTime<Utc>,
) -> PayloadBundle {
    let mut bundle = PayloadBundle::default();

    for device in devices {
        let serial = device.serial_number.trim();
        let name = display_name(device);
        let category_id = categories.category_for(&device.color);
        let active = device.status.is_active();

        let resolution = resolve(device.document(), device.department(), customers, exceptions);
        let customer_id = resolution.target_customer_id.unwrap_or(0);
        if customer_id == 0 {
            bundle.unresolved += 1;
            warn!(
                serial,
                customer = %device.customer.name,
                "no Target customer resolved for device"
            );
        }

        let specifications = build_specifications(
            device,
            counters.get(&device.id),
            supplies.get(&device.id),
            now,
        );

        match index.lookup(serial) {
            Some(target_id) => bundle.updates.push(UpdateEquipment {
                id: target_id,
                patch: vec![
                    FieldPatch {
                        path: "associatedCustomerId".to_string(),
                        value: json!(customer_id),
                    },
                    FieldPatch {
                        path: "categoryId".to_string(),
                        value: json!(category_id),
                    },
                    FieldPatch {
                        path: "active".to_string(),
                        value: json!(active),
                    },
                    FieldPatch {
                        path: "equipmentSpecifications".to_string(),
                        value: json!(specifications),
                    },
                ],
            }),
            None => bundle.creations.push(CreateEquipment {
                external_id: String::new(),
                parent_equipment_id: 0,
                associated_customer_id: customer_id,
                associated_user_id: 0,
                category_id,
                name,
                description: String::new(),
                identifier: serial.to_string(),
                base64_image: None,
                expiration_date: None,
                active,
                equipment_specifications: Vec::new(),
                attachments: Vec::new(),
                warranty_start_date: None,
                warranty_end_date: None,
            }),
        }
    }

    debug!(
        creations = bundle.creations.len(),
        updates = bundle.updates.len(),
        unresolved = bundle.unresolved,
        "payload bundle built"
    );
    bundle
}
