//! Equipment specification rows.
//!
//! Derives the ordered list of human-readable attribute rows the Target
//! displays for a piece of equipment: core device attributes, counter
//! totals, and supply levels. Row values are strings; the Target renders
//! them verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use fleetbridge_resolver::{DeviceRecord, DeviceStatus};

/// One `{name, specification}` row, in the Target's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificationRow {
    pub name: String,
    pub specification: String,
}

impl SpecificationRow {
    fn new(name: impl Into<String>, specification: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            specification: specification.into(),
        }
    }
}

/// Device reference embedded in counter/supply snapshot blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRef {
    pub id: Uuid,
}

/// One counter reading from the Source telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterReading {
    #[serde(rename = "type", default)]
    pub counter_type: String,
    #[serde(default)]
    pub total_count: Option<i64>,
    /// Older snapshots carry the total under `count`.
    #[serde(default)]
    pub count: Option<i64>,
}

impl CounterReading {
    /// Usable total, whichever field the snapshot used.
    #[must_use]
    pub fn total(&self) -> Option<i64> {
        self.total_count.or(self.count)
    }
}

/// Per-device counter block from the counters snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCounters {
    #[serde(default)]
    pub printer: Option<DeviceRef>,
    /// Flat-form alternative to the nested `printer.id`.
    #[serde(default)]
    pub printer_id: Option<Uuid>,
    #[serde(default)]
    pub counters: Vec<CounterReading>,
}

impl DeviceCounters {
    /// Device this block belongs to.
    #[must_use]
    pub fn device_id(&self) -> Option<Uuid> {
        self.printer.as_ref().map(|p| p.id).or(self.printer_id)
    }
}

/// Supply level, usually a percentage description.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LevelDescription {
    Text(String),
    Number(serde_json::Number),
    /// Some models report a list of level strings.
    List(Vec<String>),
}

impl LevelDescription {
    /// Render for display; list entries join with a comma.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            LevelDescription::Text(s) => s.clone(),
            LevelDescription::Number(n) => n.to_string(),
            LevelDescription::List(items) => items.join(", "),
        }
    }
}

/// Nested level block of a supply reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyLevel {
    #[serde(default)]
    pub description: Option<LevelDescription>,
}

/// One supply reading (toner cartridge, ink tank, drum, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplyReading {
    #[serde(rename = "type", default)]
    pub supply_type: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub level: Option<SupplyLevel>,
}

/// Supply snapshot entries arrive either as single readings or grouped
/// lists; both shapes are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SupplyGroup {
    Many(Vec<SupplyReading>),
    One(SupplyReading),
}

/// Per-device supply block from the supplies snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSupplies {
    #[serde(default)]
    pub printer: Option<DeviceRef>,
    #[serde(default)]
    pub printer_id: Option<Uuid>,
    #[serde(default)]
    pub supplies: Vec<SupplyGroup>,
}

impl DeviceSupplies {
    /// Device this block belongs to.
    #[must_use]
    pub fn device_id(&self) -> Option<Uuid> {
        self.printer.as_ref().map(|p| p.id).or(self.printer_id)
    }

    /// Flattened readings regardless of grouping.
    pub fn readings(&self) -> impl Iterator<Item = &SupplyReading> {
        self.supplies.iter().flat_map(|group| match group {
            SupplyGroup::Many(list) => list.as_slice(),
            SupplyGroup::One(single) => std::slice::from_ref(single),
        })
    }
}

/// Display timestamp convention of the Target: `HH:MM dd/mm/yyyy`.
fn display_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%H:%M %d/%m/%Y").to_string()
}

/// Capitalize the first character of a raw token for display.
fn capitalize(raw: &str) -> String {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Human label for a device status.
fn status_label(status: &DeviceStatus) -> String {
    match status {
        DeviceStatus::Online => "Communication ok".to_string(),
        DeviceStatus::CountManual => "Manual counter".to_string(),
        DeviceStatus::Offline => "No communication".to_string(),
        DeviceStatus::InDealer => "In stock".to_string(),
        DeviceStatus::Other(raw) if raw.is_empty() => "Unknown".to_string(),
        DeviceStatus::Other(raw) => capitalize(raw),
    }
}

/// Display label for a counter type token, or a raw fallback.
fn counter_label(counter_type: &str) -> String {
    match counter_type.to_lowercase().as_str() {
        "blackandwhite" | "mono" | "bw" => "Total counter (mono)".to_string(),
        "color" | "colorful" | "fullcolor" => "Total counter (color)".to_string(),
        "a3blackandwhite" => "Large format counter (mono)".to_string(),
        "a3color" => "Large format counter (color)".to_string(),
        "scan" | "scanner" => "Scan".to_string(),
        _ => format!("Counter: {counter_type}"),
    }
}

/// Display label for a supply color token.
fn color_label(color: &str) -> String {
    match color.to_lowercase().as_str() {
        "black" => "Black".to_string(),
        "cyan" => "Cyan".to_string(),
        "magenta" => "Magenta".to_string(),
        "yellow" => "Yellow".to_string(),
        "" => "Unknown".to_string(),
        other => capitalize(other),
    }
}

/// Build the full specification row list for a device.
///
/// Core rows are emitted only when the source value is non-empty, except
/// the backup flag (always) and the sync timestamp (`now`, always). Counter
/// rows skip entries without a usable total; supply rows consider only
/// toner and ink types.
#[must_use]
pub fn build_specifications(
    device: &DeviceRecord,
    counters: Option<&DeviceCounters>,
    supplies: Option<&DeviceSupplies>,
    now: DateTime<Utc>,
) -> Vec<SpecificationRow> {
    let mut rows = Vec::new();

    let department = device.department();
    if !department.is_empty() {
        rows.push(SpecificationRow::new("Department", department));
    }
    let observation = device.observation.trim();
    if !observation.is_empty() {
        rows.push(SpecificationRow::new("Notes", observation));
    }
    if !device.ip_address.is_empty() {
        rows.push(SpecificationRow::new("IP", &device.ip_address));
    }
    if !device.mac_address.is_empty() {
        rows.push(SpecificationRow::new("MAC", &device.mac_address));
    }
    rows.push(SpecificationRow::new(
        "Backup",
        if device.is_backup { "Yes" } else { "No" },
    ));
    let installation_point = device.installation_point.trim();
    if !installation_point.is_empty() {
        rows.push(SpecificationRow::new(
            "Installation point",
            installation_point,
        ));
    }
    rows.push(SpecificationRow::new("Status", status_label(&device.status)));

    if let Some(last) = &device.last_communication {
        rows.push(SpecificationRow::new(
            "Last source communication",
            display_timestamp(last),
        ));
    }
    rows.push(SpecificationRow::new(
        "Last sync communication",
        display_timestamp(&now),
    ));

    if let Some(block) = counters {
        for counter in &block.counters {
            let Some(total) = counter.total() else {
                continue;
            };
            rows.push(SpecificationRow::new(
                counter_label(&counter.counter_type),
                total.to_string(),
            ));
        }
    }

    if let Some(block) = supplies {
        for reading in block.readings() {
            let kind = if reading.supply_type.eq_ignore_ascii_case("Toner") {
                "Toner"
            } else if reading.supply_type.eq_ignore_ascii_case("Tinta") {
                "Ink"
            } else {
                continue;
            };

            let level = reading
                .level
                .as_ref()
                .and_then(|l| l.description.as_ref())
                .map_or_else(|| "-".to_string(), LevelDescription::render);

            rows.push(SpecificationRow::new(
                format!("Supply - {kind} {} (%)", color_label(&reading.color)),
                level,
            ));
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fleetbridge_resolver::types::{CustomerRef, LocationRef};

    fn device() -> DeviceRecord {
        DeviceRecord {
            id: Uuid::new_v4(),
            serial_number: "SN1".to_string(),
            manufacturer: "Lexmark".to_string(),
            model: "MX622".to_string(),
            color: "monochrome".to_string(),
            status: DeviceStatus::Online,
            ip_address: "10.0.0.9".to_string(),
            mac_address: String::new(),
            is_backup: false,
            observation: String::new(),
            installation_point: "Reception".to_string(),
            last_communication: Some(Utc.with_ymd_and_hms(2024, 3, 5, 18, 40, 0).unwrap()),
            customer: CustomerRef::default(),
            location: LocationRef {
                department: "Matriz".to_string(),
                city: String::new(),
                cpf: None,
                cnpj: None,
            },
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 6, 12, 30, 0).unwrap()
    }

    fn find<'a>(rows: &'a [SpecificationRow], name: &str) -> Option<&'a str> {
        rows.iter()
            .find(|r| r.name == name)
            .map(|r| r.specification.as_str())
    }

    #[test]
    fn test_core_rows_skip_empty_values() {
        let rows = build_specifications(&device(), None, None, at());

        assert_eq!(find(&rows, "Department"), Some("Matriz"));
        assert_eq!(find(&rows, "IP"), Some("10.0.0.9"));
        assert_eq!(find(&rows, "Installation point"), Some("Reception"));
        // Empty values produce no row at all.
        assert_eq!(find(&rows, "MAC"), None);
        assert_eq!(find(&rows, "Notes"), None);
        // Backup is always present.
        assert_eq!(find(&rows, "Backup"), Some("No"));
    }

    #[test]
    fn test_status_labels() {
        let mut d = device();
        assert_eq!(find(&build_specifications(&d, None, None, at()), "Status"), Some("Communication ok"));

        d.status = DeviceStatus::InDealer;
        assert_eq!(find(&build_specifications(&d, None, None, at()), "Status"), Some("In stock"));

        d.status = DeviceStatus::Other("sleeping".to_string());
        assert_eq!(find(&build_specifications(&d, None, None, at()), "Status"), Some("Sleeping"));

        d.status = DeviceStatus::Other(String::new());
        assert_eq!(find(&build_specifications(&d, None, None, at()), "Status"), Some("Unknown"));
    }

    #[test]
    fn test_timestamps_use_display_convention() {
        let rows = build_specifications(&device(), None, None, at());
        assert_eq!(
            find(&rows, "Last source communication"),
            Some("18:40 05/03/2024")
        );
        assert_eq!(find(&rows, "Last sync communication"), Some("12:30 06/03/2024"));
    }

    #[test]
    fn test_missing_last_communication_has_no_row() {
        let mut d = device();
        d.last_communication = None;
        let rows = build_specifications(&d, None, None, at());
        assert_eq!(find(&rows, "Last source communication"), None);
    }

    #[test]
    fn test_counter_rows() {
        let counters = DeviceCounters {
            printer: None,
            printer_id: None,
            counters: vec![
                CounterReading {
                    counter_type: "blackAndWhite".to_string(),
                    total_count: Some(120_345),
                    count: None,
                },
                CounterReading {
                    counter_type: "a3Color".to_string(),
                    total_count: None,
                    count: Some(18),
                },
                // No usable total: skipped.
                CounterReading {
                    counter_type: "color".to_string(),
                    total_count: None,
                    count: None,
                },
                CounterReading {
                    counter_type: "staples".to_string(),
                    total_count: Some(7),
                    count: None,
                },
            ],
        };

        let rows = build_specifications(&device(), Some(&counters), None, at());
        assert_eq!(find(&rows, "Total counter (mono)"), Some("120345"));
        assert_eq!(find(&rows, "Large format counter (color)"), Some("18"));
        assert_eq!(find(&rows, "Total counter (color)"), None);
        assert_eq!(find(&rows, "Counter: staples"), Some("7"));
    }

    #[test]
    fn test_supply_rows_filter_and_labels() {
        let supplies = DeviceSupplies {
            printer: None,
            printer_id: None,
            supplies: vec![SupplyGroup::Many(vec![
                SupplyReading {
                    supply_type: "toner".to_string(),
                    color: "black".to_string(),
                    level: Some(SupplyLevel {
                        description: Some(LevelDescription::Text("87%".to_string())),
                    }),
                },
                SupplyReading {
                    supply_type: "Tinta".to_string(),
                    color: "purple".to_string(),
                    level: None,
                },
                // Drums and other supply types are ignored.
                SupplyReading {
                    supply_type: "Drum".to_string(),
                    color: "black".to_string(),
                    level: None,
                },
            ])],
        };

        let rows = build_specifications(&device(), None, Some(&supplies), at());
        assert_eq!(find(&rows, "Supply - Toner Black (%)"), Some("87%"));
        assert_eq!(find(&rows, "Supply - Ink Purple (%)"), Some("-"));
        assert!(!rows.iter().any(|r| r.name.contains("Drum")));
    }

    #[test]
    fn test_supply_level_list_joins_with_comma() {
        let supplies = DeviceSupplies {
            printer: None,
            printer_id: None,
            supplies: vec![SupplyGroup::One(SupplyReading {
                supply_type: "Toner".to_string(),
                color: "cyan".to_string(),
                level: Some(SupplyLevel {
                    description: Some(LevelDescription::List(vec![
                        "40%".to_string(),
                        "low".to_string(),
                    ])),
                }),
            })],
        };

        let rows = build_specifications(&device(), None, Some(&supplies), at());
        assert_eq!(find(&rows, "Supply - Toner Cyan (%)"), Some("40%, low"));
    }

    #[test]
    fn test_supply_block_decodes_nested_snapshot() {
        let raw = r#"{
            "printer": {"id": "3f0e8f5e-6f3a-4a53-9d0e-7f0f2b9a1c11"},
            "supplies": [[{"type": "Toner", "color": "black", "level": {"description": "12%"}}]]
        }"#;
        let block: DeviceSupplies = serde_json::from_str(raw).unwrap();
        assert_eq!(block.readings().count(), 1);
        assert!(block.device_id().is_some());
    }
}
