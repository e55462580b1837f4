//! Classification of the device population into automatic and manual views.
//!
//! The automatic view holds documents whose every resolution is a clean
//! direct match; the manual view holds everything an operator must look at,
//! grouped by document with one row per distinct department and an
//! inspectable set of escalation reasons.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

use crate::resolver::resolve;
use crate::store::ManualFlagSet;
use crate::types::{CustomerRecord, DeviceRecord, ExceptionRule, ResolutionSource};

/// Why a document group was promoted to the manual view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationReason {
    /// An operator explicitly flagged the document for manual review.
    ManualFlag,
    /// At least one department of the document resolved to nothing.
    Unresolved,
    /// At least one department is governed by an exception rule.
    ExceptionOverride,
}

/// Mapping state of one department row in a manual group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingStatus {
    /// A Target customer id is known for this department.
    Mapped,
    /// No customer id yet; the operator still has to choose.
    Pending,
}

/// One entry of the automatic view: a document with a clean direct match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomaticEntry {
    /// Document as it appears in the Source.
    pub document_display: String,
    /// Digits-only document.
    pub document_normalized: String,
    /// Source customer name (first device seen for the document).
    pub customer_name: String,
    pub target_customer_id: i64,
    pub target_customer_description: String,
}

/// One department row inside a manual group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentEntry {
    /// Department as observed (placeholder when the Source had none).
    pub department: String,
    pub target_customer_id: Option<i64>,
    pub target_customer_description: Option<String>,
    pub status: MappingStatus,
}

/// One document group of the manual view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualGroup {
    pub document_display: String,
    pub document_normalized: String,
    /// Source customer name (first device seen for the document).
    pub customer_name: String,
    /// Every distinct department observed for this document.
    pub departments: Vec<DepartmentEntry>,
    /// Why the group needs manual attention.
    pub reasons: BTreeSet<EscalationReason>,
}

/// Result of partitioning the device population.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedView {
    pub automatic: Vec<AutomaticEntry>,
    pub manual: Vec<ManualGroup>,
    /// Devices dropped for having no parseable document (data-quality).
    pub skipped_missing_document: usize,
}

/// Placeholder department for devices whose Source record has none.
const NO_DEPARTMENT: &str = "(no department)";

/// Partition devices into the automatic and manual views.
///
/// A document lands in the automatic view only when it resolves `direct`
/// and is not manually flagged. A document group is promoted to the manual
/// view when it is flagged, or any of its (document, department) pairs
/// resolves to nothing or through an exception rule; a promoted group lists
/// *all* departments observed for the document, not just the offending one.
#[must_use]
pub fn partition(
    devices: &[DeviceRecord],
    customers: &[CustomerRecord],
    exceptions: &[ExceptionRule],
    manual_flags: &ManualFlagSet,
) -> ClassifiedView {
    let mut skipped_missing_document = 0usize;

    // Automatic view: direct matches, deduplicated by document.
    let mut automatic: Vec<AutomaticEntry> = Vec::new();
    let mut seen_auto: HashSet<String> = HashSet::new();

    for device in devices {
        let doc_norm = device.document_normalized();
        if doc_norm.is_empty() {
            skipped_missing_document += 1;
            if !device.customer.name.is_empty() {
                warn!(
                    customer = %device.customer.name,
                    serial = %device.serial_number,
                    "device has no parseable document"
                );
            }
            continue;
        }
        if manual_flags.contains(&doc_norm) || seen_auto.contains(&doc_norm) {
            continue;
        }

        let resolution = resolve(device.document(), device.department(), customers, exceptions);
        if resolution.source != ResolutionSource::Direct {
            continue;
        }

        seen_auto.insert(doc_norm.clone());
        automatic.push(AutomaticEntry {
            document_display: device.document().unwrap_or_default().to_string(),
            document_normalized: doc_norm,
            customer_name: device.customer.name.clone(),
            target_customer_id: resolution.target_customer_id.unwrap_or_default(),
            target_customer_description: resolution
                .target_customer_description
                .unwrap_or_default(),
        });
    }

    automatic.sort_by_key(|e| e.customer_name.to_uppercase());

    // Manual view: group every document, promote the ones that need eyes.
    struct GroupAccumulator {
        document_display: String,
        customer_name: String,
        departments: Vec<DepartmentEntry>,
        department_keys: HashSet<String>,
        reasons: BTreeSet<EscalationReason>,
    }

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, GroupAccumulator> = HashMap::new();

    for device in devices {
        let doc_norm = device.document_normalized();
        if doc_norm.is_empty() {
            continue;
        }

        let dept_raw = if device.department().is_empty() {
            NO_DEPARTMENT.to_string()
        } else {
            device.department().to_string()
        };
        let dept_key = dept_raw.to_uppercase();

        let resolution = resolve(device.document(), &dept_raw, customers, exceptions);

        let group = groups.entry(doc_norm.clone()).or_insert_with(|| {
            order.push(doc_norm.clone());
            GroupAccumulator {
                document_display: device.document().unwrap_or_default().to_string(),
                customer_name: device.customer.name.clone(),
                departments: Vec::new(),
                department_keys: HashSet::new(),
                reasons: BTreeSet::new(),
            }
        });

        if !group.department_keys.contains(&dept_key) {
            group.department_keys.insert(dept_key);
            let status = match resolution.target_customer_id {
                Some(id) if id != 0 => MappingStatus::Mapped,
                _ => MappingStatus::Pending,
            };
            group.departments.push(DepartmentEntry {
                department: dept_raw,
                target_customer_id: resolution.target_customer_id,
                target_customer_description: resolution.target_customer_description.clone(),
                status,
            });
        }

        if manual_flags.contains(&doc_norm) {
            group.reasons.insert(EscalationReason::ManualFlag);
        }
        match resolution.source {
            ResolutionSource::None => {
                group.reasons.insert(EscalationReason::Unresolved);
            }
            ResolutionSource::Exception => {
                group.reasons.insert(EscalationReason::ExceptionOverride);
            }
            ResolutionSource::Direct => {}
        }
    }

    let mut manual: Vec<ManualGroup> = Vec::new();
    for doc_norm in order {
        let Some(mut group) = groups.remove(&doc_norm) else {
            continue;
        };
        if group.reasons.is_empty() {
            continue;
        }
        group
            .departments
            .sort_by_key(|d| d.department.to_uppercase());
        manual.push(ManualGroup {
            document_display: group.document_display,
            document_normalized: doc_norm,
            customer_name: group.customer_name,
            departments: group.departments,
            reasons: group.reasons,
        });
    }
    manual.sort_by_key(|g| g.customer_name.to_uppercase());

    debug!(
        automatic = automatic.len(),
        manual = manual.len(),
        skipped = skipped_missing_document,
        "device population partitioned"
    );

    ClassifiedView {
        automatic,
        manual,
        skipped_missing_document,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CustomerRef, DeviceStatus, LocationRef};
    use uuid::Uuid;

    fn device(customer: &str, department: &str, cnpj: Option<&str>) -> DeviceRecord {
        DeviceRecord {
            id: Uuid::new_v4(),
            serial_number: format!("SN-{customer}-{department}"),
            manufacturer: String::new(),
            model: String::new(),
            color: String::new(),
            status: DeviceStatus::Online,
            ip_address: String::new(),
            mac_address: String::new(),
            is_backup: false,
            observation: String::new(),
            installation_point: String::new(),
            last_communication: None,
            customer: CustomerRef {
                name: customer.to_string(),
            },
            location: LocationRef {
                department: department.to_string(),
                city: String::new(),
                cpf: None,
                cnpj: cnpj.map(str::to_string),
            },
        }
    }

    fn customer(id: i64, tax_id: &str, description: &str) -> CustomerRecord {
        CustomerRecord {
            id,
            cpf_cnpj: Some(tax_id.to_string()),
            description: description.to_string(),
        }
    }

    fn rule(document: &str, department: &str, id: i64) -> ExceptionRule {
        ExceptionRule {
            document: document.to_string(),
            department_match: department.to_string(),
            target_customer_id: id,
            target_customer_description: format!("customer {id}"),
        }
    }

    #[test]
    fn test_clean_direct_match_is_automatic_only() {
        let devices = vec![device("ACME", "Matriz", Some("111"))];
        let customers = vec![customer(5, "111", "ACME Target")];

        let view = partition(&devices, &customers, &[], &ManualFlagSet::default());
        assert_eq!(view.automatic.len(), 1);
        assert_eq!(view.automatic[0].target_customer_id, 5);
        assert!(view.manual.is_empty());
    }

    #[test]
    fn test_flagged_document_never_automatic() {
        let devices = vec![device("ACME", "Matriz", Some("111"))];
        let customers = vec![customer(5, "111", "ACME Target")];
        let flags = ManualFlagSet::from_normalized(vec!["111".to_string()]);

        let view = partition(&devices, &customers, &[], &flags);
        assert!(view.automatic.is_empty());
        assert_eq!(view.manual.len(), 1);
        assert!(view.manual[0].reasons.contains(&EscalationReason::ManualFlag));
        // The department still resolved direct, so it shows as mapped.
        assert_eq!(view.manual[0].departments[0].status, MappingStatus::Mapped);
    }

    #[test]
    fn test_unresolved_department_promotes_whole_document() {
        let devices = vec![
            device("ACME", "Matriz", Some("111")),
            device("ACME", "Usina", Some("111")),
        ];
        // Usina is covered by an exception rule; Matriz resolves direct.
        let customers = vec![customer(5, "111", "ACME Target")];
        let exceptions = vec![rule("111", "Usina", 77)];

        let view = partition(&devices, &customers, &exceptions, &ManualFlagSet::default());
        assert_eq!(view.manual.len(), 1);
        let group = &view.manual[0];
        assert!(group.reasons.contains(&EscalationReason::ExceptionOverride));
        // Every observed department is listed, the clean one included.
        assert_eq!(group.departments.len(), 2);
        assert!(group
            .departments
            .iter()
            .all(|d| d.status == MappingStatus::Mapped));
        // Matriz itself resolved direct, so the document also has an
        // automatic entry; promotion does not remove it.
        assert_eq!(view.automatic.len(), 1);
    }

    #[test]
    fn test_unresolved_shows_pending_rows() {
        let devices = vec![
            device("Mystery", "Filial A", Some("999")),
            device("Mystery", "Filial B", Some("999")),
        ];

        let view = partition(&devices, &[], &[], &ManualFlagSet::default());
        assert!(view.automatic.is_empty());
        assert_eq!(view.manual.len(), 1);
        let group = &view.manual[0];
        assert!(group.reasons.contains(&EscalationReason::Unresolved));
        assert_eq!(group.departments.len(), 2);
        assert!(group
            .departments
            .iter()
            .all(|d| d.status == MappingStatus::Pending));
    }

    #[test]
    fn test_missing_document_is_counted_not_grouped() {
        let devices = vec![device("NoDoc", "Matriz", None)];
        let view = partition(&devices, &[], &[], &ManualFlagSet::default());
        assert!(view.automatic.is_empty());
        assert!(view.manual.is_empty());
        assert_eq!(view.skipped_missing_document, 1);
    }

    #[test]
    fn test_missing_department_uses_placeholder() {
        let devices = vec![device("ACME", "", Some("999"))];
        let view = partition(&devices, &[], &[], &ManualFlagSet::default());
        assert_eq!(view.manual[0].departments[0].department, "(no department)");
    }

    #[test]
    fn test_sorting_and_first_seen_name() {
        let devices = vec![
            device("zeta", "B", Some("222")),
            device("Alpha", "A", Some("333")),
            device("Zeta Later", "C", Some("222")),
        ];
        let customers = vec![customer(1, "222", "Z"), customer(2, "333", "A")];

        let view = partition(&devices, &customers, &[], &ManualFlagSet::default());
        // Case-insensitive sort by Source customer name.
        assert_eq!(view.automatic.len(), 2);
        assert_eq!(view.automatic[0].customer_name, "Alpha");
        // First device seen for a document supplies the display name.
        assert_eq!(view.automatic[1].customer_name, "zeta");
    }

    #[test]
    fn test_departments_deduplicated_case_insensitively() {
        let devices = vec![
            device("ACME", "Usina", Some("999")),
            device("ACME", "USINA ", Some("999")),
        ];
        let view = partition(&devices, &[], &[], &ManualFlagSet::default());
        assert_eq!(view.manual[0].departments.len(), 1);
    }
}
