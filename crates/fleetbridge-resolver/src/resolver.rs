//! Three-tier identity resolution.
//!
//! Maps a (document, department) pair to the owning Target customer:
//! curated exception rules first, then a direct tax-id match against the
//! customer registry, otherwise unresolved. Pure function of its inputs;
//! identical inputs always produce identical results.

use tracing::trace;

use fleetbridge_core::normalize_document;

use crate::types::{CustomerRecord, ExceptionRule, ResolutionResult, ResolutionSource};

/// Resolve which Target customer owns a device.
///
/// Evaluation order, short-circuiting:
///
/// 1. An empty normalized document is unresolved immediately; two records
///    with no document must never match each other.
/// 2. Exception rules are scanned in stored order. The *first* rule whose
///    normalized document equals the input commits the scan: if its
///    department also matches (case-insensitive, trimmed), the rule wins;
///    if not, no further exception rules are considered for this document
///    and resolution falls through to direct matching. A second rule for
///    the same document with the wanted department is therefore never
///    reached (first-match-wins, not best-match).
/// 3. The first customer whose normalized tax id equals the input wins a
///    direct match. Customers without a usable id are skipped.
#[must_use]
pub fn resolve(
    document: Option<&str>,
    department: &str,
    customers: &[CustomerRecord],
    exceptions: &[ExceptionRule],
) -> ResolutionResult {
    let doc = normalize_document(document);
    if doc.is_empty() {
        return ResolutionResult::none();
    }
    let dept = department.trim().to_uppercase();

    // Tier 1: exception overrides, first document match wins.
    if let Some(rule) = exceptions.iter().find(|r| r.document_normalized() == doc) {
        if rule.department_key() == dept {
            trace!(document = %doc, department = %dept, "resolved via exception rule");
            return ResolutionResult {
                target_customer_id: Some(rule.target_customer_id),
                target_customer_description: Some(rule.target_customer_description.clone()),
                source: ResolutionSource::Exception,
            };
        }
        // Document matched but department did not: the scan stops here.
    }

    // Tier 2: direct tax-id match.
    if let Some(customer) = customers
        .iter()
        .filter(|c| c.id > 0)
        .find(|c| normalize_document(c.cpf_cnpj.as_deref()) == doc)
    {
        trace!(document = %doc, customer_id = customer.id, "resolved via direct match");
        return ResolutionResult {
            target_customer_id: Some(customer.id),
            target_customer_description: Some(customer.description.clone()),
            source: ResolutionSource::Direct,
        };
    }

    ResolutionResult::none()
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_exception_wins_over_direct() {
        let customers = vec![customer(500, "25729197000136", "Direct Co")];
        let exceptions = vec![rule("25729197000136", "Usina", 19_952_169)];

        let result = resolve(
            Some("25.729.197/0001-36"),
            "Usina",
            &customers,
            &exceptions,
        );
        assert_eq!(result.source, ResolutionSource::Exception);
        assert_eq!(result.target_customer_id, Some(19_952_169));
    }

    #[test]
    fn test_department_mismatch_falls_through_to_direct() {
        let customers = vec![customer(500, "25729197000136", "Direct Co")];
        let exceptions = vec![rule("25729197000136", "Usina", 19_952_169)];

        let result = resolve(
            Some("25.729.197/0001-36"),
            "Matriz",
            &customers,
            &exceptions,
        );
        assert_eq!(result.source, ResolutionSource::Direct);
        assert_eq!(result.target_customer_id, Some(500));
    }

    #[test]
    fn test_first_document_match_commits_the_scan() {
        // Known ambiguity, preserved on purpose: the first rule for a
        // document stops the scan even when a later rule for the same
        // document carries the wanted department.
        let customers = vec![customer(500, "25729197000136", "Direct Co")];
        let exceptions = vec![
            rule("25729197000136", "Usina", 111),
            rule("25729197000136", "Matriz", 222),
        ];

        let result = resolve(Some("25729197000136"), "Matriz", &customers, &exceptions);
        assert_eq!(result.source, ResolutionSource::Direct);
        assert_eq!(result.target_customer_id, Some(500));
    }

    #[test]
    fn test_department_comparison_is_trimmed_and_case_insensitive() {
        let exceptions = vec![rule("123", "  usina ", 9)];
        let result = resolve(Some("1-2-3"), "USINA", &[], &exceptions);
        assert_eq!(result.source, ResolutionSource::Exception);
        assert_eq!(result.target_customer_id, Some(9));
    }

    #[test]
    fn test_empty_document_never_matches() {
        // A customer with an empty tax id must not be matched by a device
        // with an empty document.
        let customers = vec![customer(500, "", "Empty Co")];
        let result = resolve(None, "Usina", &customers, &[]);
        assert_eq!(result, ResolutionResult::none());

        let result = resolve(Some("n/a"), "Usina", &customers, &[]);
        assert_eq!(result, ResolutionResult::none());
    }

    #[test]
    fn test_customers_without_id_are_skipped() {
        let customers = vec![customer(0, "123", "Ghost"), customer(7, "123", "Real")];
        let result = resolve(Some("123"), "", &customers, &[]);
        assert_eq!(result.target_customer_id, Some(7));
    }

    #[test]
    fn test_unresolved_document() {
        let customers = vec![customer(1, "999", "Other")];
        let result = resolve(Some("123"), "Usina", &customers, &[]);
        assert_eq!(result.source, ResolutionSource::None);
        assert!(!result.is_resolved());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let customers = vec![
            customer(500, "25729197000136", "Direct Co"),
            customer(501, "25729197000136", "Duplicate Co"),
        ];
        let exceptions = vec![rule("111", "Usina", 1)];

        let first = resolve(Some("25729197000136"), "Matriz", &customers, &exceptions);
        let second = resolve(Some("25729197000136"), "Matriz", &customers, &exceptions);
        assert_eq!(first, second);
        // First customer in stored order wins among duplicates.
        assert_eq!(first.target_customer_id, Some(500));
    }
}
