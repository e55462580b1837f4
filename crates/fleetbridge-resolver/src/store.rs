//! File-backed operator override stores.
//!
//! Exception rules and manual flags are the durable state of the engine:
//! created and edited by operator action, preserved across collection
//! cycles. Both live as flat JSON files next to the snapshots.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use fleetbridge_core::normalize_document;

use crate::error::{ResolverError, ResolverResult};
use crate::types::{CustomerRecord, ExceptionRule};

/// Store of [`ExceptionRule`] entries.
///
/// Rule order in the file is significant (first-document-match-wins during
/// resolution) and is preserved by every operation.
#[derive(Debug, Clone)]
pub struct ExceptionStore {
    path: PathBuf,
}

impl ExceptionStore {
    /// Create a store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load all rules in stored order. A missing file is an empty list.
    pub fn load(&self) -> ResolverResult<Vec<ExceptionRule>> {
        if !self.path.is_file() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Add or update a rule, keyed by (normalized document, department).
    ///
    /// The rule's customer description is captured from the customer
    /// snapshot at save time so the manual view can display it without
    /// another lookup. An existing rule with the same key is overwritten in
    /// place; otherwise the rule is appended.
    #[instrument(skip(self, customers))]
    pub fn upsert(
        &self,
        document: &str,
        department: &str,
        target_customer_id: i64,
        customers: &[CustomerRecord],
    ) -> ResolverResult<ExceptionRule> {
        let document = document.trim();
        let department = department.trim();
        if normalize_document(Some(document)).is_empty() {
            return Err(ResolverError::invalid_rule("document has no digits"));
        }
        if department.is_empty() {
            return Err(ResolverError::invalid_rule("department is empty"));
        }
        if target_customer_id <= 0 {
            return Err(ResolverError::invalid_rule("customer id is not positive"));
        }

        let description = customers
            .iter()
            .find(|c| c.id == target_customer_id)
            .map(|c| c.description.clone())
            .unwrap_or_default();

        let rule = ExceptionRule {
            document: document.to_string(),
            department_match: department.to_string(),
            target_customer_id,
            target_customer_description: description,
        };

        let mut rules = self.load()?;
        let key = (rule.document_normalized(), rule.department_key());
        match rules
            .iter_mut()
            .find(|r| (r.document_normalized(), r.department_key()) == key)
        {
            Some(existing) => *existing = rule.clone(),
            None => rules.push(rule.clone()),
        }
        self.save(&rules)?;

        info!(
            document = %rule.document,
            department = %rule.department_match,
            customer_id = rule.target_customer_id,
            "exception rule saved"
        );
        Ok(rule)
    }

    fn save(&self, rules: &[ExceptionRule]) -> ResolverResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(rules)?)?;
        Ok(())
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// In-memory set of manually flagged documents (normalized).
#[derive(Debug, Clone, Default)]
pub struct ManualFlagSet {
    docs: BTreeSet<String>,
}

impl ManualFlagSet {
    /// Build a set from already-normalized documents; empty entries are
    /// dropped, duplicates collapse.
    #[must_use]
    pub fn from_normalized(docs: Vec<String>) -> Self {
        Self {
            docs: docs.into_iter().filter(|d| !d.is_empty()).collect(),
        }
    }

    /// Whether a normalized document is flagged.
    #[must_use]
    pub fn contains(&self, document_normalized: &str) -> bool {
        self.docs.contains(document_normalized)
    }

    /// Number of flagged documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Flagged documents in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.docs.iter().map(String::as_str)
    }
}

/// Store of manual flags: a JSON list of document strings.
///
/// Entries are re-normalized on load, so hand-edited files with formatted
/// documents still behave.
#[derive(Debug, Clone)]
pub struct ManualFlagStore {
    path: PathBuf,
}

impl ManualFlagStore {
    /// Create a store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the flag set. A missing file is an empty set.
    pub fn load(&self) -> ResolverResult<ManualFlagSet> {
        if !self.path.is_file() {
            return Ok(ManualFlagSet::default());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        let entries: Vec<String> = serde_json::from_str(&raw)?;
        Ok(ManualFlagSet::from_normalized(
            entries
                .iter()
                .map(|d| normalize_document(Some(d.as_str())))
                .collect(),
        ))
    }

    /// Flag or unflag a document. Returns the updated set.
    ///
    /// Unflagging a document that is not flagged (or flagging one that
    /// already is) is a no-op, not an error.
    #[instrument(skip(self))]
    pub fn set(&self, document: &str, manual: bool) -> ResolverResult<ManualFlagSet> {
        let norm = normalize_document(Some(document));
        if norm.is_empty() {
            return Err(ResolverError::invalid_rule("document has no digits"));
        }

        let mut set = self.load()?;
        if manual {
            set.docs.insert(norm.clone());
        } else {
            set.docs.remove(&norm);
        }
        self.save(&set)?;

        info!(document = %norm, manual, "manual flag updated");
        Ok(set)
    }

    fn save(&self, set: &ManualFlagSet) -> ResolverResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let entries: Vec<&str> = set.iter().collect();
        std::fs::write(&self.path, serde_json::to_string_pretty(&entries)?)?;
        Ok(())
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn customers() -> Vec<CustomerRecord> {
        vec![
            CustomerRecord {
                id: 500,
                cpf_cnpj: Some("111".to_string()),
                description: "ACME Target".to_string(),
            },
            CustomerRecord {
                id: 501,
                cpf_cnpj: None,
                description: "Beta Target".to_string(),
            },
        ]
    }

    #[test]
    fn test_exception_upsert_appends_then_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = ExceptionStore::new(dir.path().join("config/exceptions.json"));

        store.upsert("25.729.197/0001-36", "Usina", 500, &customers()).unwrap();
        store.upsert("11.111.111/0001-11", "Matriz", 501, &customers()).unwrap();
        // Same key, different formatting and case: overwrite, not append.
        let rule = store.upsert("25729197000136", "USINA", 501, &customers()).unwrap();

        let rules = store.load().unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].target_customer_id, 501);
        assert_eq!(rule.target_customer_description, "Beta Target");
        // Stored order preserved: the overwritten rule kept its slot.
        assert_eq!(rules[1].department_match, "Matriz");
    }

    #[test]
    fn test_exception_description_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let store = ExceptionStore::new(dir.path().join("exceptions.json"));

        let rule = store.upsert("123", "Usina", 500, &customers()).unwrap();
        assert_eq!(rule.target_customer_description, "ACME Target");

        // Unknown customer id still saves, with an empty description.
        let rule = store.upsert("456", "Usina", 999, &customers()).unwrap();
        assert_eq!(rule.target_customer_description, "");
    }

    #[test]
    fn test_exception_upsert_validation() {
        let dir = tempfile::tempdir().unwrap();
        let store = ExceptionStore::new(dir.path().join("exceptions.json"));

        assert!(store.upsert("no digits", "Usina", 1, &[]).is_err());
        assert!(store.upsert("123", "  ", 1, &[]).is_err());
        assert!(store.upsert("123", "Usina", 0, &[]).is_err());
    }

    #[test]
    fn test_manual_flag_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManualFlagStore::new(dir.path().join("manual.json"));

        assert!(store.load().unwrap().is_empty());

        let set = store.set("25.729.197/0001-36", true).unwrap();
        assert!(set.contains("25729197000136"));

        let set = store.set("25729197000136", false).unwrap();
        assert!(!set.contains("25729197000136"));
        assert!(set.is_empty());
    }

    #[test]
    fn test_manual_flags_renormalized_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manual.json");
        std::fs::write(&path, r#"["25.729.197/0001-36", "", "25729197000136"]"#).unwrap();

        let set = ManualFlagStore::new(&path).load().unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.contains("25729197000136"));
    }

    #[test]
    fn test_manual_flag_rejects_digit_free_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManualFlagStore::new(dir.path().join("manual.json"));
        assert!(store.set("---", true).is_err());
    }
}
