//! Per-job run status store.
//!
//! Every batch job records its last outcome under its own key in a single
//! JSON file. The store exposes a narrow record/read interface instead of a
//! shared mutable status blob; a lost update between concurrent jobs only
//! costs one stale entry, never a corrupted file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;

/// Outcome of one job run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Whether the run succeeded.
    pub ok: bool,
    /// Free-text detail (summary counts, failure reason).
    pub detail: String,
}

impl JobOutcome {
    /// A successful outcome stamped now.
    #[must_use]
    pub fn ok(detail: impl Into<String>) -> Self {
        Self {
            finished_at: Utc::now(),
            ok: true,
            detail: detail.into(),
        }
    }

    /// A failed outcome stamped now.
    #[must_use]
    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            finished_at: Utc::now(),
            ok: false,
            detail: detail.into(),
        }
    }
}

/// File-backed store of last-run outcomes, keyed by job name.
#[derive(Debug, Clone)]
pub struct RunStatusStore {
    path: PathBuf,
}

impl RunStatusStore {
    /// Create a store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Record the outcome of a job run, replacing any previous entry.
    pub fn record(&self, job: &str, outcome: JobOutcome) -> Result<()> {
        let mut entries = self.load()?;
        entries.insert(job.to_string(), outcome);
        self.save(&entries)?;
        debug!(job, "run status recorded");
        Ok(())
    }

    /// Read the last recorded outcome for a job, if any.
    pub fn last(&self, job: &str) -> Result<Option<JobOutcome>> {
        Ok(self.load()?.remove(job))
    }

    /// Read all recorded outcomes.
    pub fn all(&self) -> Result<BTreeMap<String, JobOutcome>> {
        self.load()
    }

    fn load(&self) -> Result<BTreeMap<String, JobOutcome>> {
        if !self.path.is_file() {
            return Ok(BTreeMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        // A corrupt status file is replaced, not fatal.
        Ok(serde_json::from_str(&raw).unwrap_or_default())
    }

    fn save(&self, entries: &BTreeMap<String, JobOutcome>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(entries)?)?;
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

    #[test]
    fn test_record_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStatusStore::new(dir.path().join("status.json"));

        store.record("build-payloads", JobOutcome::ok("post=3 patch=9")).unwrap();
        store.record("apply-creates", JobOutcome::failed("no token")).unwrap();

        let last = store.last("build-payloads").unwrap().unwrap();
        assert!(last.ok);
        assert_eq!(last.detail, "post=3 patch=9");

        let all = store.all().unwrap();
        assert_eq!(all.len(), 2);
        assert!(!all["apply-creates"].ok);
    }

    #[test]
    fn test_record_replaces_previous_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStatusStore::new(dir.path().join("status.json"));

        store.record("job", JobOutcome::failed("first")).unwrap();
        store.record("job", JobOutcome::ok("second")).unwrap();

        let last = store.last("job").unwrap().unwrap();
        assert!(last.ok);
        assert_eq!(last.detail, "second");
    }

    #[test]
    fn test_corrupt_file_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        std::fs::write(&path, "{broken").unwrap();

        let store = RunStatusStore::new(&path);
        assert!(store.last("job").unwrap().is_none());
        store.record("job", JobOutcome::ok("fine")).unwrap();
        assert!(store.last("job").unwrap().unwrap().ok);
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = RunStatusStore::new(dir.path().join("absent.json"));
        assert!(store.all().unwrap().is_empty());
    }
}
