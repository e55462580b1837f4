//! Advisory per-job lock files.
//!
//! At most one dispatcher run per job may be active. Acquisition is
//! exclusive and non-blocking: a second invocation observes the lock held
//! and exits as a no-op. The lock file is removed on drop; a crashed run
//! leaves it behind, to be cleared by the operator (the file records pid
//! and acquisition time for exactly that situation).

use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::SyncResult;

/// A held job lock. Dropping it releases the lock.
#[derive(Debug)]
pub struct JobLock {
    path: PathBuf,
    job: String,
}

impl JobLock {
    /// Try to acquire the lock for `job` under `lock_dir`.
    ///
    /// Returns `Ok(None)` when another run holds it; that is contention,
    /// not an error.
    pub fn acquire(lock_dir: &Path, job: &str) -> SyncResult<Option<Self>> {
        std::fs::create_dir_all(lock_dir)?;
        let path = lock_dir.join(format!("{job}.lock"));

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = writeln!(file, "pid={} acquired={}", std::process::id(), Utc::now());
                debug!(job, path = %path.display(), "job lock acquired");
                Ok(Some(Self {
                    path,
                    job: job.to_string(),
                }))
            }
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {
                warn!(job, "lock already held; skipping run");
                Ok(None)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Job this lock belongs to.
    #[must_use]
    pub fn job(&self) -> &str {
        &self.job
    }
}

impl Drop for JobLock {
    fn drop(&mut self) {
        if let Err(error) = std::fs::remove_file(&self.path) {
            warn!(job = %self.job, %error, "failed to remove lock file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_and_release() {
        let dir = tempfile::tempdir().unwrap();

        let lock = JobLock::acquire(dir.path(), "apply-creates").unwrap();
        assert!(lock.is_some());
        let lock_path = dir.path().join("apply-creates.lock");
        assert!(lock_path.is_file());

        drop(lock);
        assert!(!lock_path.exists());
    }

    #[test]
    fn test_second_acquisition_is_refused() {
        let dir = tempfile::tempdir().unwrap();

        let first = JobLock::acquire(dir.path(), "apply-updates").unwrap();
        assert!(first.is_some());

        let second = JobLock::acquire(dir.path(), "apply-updates").unwrap();
        assert!(second.is_none());

        drop(first);
        let third = JobLock::acquire(dir.path(), "apply-updates").unwrap();
        assert!(third.is_some());
    }

    #[test]
    fn test_locks_are_per_job() {
        let dir = tempfile::tempdir().unwrap();

        let creates = JobLock::acquire(dir.path(), "apply-creates").unwrap();
        let updates = JobLock::acquire(dir.path(), "apply-updates").unwrap();
        assert!(creates.is_some());
        assert!(updates.is_some());
    }
}
