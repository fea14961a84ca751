//! At most one run per branch.

use crate::errors::{ReleaseflowError, Result};
use crate::utils::{iso_timestamp, path_safe};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Held for the whole of a run.
///
/// The claim is an exclusive advisory lock on `<branch>.lock`, so the OS
/// releases it when the holding process dies. The file itself is left in
/// place and describes the last holder.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    file: File,
}

impl RunLock {
    /// Claims `branch`.
    ///
    /// # Errors
    ///
    /// `RunInProgress` if another run holds the branch, `Io` if the lock
    /// directory cannot be written.
    pub fn acquire(locks_dir: &Path, branch: &str) -> Result<Self> {
        std::fs::create_dir_all(locks_dir)?;
        let path = locks_dir.join(format!("{}.lock", path_safe(branch)));

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if let Err(e) = FileExt::try_lock_exclusive(&file) {
            if is_contended(&e) {
                return Err(ReleaseflowError::RunInProgress {
                    branch: branch.to_string(),
                    lock: path,
                });
            }
            return Err(e.into());
        }

        file.set_len(0)?;
        writeln!(file, "branch={branch}")?;
        writeln!(file, "pid={}", std::process::id())?;
        writeln!(file, "started={}", iso_timestamp())?;
        debug!(branch, lock = %path.display(), "Run lock acquired");
        Ok(Self { path, file })
    }

    /// The lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(lock = %self.path.display(), error = %e, "Failed to release run lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_on_same_branch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let first = RunLock::acquire(dir.path(), "main").unwrap();

        let err = tokio_test::assert_err!(RunLock::acquire(dir.path(), "main"));
        assert_eq!(err.code(), "RUN_IN_PROGRESS");
        assert!(err.to_string().contains("main.lock"));

        let other = RunLock::acquire(dir.path(), "feature/x").unwrap();
        assert!(other.path().ends_with("feature_x.lock"));

        drop(first);
        tokio_test::assert_ok!(RunLock::acquire(dir.path(), "main"));
    }

    #[test]
    fn test_lock_file_left_by_dead_run_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.lock");
        std::fs::write(&path, "branch=main\npid=999999\nstarted=2026-01-01T00:00:00Z\n").unwrap();

        let lock = tokio_test::assert_ok!(RunLock::acquire(dir.path(), "main"));
        let contents = std::fs::read_to_string(lock.path()).unwrap();
        assert!(contents.contains(&format!("pid={}", std::process::id())));
        assert!(!contents.contains("999999"));
    }

    #[test]
    fn test_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let lock = RunLock::acquire(&dir.path().join("locks"), "main").unwrap();
        let path = lock.path().to_path_buf();
        assert!(path.is_file());

        drop(lock);
        let again = tokio_test::assert_ok!(RunLock::acquire(&dir.path().join("locks"), "main"));
        assert_eq!(again.path(), path);
    }
}
