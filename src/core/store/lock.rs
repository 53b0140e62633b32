//! core::store::lock
//!
//! Advisory lock scoped to a single document edit.
//!
//! # Architecture
//!
//! Status logs, status orderings, version lists and component lists are
//! edited with read-modify-write cycles that may race between processes.
//! Each such document gets a sibling `<name>.lock` file; an OS-level
//! exclusive lock on it (via `fs2`) serializes the edit.
//!
//! The lock covers exactly one document edit. It does not make larger
//! sequences atomic: an importer checking that a version id is free and
//! then creating it can still race another importer.
//!
//! # Invariants
//!
//! - Lock is held for the whole read-modify-write of one document
//! - Lock is automatically released on drop (RAII pattern)
//! - Acquisition blocks, polling until the timeout expires
//!
//! # Example
//!
//! ```no_run
//! use ki_repo::core::store::lock::{DocumentLock, DEFAULT_LOCK_TIMEOUT};
//! use std::path::Path;
//!
//! let lock = DocumentLock::acquire(Path::new("/tmp/ki-statuses.json"), DEFAULT_LOCK_TIMEOUT)?;
//! // ... read, modify, write the document ...
//! drop(lock);
//! # Ok::<(), ki_repo::core::store::LockError>(())
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;
use thiserror::Error;

/// Default timeout for lock acquisition (10 seconds).
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Polling interval when waiting for lock (100ms).
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process held the lock for longer than the timeout.
    #[error("timed out waiting for lock '{}'", .0.display())]
    Timeout(PathBuf),

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// An exclusive lock guarding edits of one document.
#[derive(Debug)]
pub struct DocumentLock {
    path: PathBuf,
    file: Option<File>,
}

impl DocumentLock {
    /// The lock file path used for a document.
    ///
    /// ```
    /// use ki_repo::core::store::lock::DocumentLock;
    /// use std::path::{Path, PathBuf};
    ///
    /// assert_eq!(
    ///     DocumentLock::lock_path(Path::new("/repo/a/ki-versions.json")),
    ///     PathBuf::from("/repo/a/ki-versions.json.lock")
    /// );
    /// ```
    pub fn lock_path(document: &Path) -> PathBuf {
        let mut name = document
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        document.with_file_name(name)
    }

    /// Acquire the lock for `document`, blocking up to `timeout`.
    ///
    /// # Errors
    ///
    /// - [`LockError::Timeout`] if the lock stays held past the timeout
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(document: &Path, timeout: Duration) -> Result<Self, LockError> {
        let path = Self::lock_path(document);
        let deadline = Instant::now() + timeout;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                LockError::CreateFailed(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        loop {
            if let Some(lock) = Self::try_acquire_at(&path)? {
                return Ok(lock);
            }
            if Instant::now() >= deadline {
                return Err(LockError::Timeout(path));
            }
            thread::sleep(LOCK_POLL_INTERVAL);
        }
    }

    /// Non-blocking acquisition. Returns `Ok(None)` if the lock is held.
    fn try_acquire_at(path: &Path) -> Result<Option<Self>, LockError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                path: path.to_path_buf(),
                file: Some(file),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Check if the lock is currently held.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock explicitly.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        // Best-effort release on drop
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_acquire_succeeds() {
        let temp = TempDir::new().expect("create temp dir");
        let doc = temp.path().join("ki-statuses.json");

        let lock = DocumentLock::acquire(&doc, DEFAULT_LOCK_TIMEOUT).expect("acquire lock");
        assert!(lock.is_held());
        assert!(lock.path().exists());
        assert_eq!(lock.path(), temp.path().join("ki-statuses.json.lock"));
    }

    #[test]
    fn lock_creates_parent_directory() {
        let temp = TempDir::new().expect("create temp dir");
        let doc = temp.path().join("a").join("b").join("status_info.json");

        let _lock = DocumentLock::acquire(&doc, DEFAULT_LOCK_TIMEOUT).expect("acquire lock");
        assert!(temp.path().join("a").join("b").exists());
    }

    #[test]
    fn second_acquire_times_out() {
        let temp = TempDir::new().expect("create temp dir");
        let doc = temp.path().join("ki-versions.json");

        let _held = DocumentLock::acquire(&doc, DEFAULT_LOCK_TIMEOUT).expect("first acquire");
        let result = DocumentLock::acquire(&doc, Duration::from_millis(150));
        assert!(matches!(result, Err(LockError::Timeout(_))));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = TempDir::new().expect("create temp dir");
        let doc = temp.path().join("ki-versions.json");

        {
            let lock = DocumentLock::acquire(&doc, DEFAULT_LOCK_TIMEOUT).expect("first acquire");
            assert!(lock.is_held());
        }

        let again = DocumentLock::acquire(&doc, Duration::from_millis(150)).expect("reacquire");
        assert!(again.is_held());
    }

    #[test]
    fn multiple_release_calls_are_safe() {
        let temp = TempDir::new().expect("create temp dir");
        let doc = temp.path().join("doc.json");

        let mut lock = DocumentLock::acquire(&doc, DEFAULT_LOCK_TIMEOUT).expect("acquire");
        lock.release().expect("first release");
        lock.release().expect("second release should be ok");
        assert!(!lock.is_held());
    }
}
