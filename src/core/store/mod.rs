//! core::store
//!
//! Small JSON documents at fixed paths.
//!
//! # Architecture
//!
//! Every piece of repository state (component lists, version lists, status
//! logs, metadata) is a small JSON document. [`JsonDocument`] wraps one
//! such path and provides:
//!
//! - Reads that treat a missing file as "no document"
//! - Atomic writes (write to a temp file, then rename)
//! - Locked read-modify-write via [`JsonDocument::edit`]
//!
//! # Modules
//!
//! - [`lock`] - Advisory lock scoped to one document edit
//!
//! # Example
//!
//! ```no_run
//! use ki_repo::core::store::JsonDocument;
//!
//! let doc = JsonDocument::new("/tmp/ki-statuses.json");
//! doc.edit(|statuses: &mut Vec<serde_json::Value>| {
//!     statuses.push(serde_json::json!({"key": "Smoke", "value": "green"}));
//! })?;
//! # Ok::<(), ki_repo::core::store::StoreError>(())
//! ```

pub mod lock;

pub use lock::{DocumentLock, LockError, DEFAULT_LOCK_TIMEOUT};

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors from document storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to read a document.
    #[error("failed to read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a document.
    #[error("failed to write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The document is not valid JSON for the expected shape.
    #[error("failed to parse '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    /// The value could not be serialized.
    #[error("failed to serialize '{path}': {message}")]
    SerializeError { path: PathBuf, message: String },

    /// The edit lock could not be acquired.
    #[error("lock error: {0}")]
    Lock(#[from] LockError),
}

/// A JSON document at a fixed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonDocument {
    path: PathBuf,
    lock_timeout: Duration,
}

impl JsonDocument {
    /// Create a handle for the document at `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Use a custom timeout for [`edit`](Self::edit).
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Path of the document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the document exists on disk.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read and parse the document. A missing file yields `Ok(None)`.
    pub fn read<T: DeserializeOwned>(&self) -> Result<Option<T>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::ReadError {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| StoreError::ParseError {
                path: self.path.clone(),
                message: e.to_string(),
            })
    }

    /// Read the document, falling back to `T::default()` when missing.
    pub fn read_or_default<T: DeserializeOwned + Default>(&self) -> Result<T, StoreError> {
        Ok(self.read()?.unwrap_or_default())
    }

    /// Serialize and atomically replace the document.
    ///
    /// Parent directories are created as needed.
    pub fn write<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), StoreError> {
        let write_err = |source| StoreError::WriteError {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut content =
            serde_json::to_string_pretty(value).map_err(|e| StoreError::SerializeError {
                path: self.path.clone(),
                message: e.to_string(),
            })?;
        content.push('\n');

        let temp_path = self.temp_path();
        let result = (|| {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
            fs::rename(&temp_path, &self.path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(write_err(e));
        }
        Ok(())
    }

    /// Read-modify-write the document while holding its edit lock.
    ///
    /// A missing document starts from `T::default()`. The closure's return
    /// value is passed back to the caller.
    pub fn edit<T, R, F>(&self, f: F) -> Result<R, StoreError>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T) -> R,
    {
        let _lock = DocumentLock::acquire(&self.path, self.lock_timeout)?;
        let mut data: T = self.read_or_default()?;
        let ret = f(&mut data);
        self.write(&data)?;
        Ok(ret)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".tmp-{}", std::process::id()));
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn missing_document_reads_as_none() {
        let temp = TempDir::new().expect("create temp dir");
        let doc = JsonDocument::new(temp.path().join("missing.json"));

        assert!(!doc.exists());
        let value: Option<Vec<String>> = doc.read().expect("read");
        assert!(value.is_none());
        let value: Vec<String> = doc.read_or_default().expect("read");
        assert!(value.is_empty());
    }

    #[test]
    fn write_creates_parents_and_roundtrips() {
        let temp = TempDir::new().expect("create temp dir");
        let doc = JsonDocument::new(temp.path().join("a/b/ki-components.json"));

        doc.write(&vec!["my/component".to_string()]).expect("write");
        assert!(doc.exists());
        let value: Vec<String> = doc.read_or_default().expect("read");
        assert_eq!(value, vec!["my/component"]);

        // No temp file left behind
        let entries: Vec<_> = fs::read_dir(temp.path().join("a/b"))
            .expect("read dir")
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn parse_errors_name_the_path() {
        let temp = TempDir::new().expect("create temp dir");
        let path = temp.path().join("broken.json");
        fs::write(&path, "{not json").expect("write");

        let err = JsonDocument::new(&path)
            .read::<Vec<String>>()
            .expect_err("should fail");
        assert!(matches!(err, StoreError::ParseError { .. }));
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn edit_starts_from_default_and_persists() {
        let temp = TempDir::new().expect("create temp dir");
        let doc = JsonDocument::new(temp.path().join("status_info.json"));

        let len = doc
            .edit(|info: &mut BTreeMap<String, Vec<String>>| {
                info.insert("maturity".into(), vec!["alpha".into(), "beta".into()]);
                info.len()
            })
            .expect("edit");
        assert_eq!(len, 1);

        let info: BTreeMap<String, Vec<String>> = doc.read_or_default().expect("read");
        assert_eq!(info["maturity"], vec!["alpha", "beta"]);
    }
}
