//! core::errors
//!
//! Error taxonomy shared by the finder, iterators and the engine.
//!
//! # Categories
//!
//! - **NotFound**: unresolved component, version or named dependency
//! - **AlreadyExists**: an import target id is already committed
//! - **IntegrityMismatch**: a test failed inside import or export
//! - **Configuration**: malformed queries, unknown operators or operations,
//!   conflicting import options
//! - **Io**: a required physical file or directory is absent or unreadable
//!
//! Every variant is fatal to the command that raised it. The tester is the
//! one place that reports problems without raising; see
//! [`crate::engine::tester`].

use std::path::PathBuf;

use thiserror::Error;

use super::config::ConfigError;
use super::metadata::MetadataError;
use super::store::{LockError, StoreError};
use super::types::TypeError;

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// A component, version or named dependency could not be resolved.
    #[error("not found: {0}")]
    NotFound(String),

    /// The import target is already committed.
    #[error("'{0}' exists in repository already")]
    AlreadyExists(String),

    /// Files did not pass the integrity test.
    #[error("files are not ok: {0}")]
    IntegrityMismatch(String),

    /// A query, operation or option combination is invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A dependency graph refers back to one of its own ancestors.
    #[error("dependency cycle detected: {0}")]
    DependencyCycle(String),

    /// A required file or directory could not be accessed.
    #[error("i/o error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RepoError {
    /// Wrap an I/O error with the path it happened at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RepoError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = RepoError> = std::result::Result<T, E>;
