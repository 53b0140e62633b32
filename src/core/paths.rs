//! core::paths
//!
//! Centralized path routing for ki home and repository storage.
//!
//! # Storage Layout
//!
//! ```text
//! <home>/
//!   ki-repositories.json                  repository names, overlay order
//!   repositories/<repo>/
//!     ki-components.json                  component ids
//!     <component>/
//!       ki-versions.json                  [{id, time}], newest first
//!       status_info.json                  {key: [ordered values]}
//!       <version>/
//!         ki-version.json                 metadata
//!         ki-statuses.json                status log
//!         ki-reverse-dependencies.json    versions depending on this one
//!         ...binaries...
//! ```
//!
//! **Hard rule:** no code outside this module joins these file names.
//!
//! # Example
//!
//! ```
//! use ki_repo::core::paths::{KiPaths, RepositoryPaths};
//! use ki_repo::core::types::VersionId;
//! use std::path::PathBuf;
//!
//! let home = KiPaths::new("/ki");
//! let local = RepositoryPaths::new(home.repository_root("local"));
//! let id = VersionId::new("my/component/23").unwrap();
//!
//! assert_eq!(
//!     local.metadata_path(&id),
//!     PathBuf::from("/ki/repositories/local/my/component/23/ki-version.json")
//! );
//! ```

use std::path::{Path, PathBuf};

use super::errors::{RepoError, Result};
use super::metadata::{METADATA_FILE, REVERSE_DEPENDENCIES_FILE, STATUSES_FILE};
use super::types::{ComponentId, VersionId};

/// Name of the repository list document in a ki home.
pub const REPOSITORIES_FILE: &str = "ki-repositories.json";

/// Name of the component list document in a repository.
pub const COMPONENTS_FILE: &str = "ki-components.json";

/// Name of the version list document in a component directory.
pub const VERSIONS_FILE: &str = "ki-versions.json";

/// Name of the status ordering document in a component directory.
pub const STATUS_INFO_FILE: &str = "status_info.json";

/// Paths inside a ki home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KiPaths {
    pub home: PathBuf,
}

impl KiPaths {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// `<home>/ki-repositories.json`
    pub fn repositories_list_path(&self) -> PathBuf {
        self.home.join(REPOSITORIES_FILE)
    }

    /// `<home>/repositories/<name>`
    pub fn repository_root(&self, name: &str) -> PathBuf {
        self.home.join("repositories").join(name)
    }
}

/// Paths inside one repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryPaths {
    pub root: PathBuf,
}

impl RepositoryPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn components_list_path(&self) -> PathBuf {
        self.root.join(COMPONENTS_FILE)
    }

    pub fn component_dir(&self, component: &ComponentId) -> PathBuf {
        join_id(&self.root, component.as_str())
    }

    pub fn versions_list_path(&self, component: &ComponentId) -> PathBuf {
        self.component_dir(component).join(VERSIONS_FILE)
    }

    pub fn status_info_path(&self, component: &ComponentId) -> PathBuf {
        self.component_dir(component).join(STATUS_INFO_FILE)
    }

    /// The version directory; also the root of its binaries.
    pub fn version_dir(&self, version: &VersionId) -> PathBuf {
        join_id(&self.root, version.as_str())
    }

    pub fn metadata_path(&self, version: &VersionId) -> PathBuf {
        self.version_dir(version).join(METADATA_FILE)
    }

    pub fn statuses_path(&self, version: &VersionId) -> PathBuf {
        self.version_dir(version).join(STATUSES_FILE)
    }

    pub fn reverse_dependencies_path(&self, version: &VersionId) -> PathBuf {
        self.version_dir(version).join(REVERSE_DEPENDENCIES_FILE)
    }
}

/// Join a `/`-separated id onto a directory using platform separators.
fn join_id(base: &Path, id: &str) -> PathBuf {
    id.split('/').fold(base.to_path_buf(), |acc, part| acc.join(part))
}

/// Reject a `/`-separated path that would leave the directory it is
/// joined onto: empty, absolute, or with a `..` segment.
///
/// # Errors
///
/// `Configuration` naming the path.
pub fn check_relative(rel: &str) -> Result<()> {
    let reason = if rel.split('/').all(|p| p.is_empty() || p == ".") {
        Some("is empty")
    } else if rel.starts_with('/') || rel.starts_with('\\') || Path::new(rel).is_absolute() {
        Some("is absolute")
    } else if rel.split(['/', '\\']).any(|p| p == "..") {
        Some("leaves its directory")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(RepoError::Configuration(format!("path '{rel}' {reason}"))),
        None => Ok(()),
    }
}

/// Join a `/`-separated relative file path onto a binaries root.
///
/// Callers check untrusted paths with [`check_relative`] first.
pub fn join_relative(base: &Path, rel: &str) -> PathBuf {
    rel.split('/')
        .filter(|p| !p.is_empty())
        .fold(base.to_path_buf(), |acc, part| acc.join(part))
}
