//! core::repository
//!
//! Per-location read and write view of repository documents.
//!
//! # Architecture
//!
//! A [`KiHome`] owns the list of repository names (overlay order) and hands
//! out [`Repository`] handles. A `Repository` knows nothing about other
//! repositories; merging happens in [`crate::core::model`].
//!
//! Every mutation is one locked document edit through
//! [`JsonDocument::edit`]. Sequences of edits are not atomic as a whole.
//!
//! # Example
//!
//! ```no_run
//! use ki_repo::core::repository::KiHome;
//! use ki_repo::core::types::VersionId;
//!
//! let home = KiHome::new("/srv/ki");
//! let local = home.ensure_repository("local")?;
//! let id = VersionId::new("my/component/23")?;
//! local.add_version(&id)?;
//! # Ok::<(), ki_repo::core::errors::RepoError>(())
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::config::{schema::validate_repository_name, Config};
use super::errors::Result;
use super::metadata::{
    StatusEntry, StatusInfo, VersionMetadata, METADATA_FILE, REVERSE_DEPENDENCIES_FILE,
    STATUSES_FILE,
};
use super::paths::{KiPaths, RepositoryPaths};
use super::store::{JsonDocument, DEFAULT_LOCK_TIMEOUT};
use super::types::{ComponentId, UtcTimestamp, VersionId};

/// One entry of a component's version list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    /// The version name (last segment of the version id).
    pub id: String,
    pub time: UtcTimestamp,
}

/// A ki home directory: the set of overlaid repositories.
#[derive(Debug, Clone)]
pub struct KiHome {
    paths: KiPaths,
    lock_timeout: Duration,
}

impl KiHome {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            paths: KiPaths::new(home),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Build from loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.home()).with_lock_timeout(config.lock_timeout())
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        self.paths.home()
    }

    fn repositories_document(&self) -> JsonDocument {
        JsonDocument::new(self.paths.repositories_list_path()).with_lock_timeout(self.lock_timeout)
    }

    /// Repository names in overlay order.
    pub fn repository_names(&self) -> Result<Vec<String>> {
        Ok(self.repositories_document().read_or_default()?)
    }

    /// Handles for every registered repository, in overlay order.
    pub fn repositories(&self) -> Result<Vec<Repository>> {
        Ok(self
            .repository_names()?
            .iter()
            .map(|name| self.repository(name))
            .collect())
    }

    /// A handle for a repository. It need not exist yet.
    pub fn repository(&self, name: &str) -> Repository {
        Repository {
            name: name.to_string(),
            paths: RepositoryPaths::new(self.paths.repository_root(name)),
            lock_timeout: self.lock_timeout,
        }
    }

    /// Register a repository (if needed) and return its handle.
    pub fn ensure_repository(&self, name: &str) -> Result<Repository> {
        validate_repository_name(name)?;
        self.repositories_document().edit(|names: &mut Vec<String>| {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        })?;
        Ok(self.repository(name))
    }
}

/// One physical repository root.
#[derive(Debug, Clone)]
pub struct Repository {
    name: String,
    paths: RepositoryPaths,
    lock_timeout: Duration,
}

impl Repository {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        self.paths.root()
    }

    pub fn paths(&self) -> &RepositoryPaths {
        &self.paths
    }

    fn document(&self, path: PathBuf) -> JsonDocument {
        JsonDocument::new(path).with_lock_timeout(self.lock_timeout)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Component ids listed in this repository.
    pub fn component_ids(&self) -> Result<Vec<ComponentId>> {
        Ok(self
            .document(self.paths.components_list_path())
            .read_or_default()?)
    }

    /// The component's version list, newest first, or `None` when this
    /// repository has no list for it.
    pub fn versions(&self, component: &ComponentId) -> Result<Option<Vec<VersionEntry>>> {
        Ok(self
            .document(self.paths.versions_list_path(component))
            .read()?)
    }

    pub fn status_info(&self, component: &ComponentId) -> Result<Option<StatusInfo>> {
        Ok(self.document(self.paths.status_info_path(component)).read()?)
    }

    pub fn metadata(&self, version: &VersionId) -> Result<Option<VersionMetadata>> {
        Ok(self.document(self.paths.metadata_path(version)).read()?)
    }

    pub fn statuses(&self, version: &VersionId) -> Result<Vec<StatusEntry>> {
        Ok(self
            .document(self.paths.statuses_path(version))
            .read_or_default()?)
    }

    pub fn reverse_dependencies(&self, version: &VersionId) -> Result<Vec<VersionId>> {
        Ok(self
            .document(self.paths.reverse_dependencies_path(version))
            .read_or_default()?)
    }

    /// The version directory, if it holds the version's files here.
    ///
    /// A directory that only carries status or reverse dependency
    /// documents, or the lock and temp files of any document, does not
    /// count.
    pub fn binaries(&self, version: &VersionId) -> Option<PathBuf> {
        let dir = self.paths.version_dir(version);
        let entries = std::fs::read_dir(&dir).ok()?;
        let has_content = entries
            .filter_map(|e| e.ok())
            .any(|e| !e.file_name().to_str().is_some_and(is_store_file));
        has_content.then_some(dir)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Add a component to the component list.
    pub fn add_component(&self, component: &ComponentId) -> Result<()> {
        self.document(self.paths.components_list_path())
            .edit(|ids: &mut Vec<ComponentId>| {
                if !ids.contains(component) {
                    ids.push(component.clone());
                }
            })?;
        Ok(())
    }

    /// Register a version: list the component and prepend the version name
    /// to the component's version list.
    pub fn add_version(&self, version: &VersionId) -> Result<()> {
        let component = version.component();
        self.add_component(&component)?;
        self.document(self.paths.versions_list_path(&component))
            .edit(|entries: &mut Vec<VersionEntry>| {
                if !entries.iter().any(|e| e.id == version.name()) {
                    entries.insert(
                        0,
                        VersionEntry {
                            id: version.name().to_string(),
                            time: UtcTimestamp::now(),
                        },
                    );
                }
            })?;
        Ok(())
    }

    pub fn write_metadata(&self, version: &VersionId, metadata: &VersionMetadata) -> Result<()> {
        self.document(self.paths.metadata_path(version))
            .write(metadata)?;
        Ok(())
    }

    /// Append to the version's status log.
    pub fn add_status(&self, version: &VersionId, entry: StatusEntry) -> Result<()> {
        self.document(self.paths.statuses_path(version))
            .edit(|log: &mut Vec<StatusEntry>| log.push(entry))?;
        Ok(())
    }

    /// Set the value ordering for one status key of a component.
    pub fn set_status_order(
        &self,
        component: &ComponentId,
        key: &str,
        values: Vec<String>,
    ) -> Result<()> {
        self.document(self.paths.status_info_path(component))
            .edit(|info: &mut StatusInfo| {
                info.insert(key.to_string(), values);
            })?;
        Ok(())
    }

    /// Record that `dependent` depends on `version`.
    pub fn add_reverse_dependency(&self, version: &VersionId, dependent: &VersionId) -> Result<()> {
        self.document(self.paths.reverse_dependencies_path(version))
            .edit(|ids: &mut Vec<VersionId>| {
                if !ids.contains(dependent) {
                    ids.push(dependent.clone());
                }
            })?;
        Ok(())
    }
}

/// Documents kept next to a version's files, plus the `.lock` and
/// `.tmp-<pid>` siblings any document edit leaves or passes through.
fn is_store_file(name: &str) -> bool {
    if name == STATUSES_FILE || name == REVERSE_DEPENDENCIES_FILE {
        return true;
    }
    let sibling_of = name
        .strip_suffix(".lock")
        .or_else(|| name.rsplit_once(".tmp-").map(|(base, _)| base));
    matches!(
        sibling_of,
        Some(base) if base == STATUSES_FILE || base == REVERSE_DEPENDENCIES_FILE || base == METADATA_FILE
    )
}
