//! core::model
//!
//! Components and versions merged across overlaid repositories.
//!
//! # Merge Rules
//!
//! | Data            | Merged value                                        |
//! |-----------------|-----------------------------------------------------|
//! | Version list    | From the first repository that has one              |
//! | Status ordering | Union, later repositories overwrite earlier keys    |
//! | Metadata        | First document found; documents are never merged    |
//! | Binaries root   | First repository whose version directory has files  |
//! | Statuses        | Concatenation of every repository's log, in order   |
//!
//! Merged values are computed per query session and never written back.

use std::path::{Path, PathBuf};

use super::errors::{RepoError, Result};
use super::metadata::{StatusEntry, StatusInfo, VersionMetadata};
use super::repository::{Repository, VersionEntry};
use super::types::{ComponentId, VersionId};

/// A component merged across repositories.
#[derive(Debug, Clone)]
pub struct Component {
    id: ComponentId,
    versions: Vec<VersionEntry>,
    status_info: StatusInfo,
}

impl Component {
    /// Merge the component's documents from `repositories`.
    pub fn load(id: ComponentId, repositories: &[Repository]) -> Result<Self> {
        let mut versions = None;
        let mut status_info = StatusInfo::new();
        for repo in repositories {
            if versions.is_none() {
                versions = repo.versions(&id)?;
            }
            if let Some(info) = repo.status_info(&id)? {
                status_info.extend(info);
            }
        }
        Ok(Self {
            id,
            versions: versions.unwrap_or_default(),
            status_info,
        })
    }

    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    /// Version entries, newest first.
    pub fn versions(&self) -> &[VersionEntry] {
        &self.versions
    }

    /// Version ids, newest first.
    pub fn version_ids(&self) -> Result<Vec<VersionId>> {
        self.versions
            .iter()
            .map(|v| Ok(self.id.version(&v.id)?))
            .collect()
    }

    /// The newest version id, if the component has any versions.
    pub fn latest(&self) -> Result<Option<VersionId>> {
        match self.versions.first() {
            Some(v) => Ok(Some(self.id.version(&v.id)?)),
            None => Ok(None),
        }
    }

    pub fn status_info(&self) -> &StatusInfo {
        &self.status_info
    }

    /// The configured ordering for a status key.
    pub fn status_order(&self, key: &str) -> Option<&[String]> {
        self.status_info.get(key).map(Vec::as_slice)
    }
}

/// Where a version's data lives in one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionLocation {
    pub repository: String,
    pub directory: PathBuf,
    pub has_metadata: bool,
}

/// A version merged across repositories.
#[derive(Debug, Clone)]
pub struct Version {
    id: VersionId,
    metadata: Option<VersionMetadata>,
    metadata_path: Option<PathBuf>,
    binaries: Option<PathBuf>,
    statuses: Vec<StatusEntry>,
    reverse_dependencies: Vec<VersionId>,
    locations: Vec<VersionLocation>,
}

impl Version {
    /// Merge the version's documents from `repositories`.
    pub fn load(id: VersionId, repositories: &[Repository]) -> Result<Self> {
        let mut version = Self::empty(id);
        for repo in repositories {
            let metadata = repo.metadata(&version.id)?;
            let has_metadata = metadata.is_some();
            if version.metadata.is_none() {
                if let Some(metadata) = metadata {
                    version.metadata = Some(metadata);
                    version.metadata_path = Some(repo.paths().metadata_path(&version.id));
                }
            }

            let binaries = repo.binaries(&version.id);
            if let Some(dir) = &binaries {
                version.locations.push(VersionLocation {
                    repository: repo.name().to_string(),
                    directory: dir.clone(),
                    has_metadata,
                });
            }
            if version.binaries.is_none() {
                version.binaries = binaries;
            }

            version.statuses.extend(repo.statuses(&version.id)?);
            for dependent in repo.reverse_dependencies(&version.id)? {
                if !version.reverse_dependencies.contains(&dependent) {
                    version.reverse_dependencies.push(dependent);
                }
            }
        }
        Ok(version)
    }

    /// A version that is not in any repository: a metadata file next to a
    /// directory of binaries, as produced by build tooling.
    pub fn detached(
        metadata: VersionMetadata,
        metadata_path: impl Into<PathBuf>,
        binaries: impl Into<PathBuf>,
    ) -> Result<Self> {
        let id = metadata.require_version_id()?.clone();
        let mut version = Self::empty(id);
        version.metadata = Some(metadata);
        version.metadata_path = Some(metadata_path.into());
        version.binaries = Some(binaries.into());
        Ok(version)
    }

    fn empty(id: VersionId) -> Self {
        Self {
            id,
            metadata: None,
            metadata_path: None,
            binaries: None,
            statuses: Vec::new(),
            reverse_dependencies: Vec::new(),
            locations: Vec::new(),
        }
    }

    pub fn id(&self) -> &VersionId {
        &self.id
    }

    /// A version exists if any repository has its metadata or binaries.
    pub fn exists(&self) -> bool {
        self.metadata.is_some() || self.binaries.is_some()
    }

    /// The version's metadata document.
    ///
    /// # Errors
    ///
    /// `NotFound` if no repository has a metadata document for the version.
    pub fn metadata(&self) -> Result<&VersionMetadata> {
        self.metadata
            .as_ref()
            .ok_or_else(|| RepoError::NotFound(format!("metadata for '{}'", self.id)))
    }

    /// Path of the metadata document in use, if any.
    pub fn metadata_path(&self) -> Option<&Path> {
        self.metadata_path.as_deref()
    }

    /// Root directory of the version's files.
    ///
    /// # Errors
    ///
    /// `Io` if the binaries root is absent.
    pub fn binaries(&self) -> Result<&Path> {
        match &self.binaries {
            Some(dir) if dir.is_dir() => Ok(dir),
            Some(dir) => Err(RepoError::io(
                dir.clone(),
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("binaries of '{}' are missing", self.id),
                ),
            )),
            None => Err(RepoError::io(
                PathBuf::from(self.id.as_str()),
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no repository has binaries for '{}'", self.id),
                ),
            )),
        }
    }

    /// The binaries root without checking that it is present on disk.
    pub fn binaries_root(&self) -> Option<&Path> {
        self.binaries.as_deref()
    }

    /// Status log, oldest first, concatenated across repositories.
    pub fn statuses(&self) -> &[StatusEntry] {
        &self.statuses
    }

    /// The latest value recorded for a status key.
    pub fn latest_status(&self, key: &str) -> Option<&str> {
        self.statuses
            .iter()
            .rev()
            .find(|s| s.key == key)
            .map(|s| s.value.as_str())
    }

    /// Versions that were imported with a dependency on this one.
    pub fn reverse_dependencies(&self) -> &[VersionId] {
        &self.reverse_dependencies
    }

    /// Every repository directory that holds this version.
    pub fn locations(&self) -> &[VersionLocation] {
        &self.locations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::FileEntry;
    use crate::core::repository::KiHome;
    use tempfile::TempDir;

    fn vid(s: &str) -> VersionId {
        VersionId::new(s).unwrap()
    }

    #[test]
    fn component_merges_across_repositories() {
        let temp = TempDir::new().unwrap();
        let home = KiHome::new(temp.path());
        let local = home.ensure_repository("local").unwrap();
        let site = home.ensure_repository("site").unwrap();
        let comp = ComponentId::new("test/comp").unwrap();

        site.add_version(&vid("test/comp/1")).unwrap();
        site.add_version(&vid("test/comp/2")).unwrap();
        local.set_status_order(&comp, "maturity", vec!["a".into()]).unwrap();
        site.set_status_order(&comp, "maturity", vec!["b".into()]).unwrap();
        site.set_status_order(&comp, "Smoke", vec!["red".into(), "green".into()])
            .unwrap();

        let merged = Component::load(comp, &home.repositories().unwrap()).unwrap();
        let ids: Vec<String> = merged
            .version_ids()
            .unwrap()
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(ids, vec!["test/comp/2", "test/comp/1"]);
        assert_eq!(merged.status_order("maturity").unwrap(), ["b"]);
        assert!(merged.status_order("Smoke").is_some());
    }

    #[test]
    fn version_merges_metadata_binaries_and_statuses() {
        let temp = TempDir::new().unwrap();
        let home = KiHome::new(temp.path());
        let local = home.ensure_repository("local").unwrap();
        let site = home.ensure_repository("site").unwrap();
        let id = vid("my/component/23");

        // Metadata only in site, statuses in both
        let mut meta = VersionMetadata::new(id.clone());
        meta.add_file(FileEntry::new("a.txt", 1)).unwrap();
        site.write_metadata(&id, &meta).unwrap();
        local.add_status(&id, StatusEntry::new("Smoke", "red")).unwrap();
        site.add_status(&id, StatusEntry::new("Smoke", "green")).unwrap();

        let version = Version::load(id.clone(), &home.repositories().unwrap()).unwrap();
        assert!(version.exists());
        assert_eq!(version.metadata().unwrap().files.len(), 1);
        assert_eq!(
            version.metadata_path().unwrap(),
            site.paths().metadata_path(&id)
        );
        // local only carries a status log
        assert_eq!(version.binaries().unwrap(), site.paths().version_dir(&id));
        assert_eq!(version.statuses().len(), 2);
        assert_eq!(version.latest_status("Smoke"), Some("green"));
        assert_eq!(version.locations().len(), 1);
        assert_eq!(version.locations()[0].repository, "site");
    }

    #[test]
    fn missing_version_does_not_exist() {
        let temp = TempDir::new().unwrap();
        let home = KiHome::new(temp.path());
        home.ensure_repository("local").unwrap();

        let version = Version::load(vid("nope/1"), &home.repositories().unwrap()).unwrap();
        assert!(!version.exists());
        assert!(matches!(version.metadata(), Err(RepoError::NotFound(_))));
        assert!(matches!(version.binaries(), Err(RepoError::Io { .. })));
    }
}
