//! core::files
//!
//! Flatten a version's dependency closure into one file manifest.
//!
//! # Algorithm
//!
//! For each visited version, innermost first:
//!
//! 1. Build every followed dependency's map, apply that edge's operations
//!    to it and merge it into the result. A later dependency overwrites an
//!    earlier one on the same logical path.
//! 2. Add the version's own files under its package path when they pass
//!    the filters.
//! 3. Apply the version's own operations to the whole map.
//!
//! Path and tag filters are set on the root and apply to every level. Path
//! filters see the package-prefixed logical path.
//!
//! # Example
//!
//! ```no_run
//! use ki_repo::core::files::FileFinder;
//! use ki_repo::core::finder::RepositoryFinder;
//! use ki_repo::core::repository::KiHome;
//!
//! let finder = RepositoryFinder::new(&KiHome::new("/srv/ki"))?;
//! let version = finder.require("my/product")?;
//! let files = FileFinder::new(&finder, version)
//!     .files(&["*.txt"])?
//!     .exclude_tags(&["debug"])
//!     .file_map()?;
//! # Ok::<(), ki_repo::core::errors::RepoError>(())
//! ```

use std::path::PathBuf;
use std::rc::Rc;

use tracing::debug;

use super::errors::Result;
use super::finder::RepositoryFinder;
use super::iter::{join_logical, VersionIterator};
use super::metadata::FileEntry;
use super::model::Version;
use super::ops::{apply_operations, compile_patterns, FileMap, FilePattern};
use super::paths::join_relative;

/// Builds the file manifest of a version and its dependencies.
#[derive(Debug, Clone)]
pub struct FileFinder<'f> {
    root: VersionIterator<'f>,
    files: Vec<FilePattern>,
    exclude_files: Vec<FilePattern>,
    tags: Vec<String>,
    exclude_tags: Vec<String>,
}

impl<'f> FileFinder<'f> {
    pub fn new(finder: &'f RepositoryFinder, version: Rc<Version>) -> Self {
        Self::from_iterator(VersionIterator::new(finder, version))
    }

    /// Start from a configured walk (e.g. one with exclusions).
    pub fn from_iterator(root: VersionIterator<'f>) -> Self {
        Self {
            root,
            files: Vec::new(),
            exclude_files: Vec::new(),
            tags: Vec::new(),
            exclude_tags: Vec::new(),
        }
    }

    /// Exclude dependencies by id or dependency path.
    pub fn exclude_dependencies<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self> {
        self.root = self.root.with_exclusions(patterns)?;
        Ok(self)
    }

    /// Only include files matching one of these patterns. Empty selects all.
    pub fn files<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self> {
        self.files.extend(compile_patterns(patterns)?);
        Ok(self)
    }

    pub fn exclude_files<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self> {
        self.exclude_files.extend(compile_patterns(patterns)?);
        Ok(self)
    }

    /// Only include files carrying at least one of these tags.
    pub fn tags<S: AsRef<str>>(mut self, tags: &[S]) -> Self {
        self.tags
            .extend(tags.iter().map(|t| t.as_ref().to_string()));
        self
    }

    pub fn exclude_tags<S: AsRef<str>>(mut self, tags: &[S]) -> Self {
        self.exclude_tags
            .extend(tags.iter().map(|t| t.as_ref().to_string()));
        self
    }

    /// Logical path to physical path for the whole closure.
    ///
    /// # Errors
    ///
    /// - `Io` if any contributing version has no binaries root, even when
    ///   none of its files are selected
    /// - anything raised by the dependency walk or the operations
    pub fn file_map(&self) -> Result<FileMap> {
        self.collect(&self.root)
    }

    /// Physical paths of [`file_map`](Self::file_map), ordered by logical path.
    pub fn file_list(&self) -> Result<Vec<PathBuf>> {
        Ok(self.file_map()?.into_values().collect())
    }

    fn collect(&self, node: &VersionIterator<'f>) -> Result<FileMap> {
        let mut map = FileMap::new();
        for child in node.children()? {
            let mut child_map = self.collect(&child)?;
            if let Some(edge) = child.edge() {
                apply_operations(&mut child_map, &edge.operations)?;
            }
            map.extend(child_map);
        }

        let version = node.version();
        let metadata = version.metadata()?;
        let binaries = version.binaries()?;
        let mut added = 0usize;
        for file in &metadata.files {
            let logical = join_logical(node.package_path(), &file.path);
            if self.selects(file, &logical) {
                map.insert(logical, join_relative(binaries, &file.path));
                added += 1;
            }
        }
        debug!(version = %version.id(), added, "collected files");

        apply_operations(&mut map, &metadata.operations)?;
        Ok(map)
    }

    fn selects(&self, file: &FileEntry, logical: &str) -> bool {
        (self.files.is_empty() || self.files.iter().any(|p| p.is_match(logical)))
            && !self.exclude_files.iter().any(|p| p.is_match(logical))
            && (self.tags.is_empty() || file.has_any_tag(&self.tags))
            && !file.has_any_tag(&self.exclude_tags)
    }
}
