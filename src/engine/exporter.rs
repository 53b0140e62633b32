//! engine::exporter
//!
//! Materialize a resolved version as a consumable directory tree.
//!
//! Each entry of the [`FileFinder`] manifest becomes a symbolic link to the
//! physical file in the repository, or a byte copy when links are not
//! wanted. Existing entries at a destination are replaced; nothing else in
//! the output directory is touched.

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, info};

use crate::core::errors::{RepoError, Result};
use crate::core::files::FileFinder;
use crate::core::finder::{QueryArg, RepositoryFinder};
use crate::core::hash::HashRegistry;
use crate::core::model::Version;
use crate::core::paths::{check_relative, join_relative};

use super::tester::{TestIssue, VersionTester};

/// Options for one export.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Test the whole dependency closure first.
    pub test_first: bool,
    /// Copy bytes instead of linking.
    pub copy: bool,
    /// Only export files matching one of these patterns.
    pub files: Vec<String>,
    pub tags: Vec<String>,
    pub exclude_tags: Vec<String>,
}

/// What an export produced.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub version: Rc<Version>,
    pub files: usize,
    pub output: PathBuf,
}

pub struct VersionExporter<'a> {
    finder: &'a RepositoryFinder,
    registry: &'a HashRegistry,
}

impl<'a> VersionExporter<'a> {
    pub fn new(finder: &'a RepositoryFinder, registry: &'a HashRegistry) -> Self {
        Self { finder, registry }
    }

    /// Resolve `query` and write its files under `output`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the query resolves to nothing
    /// - `IntegrityMismatch` if `test_first` is set and the test fails;
    ///   nothing is written in that case
    /// - `Configuration` if a logical path would leave `output`; nothing is
    ///   written in that case either
    pub fn export(
        &self,
        query: &[QueryArg],
        output: &Path,
        options: &ExportOptions,
        on_issue: &mut dyn FnMut(&TestIssue),
    ) -> Result<ExportSummary> {
        let version = self.finder.resolve(query, None)?.ok_or_else(|| {
            RepoError::NotFound(format!("version matching {}", describe(query)))
        })?;

        if options.test_first {
            let report = VersionTester::new(self.finder, self.registry).test(version.clone(), on_issue)?;
            if !report.all_ok() {
                return Err(RepoError::IntegrityMismatch(format!(
                    "{} issue(s) in '{}'",
                    report.issues().len(),
                    version.id()
                )));
            }
        }

        let files = FileFinder::new(self.finder, version.clone())
            .files(&options.files)?
            .tags(&options.tags)
            .exclude_tags(&options.exclude_tags)
            .file_map()?;

        // Dependency paths and operations can produce any logical path
        for logical in files.keys() {
            check_relative(logical)?;
        }

        info!(version = %version.id(), files = files.len(), output = %output.display(), "exporting");
        for (logical, physical) in &files {
            let destination = join_relative(output, logical);
            materialize(physical, &destination, options.copy)?;
            debug!(file = %logical, "exported");
        }

        Ok(ExportSummary {
            version,
            files: files.len(),
            output: output.to_path_buf(),
        })
    }
}

fn describe(query: &[QueryArg]) -> String {
    query
        .iter()
        .map(|arg| match arg {
            QueryArg::Query(q) => format!("'{q}'"),
            QueryArg::Component(c) => format!("'{c}'"),
            QueryArg::Version(v) => format!("'{}'", v.id()),
            QueryArg::Statuses(rules) => rules
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(","),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn materialize(physical: &Path, destination: &Path, copy: bool) -> Result<()> {
    if let Ok(existing) = fs::symlink_metadata(destination) {
        let removed = if existing.is_dir() {
            fs::remove_dir_all(destination)
        } else {
            fs::remove_file(destination)
        };
        removed.map_err(|e| RepoError::io(destination, e))?;
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| RepoError::io(parent, e))?;
    }

    if copy {
        fs::copy(physical, destination).map_err(|e| RepoError::io(physical, e))?;
        return Ok(());
    }
    let target = fs::canonicalize(physical).map_err(|e| RepoError::io(physical, e))?;
    link(&target, destination)
}

#[cfg(unix)]
fn link(target: &Path, destination: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, destination).map_err(|e| RepoError::io(destination, e))
}

#[cfg(not(unix))]
fn link(target: &Path, destination: &Path) -> Result<()> {
    // No unprivileged symlinks; fall back to a copy
    fs::copy(target, destination)
        .map(|_| ())
        .map_err(|e| RepoError::io(destination, e))
}
