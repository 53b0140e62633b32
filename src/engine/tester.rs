//! engine::tester
//!
//! Verify that a version's files are intact.
//!
//! # Checks
//!
//! For every file entry of every visited version, in order:
//!
//! 1. `missing`: the physical file does not exist
//! 2. `wrong size`: the size differs from the recorded size
//! 3. `wrong hash`: a recorded digest of a registered algorithm differs
//!
//! Only the first failing check is reported per file. All digests of one
//! file are computed in a single pass.
//!
//! Issues never abort the walk; they are collected into a [`TestReport`]
//! and handed to the caller's callback as they are found.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, info};

use crate::core::errors::{RepoError, Result};
use crate::core::finder::RepositoryFinder;
use crate::core::hash::HashRegistry;
use crate::core::iter::VersionIterator;
use crate::core::metadata::{FileEntry, VersionMetadata};
use crate::core::model::Version;
use crate::core::paths::{check_relative, join_relative};
use crate::core::store::JsonDocument;
use crate::core::types::VersionId;

/// What is wrong with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IssueKind {
    Missing,
    WrongSize,
    WrongHash,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IssueKind::Missing => "missing",
            IssueKind::WrongSize => "wrong size",
            IssueKind::WrongHash => "wrong hash",
        })
    }
}

/// One failed file check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestIssue {
    pub kind: IssueKind,
    pub version: VersionId,
    /// The metadata document the file is listed in.
    pub metadata_path: PathBuf,
    /// Path as listed in the metadata.
    pub file: String,
    /// Where the file was looked for.
    pub physical_path: PathBuf,
}

impl fmt::Display for TestIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: '{}' {} '{}'",
            self.metadata_path.display(),
            self.file,
            self.kind,
            self.physical_path.display()
        )
    }
}

/// Every issue found in one test run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestReport {
    issues: Vec<TestIssue>,
    versions_tested: usize,
    files_tested: usize,
}

impl TestReport {
    pub fn all_ok(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[TestIssue] {
        &self.issues
    }

    /// Issues grouped by kind.
    pub fn by_kind(&self) -> BTreeMap<IssueKind, Vec<&TestIssue>> {
        let mut grouped: BTreeMap<IssueKind, Vec<&TestIssue>> = BTreeMap::new();
        for issue in &self.issues {
            grouped.entry(issue.kind).or_default().push(issue);
        }
        grouped
    }

    pub fn versions_tested(&self) -> usize {
        self.versions_tested
    }

    pub fn files_tested(&self) -> usize {
        self.files_tested
    }
}

/// Tests versions against their metadata.
pub struct VersionTester<'a> {
    finder: &'a RepositoryFinder,
    registry: &'a HashRegistry,
    recursive: bool,
}

impl<'a> VersionTester<'a> {
    /// A recursive tester.
    pub fn new(finder: &'a RepositoryFinder, registry: &'a HashRegistry) -> Self {
        Self {
            finder,
            registry,
            recursive: true,
        }
    }

    /// Whether dependencies are tested too.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Test a resolved version.
    ///
    /// # Errors
    ///
    /// Only for problems outside the files themselves: unreadable metadata,
    /// unresolvable dependencies, I/O errors while hashing.
    pub fn test(
        &self,
        version: Rc<Version>,
        on_issue: &mut dyn FnMut(&TestIssue),
    ) -> Result<TestReport> {
        let mut report = TestReport::default();
        VersionIterator::new(self.finder, version).iterate_versions(|node| {
            self.test_one(node.version(), &mut report, on_issue)?;
            if self.recursive {
                Ok(ControlFlow::Continue(()))
            } else {
                Ok(ControlFlow::Break(()))
            }
        })?;
        info!(
            versions = report.versions_tested,
            files = report.files_tested,
            issues = report.issues.len(),
            "test finished"
        );
        Ok(report)
    }

    /// Test a metadata file that is not in any repository against a
    /// directory of binaries.
    pub fn test_file(
        &self,
        metadata_path: &Path,
        binaries: &Path,
        on_issue: &mut dyn FnMut(&TestIssue),
    ) -> Result<TestReport> {
        let version = load_detached(metadata_path, binaries)?;
        self.test(Rc::new(version), on_issue)
    }

    fn test_one(
        &self,
        version: &Version,
        report: &mut TestReport,
        on_issue: &mut dyn FnMut(&TestIssue),
    ) -> Result<()> {
        let metadata = version.metadata()?;
        let metadata_path = version
            .metadata_path()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(version.id().as_str()));
        let root = version.binaries_root().ok_or_else(|| {
            RepoError::NotFound(format!("binaries for '{}'", version.id()))
        })?;
        debug!(version = %version.id(), files = metadata.files.len(), "testing version");

        report.versions_tested += 1;
        for file in &metadata.files {
            report.files_tested += 1;
            let physical_path = join_relative(root, &file.path);
            if let Some(kind) = self.check(file, &physical_path)? {
                let issue = TestIssue {
                    kind,
                    version: version.id().clone(),
                    metadata_path: metadata_path.clone(),
                    file: file.path.clone(),
                    physical_path,
                };
                on_issue(&issue);
                report.issues.push(issue);
            }
        }
        Ok(())
    }

    fn check(&self, file: &FileEntry, path: &Path) -> Result<Option<IssueKind>> {
        let stat = match std::fs::metadata(path) {
            Ok(stat) if stat.is_file() => stat,
            _ => return Ok(Some(IssueKind::Missing)),
        };
        if stat.len() != file.size {
            return Ok(Some(IssueKind::WrongSize));
        }

        let ids: Vec<&str> = self
            .registry
            .ids()
            .into_iter()
            .filter(|id| file.hash(id).is_some())
            .collect();
        if ids.is_empty() {
            return Ok(None);
        }
        let actual = self.registry.calculate(path, &ids)?;
        let intact = actual
            .iter()
            .all(|(id, hex)| file.hash(id) == Some(hex.as_str()));
        Ok((!intact).then_some(IssueKind::WrongHash))
    }
}

/// Read a metadata file and pair it with a binaries directory.
///
/// # Errors
///
/// `Configuration` if a listed file path would leave `binaries`.
pub fn load_detached(metadata_path: &Path, binaries: &Path) -> Result<Version> {
    let metadata: VersionMetadata = JsonDocument::new(metadata_path)
        .read()?
        .ok_or_else(|| RepoError::NotFound(format!("metadata file '{}'", metadata_path.display())))?;
    for file in &metadata.files {
        check_relative(&file.path)?;
    }
    Version::detached(metadata, metadata_path, binaries)
}
