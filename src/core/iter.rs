//! core::iter
//!
//! Walk a version's dependency graph.
//!
//! # Traversal Rules
//!
//! - The root is visited first, then each dependency in declaration order,
//!   depth first.
//! - Internal dependencies are followed only from the root.
//! - A dependency is skipped (with its whole sub-tree) when any exclusion
//!   pattern of its parent matches its version id or its dependency path.
//! - A child's exclusions are its parent's plus the `dep-rm` patterns on the
//!   edge leading to it, so a `dep-rm` prunes every deeper branch.
//! - Exclusion patterns are unanchored regular expressions.
//!
//! # Invariants
//!
//! - A version never appears twice on one root-to-leaf path; such a graph
//!   is rejected with [`RepoError::DependencyCycle`]. The same version may
//!   still be reached through two different branches.

use std::ops::ControlFlow;
use std::rc::Rc;

use regex::Regex;
use tracing::debug;

use super::errors::{RepoError, Result};
use super::finder::RepositoryFinder;
use super::metadata::DependencyEdge;
use super::model::Version;
use super::types::VersionId;

/// Join two `/`-separated logical paths, skipping empty parts.
pub(crate) fn join_logical(parent: &str, child: &str) -> String {
    match (parent.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (_, true) => parent.to_string(),
        _ => format!("{parent}/{child}"),
    }
}

/// Compile exclusion patterns.
pub fn compile_exclusions<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            let p = p.as_ref();
            Regex::new(p).map_err(|e| {
                RepoError::Configuration(format!("invalid exclusion pattern '{p}': {e}"))
            })
        })
        .collect()
}

/// One position in a dependency walk.
#[derive(Debug, Clone)]
pub struct VersionIterator<'f> {
    finder: &'f RepositoryFinder,
    version: Rc<Version>,
    edge: Option<DependencyEdge>,
    exclusions: Vec<Regex>,
    include_internal: bool,
    package_path: String,
    dependency_path: String,
    ancestors: Vec<VersionId>,
}

impl<'f> VersionIterator<'f> {
    /// Start a walk at `version`.
    pub fn new(finder: &'f RepositoryFinder, version: Rc<Version>) -> Self {
        Self {
            finder,
            version,
            edge: None,
            exclusions: Vec::new(),
            include_internal: true,
            package_path: String::new(),
            dependency_path: String::new(),
            ancestors: Vec::new(),
        }
    }

    /// Exclude dependencies whose id or dependency path matches any pattern.
    pub fn with_exclusions<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self> {
        self.exclusions.extend(compile_exclusions(patterns)?);
        Ok(self)
    }

    pub fn finder(&self) -> &'f RepositoryFinder {
        self.finder
    }

    pub fn version(&self) -> &Rc<Version> {
        &self.version
    }

    /// The edge this position was reached through; `None` at the root.
    pub fn edge(&self) -> Option<&DependencyEdge> {
        self.edge.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.edge.is_none()
    }

    /// Accumulated `path` prefixes: where this version's files land.
    pub fn package_path(&self) -> &str {
        &self.package_path
    }

    /// Accumulated dependency names from the root.
    pub fn dependency_path(&self) -> &str {
        &self.dependency_path
    }

    fn excludes(&self, version_id: &VersionId, dependency_path: &str) -> bool {
        self.exclusions.iter().any(|re| {
            re.is_match(version_id.as_str())
                || (!dependency_path.is_empty() && re.is_match(dependency_path))
        })
    }

    /// The dependencies to descend into, in declaration order.
    ///
    /// # Errors
    ///
    /// - `NotFound` if a followed dependency does not exist
    /// - `DependencyCycle` if a dependency is already on the current path
    pub fn children(&self) -> Result<Vec<VersionIterator<'f>>> {
        let metadata = self.version.metadata()?;
        let mut children = Vec::new();
        for edge in &metadata.dependencies {
            if edge.internal && !self.include_internal {
                continue;
            }
            let dependency_path =
                join_logical(&self.dependency_path, edge.name.as_deref().unwrap_or(""));
            if self.excludes(&edge.version_id, &dependency_path) {
                debug!(
                    dependency = %edge.version_id,
                    path = %dependency_path,
                    "dependency excluded"
                );
                continue;
            }

            let mut ancestors = self.ancestors.clone();
            ancestors.push(self.version.id().clone());
            if ancestors.contains(&edge.version_id) {
                let chain: Vec<&str> = ancestors.iter().map(VersionId::as_str).collect();
                return Err(RepoError::DependencyCycle(format!(
                    "{} -> {}",
                    chain.join(" -> "),
                    edge.version_id
                )));
            }

            let version = self.finder.version_by_id(&edge.version_id)?;
            if !version.exists() {
                return Err(RepoError::NotFound(format!(
                    "dependency '{}' of '{}'",
                    edge.version_id,
                    self.version.id()
                )));
            }

            let mut exclusions = self.exclusions.clone();
            exclusions.extend(compile_exclusions(
                &edge.dep_rm_patterns().collect::<Vec<_>>(),
            )?);

            children.push(VersionIterator {
                finder: self.finder,
                version,
                edge: Some(edge.clone()),
                exclusions,
                include_internal: false,
                package_path: join_logical(
                    &self.package_path,
                    edge.path.as_deref().unwrap_or(""),
                ),
                dependency_path,
                ancestors,
            });
        }
        Ok(children)
    }

    /// Visit this version and then, depth first, every followed dependency.
    ///
    /// The visitor may stop the walk early with `ControlFlow::Break`.
    pub fn iterate_versions<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&VersionIterator<'f>) -> Result<ControlFlow<()>>,
    {
        self.walk(&mut visit).map(|_| ())
    }

    fn walk<F>(&self, visit: &mut F) -> Result<ControlFlow<()>>
    where
        F: FnMut(&VersionIterator<'f>) -> Result<ControlFlow<()>>,
    {
        if visit(self)?.is_break() {
            return Ok(ControlFlow::Break(()));
        }
        for child in self.children()? {
            if child.walk(visit)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }
}
