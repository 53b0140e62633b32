//! engine
//!
//! Workflows that move versions in and out of repositories.
//!
//! # Architecture
//!
//! The engine sits on top of [`crate::core`]. Every workflow takes a
//! [`RepositoryFinder`](crate::core::finder::RepositoryFinder) for
//! resolution and a [`HashRegistry`](crate::core::hash::HashRegistry) for
//! digests:
//!
//! - [`tester`] - verify files against their metadata
//! - [`importer`] - test, then commit a built version into a repository
//! - [`exporter`] - optionally test, then link or copy a resolved version
//!
//! # Invariants
//!
//! - Import and export run the tester first and write nothing when it fails
//! - The importer invalidates the finder's caches after every commit
//!
//! # Example
//!
//! ```no_run
//! use ki_repo::core::finder::{QueryArg, RepositoryFinder};
//! use ki_repo::core::hash::HashRegistry;
//! use ki_repo::core::repository::KiHome;
//! use ki_repo::engine::exporter::{ExportOptions, VersionExporter};
//!
//! let home = KiHome::new("/srv/ki");
//! let finder = RepositoryFinder::new(&home)?;
//! let registry = HashRegistry::with_defaults();
//! VersionExporter::new(&finder, &registry).export(
//!     &[QueryArg::from("my/product:maturity=stable")],
//!     "out".as_ref(),
//!     &ExportOptions::default(),
//!     &mut |issue| eprintln!("{issue}"),
//! )?;
//! # Ok::<(), ki_repo::core::errors::RepoError>(())
//! ```

pub mod exporter;
pub mod importer;
pub mod tester;

use std::path::PathBuf;

/// Execution context for commands.
///
/// Contains global settings derived from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Ki home override.
    pub home: Option<PathBuf>,
    /// Debug output enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
}
