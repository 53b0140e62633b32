//! core::metadata
//!
//! Version metadata schema and construction helpers.
//!
//! # Modules
//!
//! - [`schema`] - The `ki-version.json` document, dependency edges, status entries
//! - [`builder`] - Selecting files from a directory and computing their entries
//!
//! # Example
//!
//! ```
//! use ki_repo::core::metadata::{FileEntry, VersionMetadata};
//! use ki_repo::core::types::VersionId;
//!
//! let mut meta = VersionMetadata::new(VersionId::new("my/component/23").unwrap());
//! meta.add_file(FileEntry::new("x.txt", 2)).unwrap();
//! assert!(meta.add_file(FileEntry::new("x.txt", 3)).is_err());
//! ```

pub mod builder;
pub mod schema;

pub use builder::{add_files, FileDefaults};
pub use schema::{
    DependencyEdge, FileEntry, MetadataError, Operation, Source, StatusEntry, StatusInfo,
    VersionMetadata, METADATA_FILE, REVERSE_DEPENDENCIES_FILE, STATUSES_FILE,
};
