//! core
//!
//! Core domain types, documents and resolution for ki-repo.
//!
//! # Modules
//!
//! - [`types`] - Strong types: ComponentId, VersionId, UtcTimestamp
//! - [`errors`] - The shared error taxonomy
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized path routing for the on-disk layout
//! - [`store`] - Locked JSON document storage
//! - [`hash`] - Hash algorithm registry
//! - [`metadata`] - Version metadata schema and builder
//! - [`repository`] - Per-repository document access
//! - [`model`] - Components and versions merged across repositories
//! - [`query`] - Version query parsing
//! - [`finder`] - Version resolution with a merged cache
//! - [`iter`] - Dependency graph traversal
//! - [`ops`] - Logical file operations
//! - [`files`] - File manifests of a version's dependency closure
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid ids at construction
//! - Schemas are strict and self-describing
//! - Merged views are computed on read and never written back

pub mod config;
pub mod errors;
pub mod files;
pub mod finder;
pub mod hash;
pub mod iter;
pub mod metadata;
pub mod model;
pub mod ops;
pub mod paths;
pub mod query;
pub mod repository;
pub mod store;
pub mod types;
