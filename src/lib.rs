//! Ki-repo - an artifact repository for versioned build outputs
//!
//! Ki-repo stores immutable versions of components in one or more overlaid
//! repositories on the local file system, resolves versions by status
//! queries, walks their dependency graphs, verifies file integrity and
//! materializes a resolved version as a directory tree.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Test, import and export workflows
//! - [`core`] - Domain types, documents, resolution and file manifests
//! - [`ui`] - Output formatting
//!
//! # Correctness Invariants
//!
//! 1. Committed versions are never modified by ki-repo
//! 2. Import and export write nothing when the integrity test fails
//! 3. Every read-modify-write of a shared document holds an advisory lock

pub mod cli;
pub mod core;
pub mod engine;
pub mod ui;
