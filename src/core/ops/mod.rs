//! core::ops
//!
//! File rewrite operations applied to a file manifest.
//!
//! # Modules
//!
//! - [`pattern`] - Anchored file patterns and destination templates
//!
//! # Operations
//!
//! | Operation                     | Effect                                   |
//! |-------------------------------|------------------------------------------|
//! | `cp <pattern>... <dest>`      | Copy every matching entry to `dest`      |
//! | `mv <pattern>... <dest>`      | Copy, then remove the original           |
//! | `rm <pattern>...`             | Remove every matching entry              |
//! | `dep-rm <regex>...`           | Ignored here; prunes dependency walks    |
//!
//! Operations run in list order. Each one works on the keys present when it
//! starts, so a later operation sees the destinations of an earlier one.
//!
//! # Example
//!
//! ```
//! use std::path::PathBuf;
//! use ki_repo::core::metadata::Operation;
//! use ki_repo::core::ops::{apply_operations, FileMap};
//!
//! let mut map = FileMap::new();
//! map.insert("foo.txt".into(), PathBuf::from("/bin/foo.txt"));
//! apply_operations(&mut map, &[Operation::from(["mv", "*.txt", "docs/"])]).unwrap();
//! assert!(map.contains_key("docs/foo.txt"));
//! ```

pub mod pattern;

pub use pattern::{compile_patterns, resolve_destination, FilePattern};

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::debug;

use super::errors::{RepoError, Result};
use super::metadata::Operation;
use super::paths::check_relative;

/// Logical path to physical path.
pub type FileMap = BTreeMap<String, PathBuf>;

/// Apply operations to a file map in order.
///
/// # Errors
///
/// `Configuration` for an unknown operation, a `cp`/`mv` without a source
/// and a destination, a destination leaving the manifest root, or an
/// invalid pattern.
pub fn apply_operations(map: &mut FileMap, operations: &[Operation]) -> Result<()> {
    for op in operations {
        debug!(operation = %op, "applying file operation");
        match op.name() {
            "cp" => copy_or_move(map, op, false)?,
            "mv" => copy_or_move(map, op, true)?,
            "rm" => remove(map, op)?,
            "dep-rm" => {}
            other => {
                return Err(RepoError::Configuration(format!(
                    "unknown file operation '{other}' in '{op}'"
                )))
            }
        }
    }
    Ok(())
}

fn copy_or_move(map: &mut FileMap, op: &Operation, delete: bool) -> Result<()> {
    let Some((dest, sources)) = op.args().split_last() else {
        return Err(RepoError::Configuration(format!(
            "'{op}' needs source patterns and a destination"
        )));
    };
    if sources.is_empty() {
        return Err(RepoError::Configuration(format!(
            "'{op}' needs source patterns and a destination"
        )));
    }
    let patterns = compile_patterns(sources)?;

    let keys: Vec<String> = map.keys().cloned().collect();
    for key in keys {
        let Some(pattern) = pattern::first_match(&patterns, &key) else {
            continue;
        };
        let target = resolve_destination(&key, dest, pattern);
        check_relative(&target)?;
        let Some(physical) = map.get(&key).cloned() else {
            continue;
        };
        map.insert(target.clone(), physical);
        if delete && target != key {
            map.remove(&key);
        }
    }
    Ok(())
}

fn remove(map: &mut FileMap, op: &Operation) -> Result<()> {
    if op.args().is_empty() {
        return Err(RepoError::Configuration(format!(
            "'{op}' needs at least one pattern"
        )));
    }
    let patterns = compile_patterns(op.args())?;
    map.retain(|key, _| pattern::first_match(&patterns, key).is_none());
    Ok(())
}
