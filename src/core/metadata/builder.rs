//! core::metadata::builder
//!
//! Assemble file entries for a metadata document from a directory.
//!
//! Patterns are shell-style and relative to the input directory: `*`
//! and `?` never cross a `/`, `**` does. A pattern that names a
//! directory selects every file below it.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

use super::schema::{FileEntry, VersionMetadata};
use crate::core::errors::{RepoError, Result};
use crate::core::hash::HashRegistry;

/// Attributes applied to every file added in one build step.
#[derive(Debug, Clone, Default)]
pub struct FileDefaults {
    /// Tags recorded on each file (stored sorted).
    pub tags: Vec<String>,
    /// Hash algorithm ids to compute.
    pub hashes: Vec<String>,
}

/// Compile a shell-style pattern into an anchored regex.
fn shell_glob(pattern: &str) -> Result<Regex> {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                re.push_str(".*");
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| RepoError::Configuration(format!("bad pattern '{pattern}': {e}")))
}

fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Collect the files under `input_dir` selected by `patterns`, sorted by
/// relative path. `skip` excludes one file (usually the metadata document
/// being written).
pub fn select_files(
    input_dir: &Path,
    patterns: &[String],
    skip: Option<&Path>,
) -> Result<Vec<(String, PathBuf)>> {
    let matchers = patterns
        .iter()
        .map(|p| shell_glob(p))
        .collect::<Result<Vec<_>>>()?;

    let mut selected = BTreeSet::new();
    let walker = WalkDir::new(input_dir).min_depth(1).sort_by_file_name();
    let mut matched_dirs: Vec<PathBuf> = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(input_dir).to_path_buf();
            RepoError::io(path, std::io::Error::other(e.to_string()))
        })?;
        let path = entry.path();
        let Some(rel) = relative_str(input_dir, path) else {
            continue;
        };

        let under_matched_dir = matched_dirs.iter().any(|d| path.starts_with(d));
        let matches = matchers.iter().any(|m| m.is_match(&rel));

        if entry.file_type().is_dir() {
            if matches {
                matched_dirs.push(path.to_path_buf());
            }
            continue;
        }
        if (matches || under_matched_dir) && Some(path) != skip {
            selected.insert((rel, path.to_path_buf()));
        }
    }
    Ok(selected.into_iter().collect())
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    false
}

/// Build the file entry for one physical file.
pub fn file_entry(
    rel_path: &str,
    full_path: &Path,
    defaults: &FileDefaults,
    registry: &HashRegistry,
) -> Result<FileEntry> {
    let stat = std::fs::metadata(full_path).map_err(|e| RepoError::io(full_path, e))?;
    let mut entry = FileEntry::new(rel_path, stat.len());
    entry.executable = is_executable(&stat);
    let mut tags = defaults.tags.clone();
    tags.sort();
    tags.dedup();
    entry.tags = tags;
    for (id, hex) in registry.calculate(full_path, &defaults.hashes)? {
        entry = entry.with_hash(id, hex);
    }
    Ok(entry)
}

/// Add every file selected by `patterns` to `meta`.
///
/// Returns the number of files processed.
pub fn add_files(
    meta: &mut VersionMetadata,
    input_dir: &Path,
    patterns: &[String],
    defaults: &FileDefaults,
    registry: &HashRegistry,
    skip: Option<&Path>,
) -> Result<usize> {
    let files = select_files(input_dir, patterns, skip)?;
    for (rel, full) in &files {
        debug!(file = %rel, "adding file to metadata");
        meta.add_file(file_entry(rel, full, defaults, registry)?)?;
    }
    Ok(files.len())
}
