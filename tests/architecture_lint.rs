//! Architecture enforcement tests.
//!
//! The crate is layered `cli -> engine -> core`, with `ui` used only by the
//! CLI. These tests read the sources and fail when a lower layer reaches
//! up, or when library code prints instead of logging.
//!
//! # Test Categories
//!
//! 1. **Layer Imports** - `core` and `engine` never import upper layers
//! 2. **Output Discipline** - library code never writes to stdout/stderr

use std::fs;
use std::path::{Path, PathBuf};

/// Every `.rs` file below `dir`.
fn rust_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).unwrap_or_else(|_| panic!("Failed to read {}", dir.display())) {
        let path = entry.expect("Failed to read entry").path();
        if path.is_dir() {
            files.extend(rust_files(&path));
        } else if path.extension().map(|e| e == "rs").unwrap_or(false) {
            files.push(path);
        }
    }
    files
}

/// Code lines outside `#[cfg(test)]` modules, without comments and docs.
fn non_test_source(path: &Path) -> String {
    let content =
        fs::read_to_string(path).unwrap_or_else(|_| panic!("Failed to read {}", path.display()));
    let code = match content.find("#[cfg(test)]") {
        Some(index) => &content[..index],
        None => &content,
    };
    code.lines()
        .filter(|line| !line.trim_start().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn violations(dir: &str, forbidden: &[&str]) -> Vec<String> {
    let mut found = Vec::new();
    for path in rust_files(Path::new(dir)) {
        let source = non_test_source(&path);
        for needle in forbidden {
            if source.contains(needle) {
                found.push(format!("{}: contains `{}`", path.display(), needle));
            }
        }
    }
    found
}

// =============================================================================
// Layer Imports
// =============================================================================

#[test]
fn core_does_not_import_upper_layers() {
    let found = violations(
        "src/core",
        &["crate::engine", "crate::cli", "crate::ui", "anyhow"],
    );
    assert!(found.is_empty(), "Layer violations:\n{}", found.join("\n"));
}

#[test]
fn engine_does_not_import_cli_or_ui() {
    let found = violations("src/engine", &["crate::cli", "crate::ui", "anyhow"]);
    assert!(found.is_empty(), "Layer violations:\n{}", found.join("\n"));
}

// =============================================================================
// Output Discipline
// =============================================================================

/// Library layers log through `tracing`; only `ui::output` prints.
#[test]
fn library_code_does_not_print() {
    let forbidden = ["println!", "eprintln!", "print!(", "eprint!("];
    let mut found = violations("src/core", &forbidden);
    found.extend(violations("src/engine", &forbidden));
    assert!(found.is_empty(), "Direct output:\n{}", found.join("\n"));
}
