//! version-show command - Show a version's metadata

use std::ops::ControlFlow;
use std::rc::Rc;

use super::Session;
use crate::cli::args::VersionSource;
use crate::core::iter::VersionIterator;
use crate::engine::tester::load_detached;
use crate::engine::Context;
use crate::ui::output;
use anyhow::Result;

/// Print a version, and with `recursive` every version it depends on.
pub fn show(ctx: &Context, recursive: bool, dirs: bool, source: &VersionSource) -> Result<()> {
    let session = Session::open(ctx)?;
    let version = match (&source.file, &source.input) {
        (Some(file), Some(input)) => Rc::new(load_detached(file, input)?),
        _ => session.require(&source.query)?,
    };

    let mut blocks = Vec::new();
    VersionIterator::new(&session.finder, version).iterate_versions(|node| {
        blocks.push(describe(node, dirs)?);
        Ok(if recursive {
            ControlFlow::Continue(())
        } else {
            ControlFlow::Break(())
        })
    })?;
    output::data(blocks.join("\n"));
    Ok(())
}

fn describe(node: &VersionIterator<'_>, dirs: bool) -> crate::core::errors::Result<String> {
    let version = node.version();
    let meta = version.metadata()?;
    let mut lines = vec![format!("version: {}", version.id())];
    if !node.is_root() {
        lines.push(format!("dependency path: {}", node.dependency_path()));
        if !node.package_path().is_empty() {
            lines.push(format!("package path: {}", node.package_path()));
        }
    }

    let source = meta.source.fields();
    if !source.is_empty() {
        lines.push("source:".to_string());
        lines.extend(source.iter().map(|(k, v)| format!("  {k}: {v}")));
    }

    if !meta.dependencies.is_empty() {
        lines.push("dependencies:".to_string());
        for dep in &meta.dependencies {
            let mut line = format!("  {}", dep.version_id);
            if let Some(name) = &dep.name {
                line.push_str(&format!(" name={name}"));
            }
            if let Some(path) = &dep.path {
                line.push_str(&format!(" path={path}"));
            }
            if dep.internal {
                line.push_str(" internal");
            }
            lines.push(line);
            lines.extend(dep.operations.iter().map(|op| format!("    {op}")));
        }
    }

    if !meta.files.is_empty() {
        lines.push("files:".to_string());
        lines.push(output::format_list(
            &meta.files.iter().map(|f| f.path.as_str()).collect::<Vec<_>>(),
            "  ",
        ));
    }

    if !meta.operations.is_empty() {
        lines.push("operations:".to_string());
        lines.push(output::format_list(&meta.operations, "  "));
    }

    if !version.statuses().is_empty() {
        lines.push("statuses:".to_string());
        lines.extend(
            version
                .statuses()
                .iter()
                .map(|s| format!("  {}={}", s.key, s.value)),
        );
    }

    if dirs {
        lines.push("directories:".to_string());
        if let Some(path) = version.metadata_path() {
            lines.push(format!("  metadata: {}", path.display()));
        }
        if let Some(path) = version.binaries_root() {
            lines.push(format!("  binaries: {}", path.display()));
        }
        for location in version.locations() {
            lines.push(format!(
                "  {}: {}",
                location.repository,
                location.directory.display()
            ));
        }
    }
    Ok(lines.join("\n"))
}
