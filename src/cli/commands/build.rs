//! version-build command - Create or extend a version metadata file

use super::Session;
use crate::cli::args::BuildArgs;
use crate::core::metadata::{
    add_files, DependencyEdge, FileDefaults, Operation, VersionMetadata, METADATA_FILE,
};
use crate::core::store::JsonDocument;
use crate::core::types::VersionId;
use crate::engine::Context;
use crate::ui::output;
use anyhow::{bail, Context as _, Result};

/// Build (or merge into) a metadata file from a directory of files.
pub fn build(ctx: &Context, args: BuildArgs) -> Result<()> {
    let session = Session::open(ctx)?;
    let file = args
        .file
        .clone()
        .unwrap_or_else(|| args.input.join(METADATA_FILE));
    let document = JsonDocument::new(&file);
    let mut meta: VersionMetadata = document
        .read()
        .with_context(|| format!("Failed to read '{}'", file.display()))?
        .unwrap_or_default();

    if let Some(id) = &args.version_id {
        meta.version_id = Some(VersionId::new(id.as_str())?);
    }
    apply_source(&mut meta, &args)?;

    let hashes = if args.hashes.is_empty() {
        session.config.default_hashes()
    } else {
        args.hashes.clone()
    };
    for id in &hashes {
        session.registry.require(id)?;
    }
    let defaults = FileDefaults {
        tags: args.tags.clone(),
        hashes,
    };
    let added = if args.patterns.is_empty() {
        0
    } else {
        add_files(
            &mut meta,
            &args.input,
            &args.patterns,
            &defaults,
            &session.registry,
            Some(&file),
        )
        .with_context(|| format!("Failed to add files from '{}'", args.input.display()))?
    };

    let mut edges = args
        .dependencies
        .iter()
        .map(|text| DependencyEdge::parse(text))
        .collect::<Result<Vec<_>, _>>()?;
    for (op, target) in args
        .dependency_operations
        .iter()
        .zip(&args.dependency_operation_targets)
    {
        let Some(index) = target else {
            bail!("dependency operation '{op}' needs a preceding -d");
        };
        edges[*index].add_operation(Operation::parse(op)?);
    }
    for edge in edges {
        meta.add_dependency(edge);
    }
    for op in &args.operations {
        meta.add_operation(Operation::parse(op)?);
    }

    document
        .write(&meta)
        .with_context(|| format!("Failed to write '{}'", file.display()))?;
    output::print(
        format!(
            "{}: {} file(s) added, {} file(s) and {} dependencies in total",
            file.display(),
            added,
            meta.files.len(),
            meta.dependencies.len()
        ),
        session.verbosity,
    );
    Ok(())
}

fn apply_source(meta: &mut VersionMetadata, args: &BuildArgs) -> Result<()> {
    let named = [
        ("url", &args.source_url),
        ("tag-url", &args.source_tag_url),
        ("author", &args.source_author),
        ("repotype", &args.source_repotype),
    ];
    for (key, value) in named {
        if let Some(value) = value {
            meta.source.set(key, value.as_str());
        }
    }
    for field in &args.source {
        let Some((key, value)) = field.split_once('=') else {
            bail!("source field '{field}' is not key=value");
        };
        meta.source.set(key, value);
    }
    Ok(())
}
