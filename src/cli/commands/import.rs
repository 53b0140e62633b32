//! version-import command - Commit a built version into a repository

use std::path::PathBuf;

use super::Session;
use crate::core::types::{ComponentId, VersionId};
use crate::engine::importer::{ImportMode, ImportOptions, VersionImporter};
use crate::engine::tester::TestIssue;
use crate::engine::Context;
use crate::ui::output;
use anyhow::{Context as _, Result};

/// Arguments of `version-import`.
#[derive(Debug)]
pub struct ImportArgs {
    pub file: PathBuf,
    pub input: PathBuf,
    pub test_recursive: bool,
    pub move_files: bool,
    pub create_new_version: Option<String>,
    pub version_id: Option<String>,
    pub repository: Option<String>,
}

/// Import a metadata file and its files.
pub fn import(ctx: &Context, args: ImportArgs) -> Result<()> {
    let session = Session::open(ctx)?;
    let options = ImportOptions {
        repository: args
            .repository
            .unwrap_or_else(|| session.config.import_repository().to_string()),
        version_id: args.version_id.map(VersionId::new).transpose()?,
        create_new_version: args.create_new_version.map(ComponentId::new).transpose()?,
        mode: if args.move_files {
            ImportMode::Move
        } else {
            ImportMode::Copy
        },
        test_recursive: args.test_recursive,
    };

    let importer = VersionImporter::new(&session.home, &session.finder, &session.registry);
    let version = importer
        .import(&args.file, &args.input, &options, &mut |issue: &TestIssue| {
            output::data(issue)
        })
        .with_context(|| format!("Failed to import '{}'", args.file.display()))?;

    output::print(
        format!("Imported {} to repository '{}'", version.id(), options.repository),
        session.verbosity,
    );
    Ok(())
}
