//! version-export command - Link or copy a resolved version into a directory

use std::path::PathBuf;

use super::Session;
use crate::core::finder::QueryArg;
use crate::engine::exporter::{ExportOptions, VersionExporter};
use crate::engine::tester::TestIssue;
use crate::engine::Context;
use crate::ui::output;
use anyhow::{Context as _, Result};

/// Arguments of `version-export`.
#[derive(Debug)]
pub struct ExportArgs {
    pub output: PathBuf,
    pub tags: Vec<String>,
    pub exclude_tags: Vec<String>,
    pub test: bool,
    pub copy: bool,
    pub version: String,
    pub files: Vec<String>,
}

/// Export a version's file manifest.
pub fn export(ctx: &Context, args: ExportArgs) -> Result<()> {
    let session = Session::open(ctx)?;
    let options = ExportOptions {
        test_first: args.test,
        copy: args.copy,
        files: args.files,
        tags: args.tags,
        exclude_tags: args.exclude_tags,
    };

    let summary = VersionExporter::new(&session.finder, &session.registry)
        .export(
            &[QueryArg::from(args.version.as_str())],
            &args.output,
            &options,
            &mut |issue: &TestIssue| output::data(issue),
        )
        .with_context(|| format!("Failed to export '{}'", args.version))?;

    output::print(
        format!(
            "Exported {} file(s) of {} to {}",
            summary.files,
            summary.version.id(),
            summary.output.display()
        ),
        session.verbosity,
    );
    Ok(())
}
