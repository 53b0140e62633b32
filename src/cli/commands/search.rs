//! version-search command - Resolve queries or find components by pattern

use super::Session;
use crate::core::finder::QueryArg;
use crate::core::ops::FilePattern;
use crate::core::types::ComponentId;
use crate::engine::Context;
use crate::ui::output;
use anyhow::{bail, Result};

/// For each argument: the version it resolves to, else the components
/// matching it as a pattern.
pub fn search(ctx: &Context, queries: &[String]) -> Result<()> {
    let session = Session::open(ctx)?;
    let mut misses = 0;
    for query in queries {
        if let Some(version) = session
            .finder
            .resolve(&[QueryArg::from(query.as_str())], None)?
        {
            output::data(version.id());
            continue;
        }

        let pattern = FilePattern::new(query)?;
        let matches: Vec<ComponentId> = session
            .finder
            .components()
            .into_iter()
            .filter(|c| pattern.is_match(c.as_str()))
            .collect();
        if matches.is_empty() {
            output::warn(
                format!("'{query}' did not match any version or component"),
                session.verbosity,
            );
            misses += 1;
        } else {
            output::data(format!("Found components({}):", matches.len()));
            output::data(output::format_list(&matches, "  "));
        }
    }
    if misses == queries.len() {
        bail!("no matches");
    }
    Ok(())
}
