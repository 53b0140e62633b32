//! version-status command - Record statuses and status orderings
//!
//! Both writes go to the configured status repository, one locked document
//! edit each.

use super::Session;
use crate::core::metadata::StatusEntry;
use crate::core::types::ComponentId;
use crate::engine::Context;
use crate::ui::output;
use anyhow::{bail, Context as _, Result};

/// Append `key=value` (plus flags) to a version's status log.
pub fn add_status(ctx: &Context, version: &str, status: &str, flags: &[String]) -> Result<()> {
    let session = Session::open(ctx)?;
    let version = session.require(&[version.to_string()])?;

    let Some(mut entry) = StatusEntry::parse(status) else {
        bail!("status '{status}' is not key=value");
    };
    for flag in flags {
        let Some((key, value)) = flag.split_once('=') else {
            bail!("status flag '{flag}' is not key=value");
        };
        entry.flags.insert(key.to_string(), value.to_string());
    }

    let repository = session
        .home
        .ensure_repository(session.config.status_repository())?;
    repository
        .add_status(version.id(), entry.clone())
        .with_context(|| format!("Failed to add status to '{}'", version.id()))?;

    output::print(
        format!("{}: {}={}", version.id(), entry.key, entry.value),
        session.verbosity,
    );
    Ok(())
}

/// Set the ordering of a status key's values for a component.
pub fn order_status(ctx: &Context, component: &str, key: &str, values: Vec<String>) -> Result<()> {
    let session = Session::open(ctx)?;
    let id = ComponentId::new(component)?;
    if session.finder.component(id.as_str())?.is_none() {
        bail!("component '{id}' does not exist");
    }

    let repository = session
        .home
        .ensure_repository(session.config.status_repository())?;
    repository
        .set_status_order(&id, key, values.clone())
        .with_context(|| format!("Failed to set status order of '{id}'"))?;

    output::print(
        format!("{id}: {key} ordered as {}", values.join(",")),
        session.verbosity,
    );
    Ok(())
}
