//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Opens a [`Session`] (configuration, home, finder, hash registry)
//! 2. Calls into [`crate::core`] or [`crate::engine`]
//! 3. Formats and displays output through [`crate::ui::output`]
//!
//! Handlers return `anyhow::Result`; library errors are wrapped with
//! context describing what the command was doing.

mod build;
mod completion;
mod export;
mod import;
mod search;
mod show;
mod status;

pub use build::build;
pub use completion::completion;
pub use export::export;
pub use import::import;
pub use search::search;
pub use show::show;
pub use status::{add_status, order_status};
pub use test::test;

use crate::cli::args::{Command, StatusAction};
use crate::core::config::Config;
use crate::core::finder::{QueryArg, RepositoryFinder};
use crate::core::hash::HashRegistry;
use crate::core::repository::KiHome;
use crate::engine::Context;
use crate::ui::output::{self, Verbosity};
use anyhow::{Context as _, Result};

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::VersionBuild(args) => build::build(ctx, args),
        Command::VersionTest { recursive, source } => test::test(ctx, recursive, &source),
        Command::VersionImport {
            file,
            input,
            test_recursive,
            move_files,
            create_new_version,
            version_id,
            repository,
        } => import::import(
            ctx,
            import::ImportArgs {
                file,
                input,
                test_recursive,
                move_files,
                create_new_version,
                version_id,
                repository,
            },
        ),
        Command::VersionExport {
            output,
            tags,
            exclude_tags,
            test,
            copy,
            version,
            files,
        } => export::export(
            ctx,
            export::ExportArgs {
                output,
                tags,
                exclude_tags,
                test,
                copy,
                version,
                files,
            },
        ),
        Command::VersionStatus { action } => match action {
            StatusAction::Add {
                version,
                status,
                flags,
            } => status::add_status(ctx, &version, &status, &flags),
            StatusAction::Order {
                component,
                key,
                values,
            } => status::order_status(ctx, &component, &key, values),
        },
        Command::VersionShow {
            recursive,
            dirs,
            source,
        } => show::show(ctx, recursive, dirs, &source),
        Command::VersionSearch { queries } => search::search(ctx, &queries),
        Command::Completion { shell } => completion::completion(shell),
    }
}

/// Everything a command needs to talk to a ki home.
pub(crate) struct Session {
    pub config: Config,
    pub home: KiHome,
    pub finder: RepositoryFinder,
    pub registry: HashRegistry,
    pub verbosity: Verbosity,
}

impl Session {
    pub fn open(ctx: &Context) -> Result<Self> {
        let config = Config::load(ctx.home.as_deref()).context("Failed to load configuration")?;
        let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
        if let Some(path) = config.global_config_loaded_from() {
            output::debug(format!("config: {}", path.display()), verbosity);
        }
        let home = KiHome::from_config(&config);
        output::debug(format!("home: {}", home.path().display()), verbosity);
        let finder = RepositoryFinder::new(&home)
            .with_context(|| format!("Failed to read ki home '{}'", home.path().display()))?;
        Ok(Self {
            config,
            home,
            finder,
            registry: HashRegistry::with_defaults(),
            verbosity,
        })
    }

    /// Resolve command-line query words to one version.
    pub fn require(&self, query: &[String]) -> Result<std::rc::Rc<crate::core::model::Version>> {
        let args: Vec<QueryArg> = query.iter().map(|q| QueryArg::from(q.as_str())).collect();
        self.finder
            .resolve(&args, None)?
            .with_context(|| format!("Could not find version for '{}'", query.join(" ")))
    }
}
