//! ki - artifact repository command line

use ki_repo::cli::{self, Cli};
use ki_repo::ui::output::{self, Verbosity};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse_args();
    init_tracing(Verbosity::from_flags(cli.quiet, cli.debug));

    if let Err(e) = cli::run(cli) {
        output::error(format!("{e:#}"));
        std::process::exit(1);
    }
}

/// Log to stderr. `RUST_LOG` overrides the level chosen by the flags.
fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
