//! ui::output
//!
//! Terminal output of the `ki` commands.
//!
//! Search hits, `version-show` listings and test issue lines are data and
//! go to stdout even under `--quiet`, so scripts can read them. Progress
//! lines such as "imported my/app/3" also go to stdout but are dropped in
//! quiet mode. Warnings, `--debug` traces and the final `error:` line go to
//! stderr.

use std::fmt::Display;

/// How chatty a `ki` invocation is, from `--quiet` and `--debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Data and errors only
    Quiet,
    Normal,
    /// Also prints the resolved config and home
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags. `--quiet` wins over `--debug`.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }

    /// Filter for library logs when `RUST_LOG` is unset.
    pub fn log_level(self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Debug => "debug",
        }
    }
}

/// A progress line on stdout, e.g. the id of a committed version.
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// A result line on stdout: a search hit, a manifest row or a test issue.
pub fn data(message: impl Display) {
    println!("{}", message);
}

/// A `[debug]` line on stderr under `--debug`.
pub fn debug(message: impl Display, verbosity: Verbosity) {
    if verbosity == Verbosity::Debug {
        eprintln!("[debug] {}", message);
    }
}

/// The `error:` line printed before `ki` exits non-zero.
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// A `warning:` line on stderr, e.g. a search that matched nothing.
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// One item per line behind `prefix`, as used for dependency and
/// operation listings.
pub fn format_list<T: Display>(items: &[T], prefix: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", prefix, item))
        .collect::<Vec<_>>()
        .join("\n")
}
