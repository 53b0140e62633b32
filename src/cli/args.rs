//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--home <path>`: Use this ki home instead of the configured one
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//!
//! # Dependency Operations
//!
//! `version-build -o OP` attaches to the closest `-d` before it on the
//! command line. clap does not keep that relation, so [`Cli::parse_args`]
//! recovers it from argument indices.

use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use std::path::PathBuf;

/// Ki - artifact repository for versioned build outputs
#[derive(Parser, Debug)]
#[command(name = "ki")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Ki home directory (overrides $KI_HOME and the config file)
    #[arg(long, global = true, value_name = "PATH")]
    pub home: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments, exiting on usage errors.
    pub fn parse_args() -> Self {
        match Self::from_matches(&Self::command().get_matches()) {
            Ok(cli) => cli,
            Err(e) => e.exit(),
        }
    }

    /// Parse an explicit argument list.
    pub fn try_parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::from_matches(&Self::command().try_get_matches_from(args)?)
    }

    fn from_matches(matches: &ArgMatches) -> Result<Self, clap::Error> {
        let mut cli = Self::from_arg_matches(matches)?;
        if let (Command::VersionBuild(build), Some(("version-build", sub))) =
            (&mut cli.command, matches.subcommand())
        {
            build.dependency_operation_targets = operation_targets(sub);
        }
        Ok(cli)
    }
}

/// For each `-o`, the index of the `-d` that precedes it.
fn operation_targets(matches: &ArgMatches) -> Vec<Option<usize>> {
    let deps: Vec<usize> = matches
        .indices_of("dependencies")
        .map(|i| i.collect())
        .unwrap_or_default();
    matches
        .indices_of("dependency_operations")
        .map(|ops| {
            ops.map(|op| deps.iter().rposition(|&dep| dep < op))
                .collect()
        })
        .unwrap_or_default()
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create or extend a version metadata file from a build directory
    #[command(
        name = "version-build",
        long_about = "Create or extend a version metadata file.\n\n\
            Selects files in the input directory with shell-style patterns and \
            records their size, executable bit, tags and hashes. Patterns that \
            name a directory select everything below it; `*` does not cross `/`, \
            `**` does. Running the command again merges into the existing file.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Describe every file of a build
    ki version-build out '*' --version-id my/component/23

    # Tag test binaries and depend on a library, placing it under lib/
    ki version-build out 'tests' -t tests -d my/lib/4,path=lib -o 'rm lib/*.h'"
    )]
    VersionBuild(BuildArgs),

    /// Check files against their metadata
    #[command(
        name = "version-test",
        after_help = "\
WORKFLOW EXAMPLES:
    # Test a build before importing it
    ki version-test -f out/ki-version.json -i out

    # Test a committed version and everything it depends on
    ki version-test -r my/product:maturity=beta"
    )]
    VersionTest {
        /// Test dependencies too
        #[arg(short, long)]
        recursive: bool,

        #[command(flatten)]
        source: VersionSource,
    },

    /// Commit a built version into a repository
    #[command(
        name = "version-import",
        long_about = "Commit a built version into a repository.\n\n\
            The files are tested against the metadata first; nothing is written \
            if any file is missing or modified. The version id comes from -v, \
            from -c (next integer version of a component) or from the metadata.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Import using the id in the metadata
    ki version-import -f out/ki-version.json -i out

    # Allocate the next version number and move files instead of copying
    ki version-import -f out/ki-version.json -i out -c my/component -m"
    )]
    VersionImport {
        /// Metadata file to import
        #[arg(short = 'f', long = "file", value_name = "FILE")]
        file: PathBuf,

        /// Directory holding the files
        #[arg(short = 'i', long = "input", value_name = "DIR")]
        input: PathBuf,

        /// Test dependencies too before importing
        #[arg(short = 't', long = "test-recursive")]
        test_recursive: bool,

        /// Move files instead of copying them
        #[arg(short = 'm', long = "move")]
        move_files: bool,

        /// Create the next integer version of this component
        #[arg(short = 'c', long = "create-new-version", value_name = "COMPONENT", conflicts_with = "version_id")]
        create_new_version: Option<String>,

        /// Import under this version id
        #[arg(short = 'v', long = "version-id", value_name = "ID")]
        version_id: Option<String>,

        /// Target repository (defaults to the configured import repository)
        #[arg(long, value_name = "NAME")]
        repository: Option<String>,
    },

    /// Link or copy a resolved version into a directory
    #[command(
        name = "version-export",
        after_help = "\
WORKFLOW EXAMPLES:
    # Symlink the newest stable product into ./deploy
    ki version-export -o deploy my/product:maturity=stable

    # Copy only the scripts, testing everything first
    ki version-export -o deploy -t -c my/product/23 '*.sh'"
    )]
    VersionExport {
        /// Output directory
        #[arg(short = 'o', long = "output", value_name = "DIR")]
        output: PathBuf,

        /// Only export files with one of these tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Never export files with one of these tags
        #[arg(long, value_delimiter = ',')]
        exclude_tags: Vec<String>,

        /// Test the version and its dependencies first
        #[arg(short = 't', long = "test")]
        test: bool,

        /// Copy files instead of creating symbolic links
        #[arg(short = 'c', long = "copy")]
        copy: bool,

        /// Version query
        version: String,

        /// Only export files matching these patterns
        files: Vec<String>,
    },

    /// Record statuses and status orderings
    #[command(name = "version-status")]
    VersionStatus {
        #[command(subcommand)]
        action: StatusAction,
    },

    /// Show a version's metadata
    #[command(
        name = "version-show",
        after_help = "\
WORKFLOW EXAMPLES:
    # Show the newest version of a component
    ki version-show my/product

    # Show the whole dependency tree with file locations
    ki version-show -r -d my/product/23"
    )]
    VersionShow {
        /// Show dependencies too
        #[arg(short, long)]
        recursive: bool,

        /// Show the directories the version is stored in
        #[arg(short = 'd', long = "dirs")]
        dirs: bool,

        #[command(flatten)]
        source: VersionSource,
    },

    /// Resolve queries or find components by pattern
    #[command(name = "version-search")]
    VersionSearch {
        /// Version queries or component patterns
        #[arg(required = true)]
        queries: Vec<String>,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash
    ki completion bash > ~/.local/share/bash-completion/completions/ki

    # Zsh
    ki completion zsh > ~/.zfunc/_ki"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments of `version-build`.
#[derive(clap::Args, Debug, Default)]
pub struct BuildArgs {
    /// Directory holding the built files
    pub input: PathBuf,

    /// File patterns relative to the input directory
    pub patterns: Vec<String>,

    /// Metadata file to write (default: <input>/ki-version.json)
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Version id recorded in the metadata
    #[arg(long = "version-id", value_name = "ID")]
    pub version_id: Option<String>,

    /// Tag added to every selected file
    #[arg(short = 't', long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Hash algorithms to compute (default: from config)
    #[arg(long, value_delimiter = ',', value_name = "ID")]
    pub hashes: Vec<String>,

    /// Dependency: id[,name=NAME][,path=PATH][,internal]
    #[arg(short = 'd', long = "dependency", value_name = "DEPENDENCY")]
    pub dependencies: Vec<String>,

    /// Operation on the preceding dependency, e.g. "dep-rm my/lib/.*"
    #[arg(short = 'o', long = "dependency-operation", value_name = "OP")]
    pub dependency_operations: Vec<String>,

    /// Operation on the version's own file map, e.g. "mv bin/* tools/"
    #[arg(short = 'O', long = "operation", value_name = "OP")]
    pub operations: Vec<String>,

    /// Source repository url
    #[arg(long = "source-url", value_name = "URL")]
    pub source_url: Option<String>,

    /// Url of the exact source revision
    #[arg(long = "source-tag-url", value_name = "URL")]
    pub source_tag_url: Option<String>,

    /// Author of the source revision
    #[arg(long = "source-author", value_name = "NAME")]
    pub source_author: Option<String>,

    /// Source repository type, e.g. git
    #[arg(long = "source-repotype", value_name = "TYPE")]
    pub source_repotype: Option<String>,

    /// Extra source field: key=value
    #[arg(long = "source", value_name = "KEY=VALUE")]
    pub source: Vec<String>,

    /// Index of the dependency each operation applies to
    #[arg(skip)]
    pub dependency_operation_targets: Vec<Option<usize>>,
}

/// A version given either as a query or as an unimported metadata file.
#[derive(clap::Args, Debug, Default)]
pub struct VersionSource {
    /// Metadata file outside any repository
    #[arg(short = 'f', long = "file", value_name = "FILE", requires = "input", conflicts_with = "query")]
    pub file: Option<PathBuf>,

    /// Directory holding the files of --file
    #[arg(short = 'i', long = "input", value_name = "DIR", requires = "file")]
    pub input: Option<PathBuf>,

    /// Version query
    pub query: Vec<String>,
}

/// version-status subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum StatusAction {
    /// Append a status to a version's status log
    Add {
        /// Version query
        version: String,
        /// Status as key=value
        status: String,
        /// Extra flags as key=value
        flags: Vec<String>,
    },
    /// Set the ordering of a status key's values for a component
    Order {
        /// Component id
        component: String,
        /// Status key
        key: String,
        /// Values from lowest to highest, comma separated
        #[arg(value_delimiter = ',')]
        values: Vec<String>,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
