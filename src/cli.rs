//! CLI argument definitions for the release mirror.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "RELEASE_MIRROR_CONFIG";

/// Republish calendar-versioned upstream releases under a mirror package.
#[derive(Parser, Debug)]
#[command(name = "release-mirror")]
#[command(version, about)]
#[command(long_about = concat!(
    "Republish calendar-versioned upstream releases under a mirror package.\n\n",
    "The mirror compares the versions published upstream with those already ",
    "published under the mirror package name, then downloads, repackages, and ",
    "publishes every missing version in upstream order. The mirror version is ",
    "the calendar date embedded in the upstream version.\n\n",
    "With no subcommand, `sync` runs with its defaults.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Publish every missing version:\n",
    "    $ release-mirror\n\n",
    "  Validate the publish without persisting anything:\n",
    "    $ release-mirror sync --dry-run\n\n",
    "  Show what would be published, as JSON:\n",
    "    $ release-mirror plan --json\n\n",
    "  Use a different configuration file:\n",
    "    $ release-mirror -c mirrors/ruffle.toml sync",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Sync arguments (used when no subcommand is given).
    #[command(flatten)]
    pub sync: SyncArgs,

    /// Configuration file [default: release-mirror.toml if present].
    #[arg(short, long, global = true, value_name = "FILE", env = CONFIG_ENV)]
    pub config: Option<Utf8PathBuf>,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        global = true,
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, global = true, conflicts_with = "verbosity")]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Publish every upstream version missing from the mirror (default).
    Sync(SyncArgs),

    /// Show the versions that would be published, without downloading.
    Plan(PlanArgs),
}

/// Arguments for the sync command.
#[derive(Parser, Debug, Clone, Default)]
pub struct SyncArgs {
    /// Run `npm publish --dry-run` instead of publishing.
    #[arg(long)]
    pub dry_run: bool,

    /// Manifest template overriding the configured one.
    #[arg(long, value_name = "FILE")]
    pub template: Option<Utf8PathBuf>,
}

/// Arguments for the plan command.
#[derive(Parser, Debug, Clone, Default)]
pub struct PlanArgs {
    /// Output in JSON format for scripting.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Returns the effective sync arguments.
    ///
    /// If a `Sync` subcommand was provided, returns those arguments.
    /// Otherwise returns the flattened sync arguments.
    ///
    /// # Examples
    ///
    /// ```
    /// use clap::Parser;
    /// use release_mirror::cli::Cli;
    ///
    /// let bare = Cli::parse_from(["release-mirror", "--dry-run"]);
    /// assert!(bare.sync_args().dry_run);
    ///
    /// let explicit = Cli::parse_from(["release-mirror", "sync", "--dry-run"]);
    /// assert!(explicit.sync_args().dry_run);
    /// ```
    #[must_use]
    pub fn sync_args(&self) -> &SyncArgs {
        match &self.command {
            Some(Command::Sync(args)) => args,
            Some(Command::Plan(_)) | None => &self.sync,
        }
    }

    /// Default log level for the verbosity flags.
    ///
    /// Quiet mode keeps warnings so skipped versions are still reported.
    #[must_use]
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbosity {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
