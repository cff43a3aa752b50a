//! CLI argument definitions for the release pipeline.
//!
//! Parsing lives here so the binary stays focused on orchestration.

use crate::config::Overrides;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::LevelFilter;

/// Build, verify, and package release archives for every supported target.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "release-build")]
#[command(about)]
#[command(long_about = concat!(
    "Build, verify, and package release archives for every supported target.\n\n",
    "Each enabled target is built with its cross toolchain from the packages ",
    "root, its runtime dependencies are listed, and the artifact is archived as ",
    "<base>-<version>-<triple>.tar.xz (or .zip on Windows) in the output directory.",
))]
#[command(after_help = concat!(
    "TARGET FILTERS:\n",
    "  A comma-separated list of OS names (darwin, linux, windows, android),\n",
    "  architectures (x86_64, aarch64), or full target triples.\n\n",
    "EXAMPLES:\n",
    "  Release every enabled target:\n",
    "    $ release-build --version 1.2.3\n\n",
    "  Release linux and one Windows target, continuing past failures:\n",
    "    $ release-build --targets linux,aarch64-pc-windows-msvc --continue-on-failure\n\n",
    "  Preview commands and environments without building:\n",
    "    $ release-build --dry-run",
))]
pub struct Cli {
    /// Targets to build [default: all enabled targets].
    #[arg(short, long, value_name = "FILTER")]
    pub targets: Option<String>,

    /// Release version used in archive names [default: from config or Cargo.toml].
    #[arg(long, value_name = "VERSION")]
    pub version: Option<String>,

    /// Root of the provisioned cross toolchains [default: /packages].
    #[arg(long, value_name = "DIR")]
    pub packages_root: Option<Utf8PathBuf>,

    /// Directory the archives are written to [default: release].
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<Utf8PathBuf>,

    /// Project to build [default: current directory].
    #[arg(long, value_name = "DIR")]
    pub project_root: Option<Utf8PathBuf>,

    /// Configuration file [default: <project-root>/release.toml if present].
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Keep building the remaining targets after a failure.
    #[arg(long)]
    pub continue_on_failure: bool,

    /// Show the plan and exit without building.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (failures still shown).
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

impl Cli {
    /// Return the project root, defaulting to the current directory.
    #[must_use]
    pub fn project_root(&self) -> &Utf8Path {
        self.project_root
            .as_deref()
            .unwrap_or_else(|| Utf8Path::new("."))
    }

    /// Return the values that override the configuration file.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            version: self.version.clone(),
            packages_root: self.packages_root.clone(),
            output_dir: self.output_dir.clone(),
            continue_on_failure: self.continue_on_failure,
        }
    }

    /// Return the log level for the `-v`/`-q` flags.
    #[must_use]
    pub const fn log_level(&self) -> LevelFilter {
        if self.quiet {
            return LevelFilter::Error;
        }
        match self.verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
