//! Command-line surface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use crate::config::BaselineStrategy;

/// Bundle size regression checks for JavaScript packages
///
/// size-diff builds a package (or every package of a monorepo), compares the
/// minified output against a baseline build and fails when a package grew by
/// more than the configured tolerance.
#[derive(Parser, Debug)]
#[command(name = "size-diff", author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Measure packages and compare them against their baseline
    Run(RunArgs),

    /// Write a default .size-diff.toml
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Options of `size-diff run`
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Plain output without colours or progress bars
    #[arg(long)]
    pub ci: bool,

    /// One row per named export
    #[arg(long)]
    pub detailed: bool,

    /// Report stylesheet sizes in their own columns
    #[arg(long)]
    pub css: bool,

    /// Write bundle-master.json and bundle-pr.json next to each package
    #[arg(long)]
    pub persist: bool,

    /// Also write unminified bundle-master/ and bundle-pr/ builds for diffing (implies --persist)
    #[arg(long)]
    pub diff: bool,

    /// Post the report as a pull request comment
    #[arg(long)]
    pub comment: bool,

    /// Pull request to comment on (defaults to the current branch's)
    #[arg(long, value_name = "PR", requires = "comment")]
    pub pr: Option<String>,

    /// Print a machine-readable summary to stdout
    #[arg(long)]
    pub json: bool,

    /// Store the current build as the baseline for `--strategy persisted`
    #[arg(long)]
    pub save_baseline: bool,

    /// Where the baseline comes from
    #[arg(long, value_enum)]
    pub strategy: Option<BaselineStrategy>,

    /// Revision rebuilt as the baseline
    #[arg(long, value_name = "REF")]
    pub base_ref: Option<String>,

    /// npm registry to fetch the published baseline from (implies --strategy registry)
    #[arg(long, value_name = "URL")]
    pub registry: Option<String>,

    /// Allowed growth in percent
    #[arg(long, value_name = "PERCENT")]
    pub tolerance: Option<f64>,

    /// Packages measured at the same time
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Directory to run in
    #[arg(short = 'C', long, value_name = "DIR")]
    pub dir: Option<PathBuf>,
}
