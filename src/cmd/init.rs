//! Init command implementation
//!
//! Handles `size-diff init`, which writes a `.size-diff.toml` holding every
//! default so it can be edited in place.

use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use console::style;

use crate::config::{self, ConfigFile, ConfigLoader};
use crate::fmt::{CHECKMARK, ROCKET, WARNING};

/// Write the default configuration into the current directory
///
/// # Examples
///
/// ```no_run
/// use size_diff::cmd::init::cmd_init;
///
/// cmd_init(false)?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn cmd_init(force: bool) -> Result<()> {
    let project_root = env::current_dir().context("Failed to determine the working directory")?;
    init_in(&project_root, force)
}

/// Write the default configuration into `project_root`
pub fn init_in(project_root: &Path, force: bool) -> Result<()> {
    println!("{} {} Initializing size-diff", ROCKET, style("size-diff init").bold());
    println!();

    if ConfigLoader::exists(project_root) && !force {
        println!(
            "{} Config file already exists: {}",
            WARNING,
            style(config::CONFIG_FILE_NAME).cyan()
        );
        println!("   Pass --force to overwrite it or edit it manually.");
        return Ok(());
    }

    let defaults = ConfigFile::default();
    ConfigLoader::save(&defaults, project_root)?;

    println!(
        "{} Created {}",
        CHECKMARK,
        style(config::CONFIG_FILE_NAME).cyan().bold()
    );
    println!();
    println!(
        "   tolerance: {}%   bundler: {}   baseline: {:?} ({})",
        style(defaults.tolerance_percent).green(),
        style(&defaults.bundler.program).green(),
        defaults.baseline.strategy,
        style(&defaults.baseline.base_ref).green()
    );
    println!();
    println!("   Run {} to measure your packages.", style("size-diff run").cyan());
    Ok(())
}
