//! Run command implementation
//!
//! Handles `size-diff run`: loads configuration, discovers packages, checks
//! tools and hands everything to the [`Orchestrator`].

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::baseline::{BaselineResolver, RegistryFetcher, SnapshotStore, WorktreeMaterializer};
use crate::builder::{ArtifactBuilder, CommandBundler};
use crate::cicd::{JsonOutput, Tolerance};
use crate::cli::RunArgs;
use crate::config::{self, BaselineStrategy, ConfigFile, ConfigLoader, TargetOptions, CONFIG_FILE_NAME};
use crate::error::SizeDiffError;
use crate::pipeline::{Orchestrator, RunOptions};
use crate::publish::DiffArtifactPublisher;
use crate::report::ConsoleSink;
use crate::review::CommandReviewSurface;
use crate::tools::{ToolChain, ToolError};

/// Measure and compare; returns the process exit code
///
/// # Examples
///
/// ```no_run
/// use size_diff::cli::RunArgs;
/// use size_diff::cmd::cmd_run;
///
/// let code = cmd_run(&RunArgs { ci: true, ..RunArgs::default() })?;
/// std::process::exit(code);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn cmd_run(args: &RunArgs) -> Result<i32> {
    let root = match &args.dir {
        Some(dir) => dir.clone(),
        None => env::current_dir().context("Failed to determine the working directory")?,
    };

    let mut config = ConfigLoader::load(&root)?;
    apply_overrides(&mut config, args);
    config.validate().map_err(|e| SizeDiffError::Configuration {
        message: e.to_string(),
        path: ConfigLoader::exists(&root).then(|| root.join(CONFIG_FILE_NAME)),
    })?;
    let tolerance = Tolerance::new(config.tolerance_percent)?;

    let invocation = config::discover(
        &root,
        TargetOptions {
            chunk_by_export: args.detailed,
            split_assets: args.css,
        },
    )?;
    log::debug!("Measuring {} package(s)", invocation.targets().len());

    check_tools(&config)?;
    if args.comment && which::which(&config.review.program).is_err() {
        log::warn!(
            "{} not found; the review comment will fail to post",
            config.review.program
        );
    }

    let bundler = CommandBundler::new(&config.bundler.program, config.bundler.extra_args.clone());
    let options = RunOptions {
        tolerance,
        persist: args.persist || args.diff,
        diff: args.diff,
        comment: args.comment,
        save_baseline: args.save_baseline,
        workers: config.workers,
        review_target: args.pr.clone().or_else(|| config.review.target.clone()),
    };
    let sink = Arc::new(ConsoleSink::new(args.ci).with_stderr(args.json));

    let orchestrator = Orchestrator::new(
        ArtifactBuilder::new(bundler),
        resolver(&config),
        SnapshotStore::new(&config.output.snapshot_dir),
        sink,
        options,
    )
    .with_publisher(DiffArtifactPublisher::new(&config.output.publish_dir))
    .with_review(Box::new(CommandReviewSurface::new(&config.review.program)));

    let summary = orchestrator.run_all(&invocation)?;

    if args.json {
        JsonOutput::new(&summary, tolerance).print();
    }
    Ok(summary.exit_code())
}

/// CLI flags take precedence over the configuration file
fn apply_overrides(config: &mut ConfigFile, args: &RunArgs) {
    if let Some(tolerance) = args.tolerance {
        config.tolerance_percent = tolerance;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(base_ref) = &args.base_ref {
        config.baseline.base_ref = base_ref.clone();
    }
    if let Some(registry) = &args.registry {
        config.baseline.registry = Some(registry.clone());
        if args.strategy.is_none() {
            config.baseline.strategy = BaselineStrategy::Registry;
        }
    }
    if let Some(strategy) = args.strategy {
        config.baseline.strategy = strategy;
    }
}

fn resolver(config: &ConfigFile) -> BaselineResolver {
    let baseline = &config.baseline;
    match baseline.strategy {
        BaselineStrategy::Persisted => BaselineResolver::persisted(),
        BaselineStrategy::Rebuild => BaselineResolver::rebuild(WorktreeMaterializer::new(
            &baseline.base_ref,
            baseline.install_command.clone(),
        )),
        BaselineStrategy::Registry => {
            BaselineResolver::registry(RegistryFetcher::new(baseline.registry.clone()))
        }
    }
}

fn check_tools(config: &ConfigFile) -> Result<()> {
    let toolchain = ToolChain::new(&config.bundler.program, config.baseline.strategy);
    match toolchain.check_required() {
        Ok(()) => Ok(()),
        Err(ToolError::MissingTool(tool)) => Err(SizeDiffError::ToolMissing { tool }.into()),
        Err(e) => Err(e.into()),
    }
}
