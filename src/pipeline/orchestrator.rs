//! Multi-package orchestration
//!
//! Runs build, baseline, diff, classify and format for every target. Targets
//! are measured in parallel on a bounded worker pool; within one target the
//! current build and the baseline resolution run side by side. A failure is
//! recorded against its package and never stops the others.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;

use crate::baseline::{BaselineResolver, SnapshotKind, SnapshotStore};
use crate::builder::{ArtifactBuilder, Bundler};
use crate::cancel::CancellationToken;
use crate::cicd::threshold::{classify, Verdict};
use crate::config::BaselineStrategy;
use crate::diff::{diff, DiffResult};
use crate::error::{SizeDiffError, Stage};
use crate::infra::{CommandExecutor, FileSystem, RealCommandExecutor, RealFileSystem};
use crate::publish::DiffArtifactPublisher;
use crate::report::{format, render_comment, Event, Level, ReportSink, TabularReport};
use crate::review::ReviewSurface;
use crate::snapshot::{BuildMode, SizeSnapshot};
use crate::target::BuildTarget;

use super::config::{Invocation, RunOptions};
use super::summary::{PackageOutcome, RunSummary};

/// Printed when unminified artifacts are requested
const DIFF_WARNING: &str =
    "Bundle sizes will be larger during `--diff` because output is not minified for readability";

/// A stage failure inside one package's pipeline
struct StageFailure {
    stage: Stage,
    message: String,
}

impl StageFailure {
    fn at(stage: Stage) -> impl Fn(&dyn fmt::Display) -> Self {
        move |e: &dyn fmt::Display| Self {
            stage,
            message: e.to_string(),
        }
    }
}

/// Drives the size pipeline over every target of an [`Invocation`]
pub struct Orchestrator<B: Bundler, FS: FileSystem = RealFileSystem, CE: CommandExecutor = RealCommandExecutor>
{
    builder: ArtifactBuilder<B, FS>,
    resolver: BaselineResolver<CE>,
    store: SnapshotStore<FS>,
    sink: Arc<dyn ReportSink>,
    options: RunOptions,
    publisher: Option<DiffArtifactPublisher>,
    review: Option<Box<dyn ReviewSurface>>,
    cancel: CancellationToken,
}

impl<B, FS, CE> Orchestrator<B, FS, CE>
where
    B: Bundler,
    FS: FileSystem + Sync,
    CE: CommandExecutor + Sync,
{
    /// Create an orchestrator
    pub fn new(
        builder: ArtifactBuilder<B, FS>,
        resolver: BaselineResolver<CE>,
        store: SnapshotStore<FS>,
        sink: Arc<dyn ReportSink>,
        options: RunOptions,
    ) -> Self {
        Self {
            builder,
            resolver,
            store,
            sink,
            options,
            publisher: None,
            review: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Publisher used when `options.diff` is set
    pub fn with_publisher(mut self, publisher: DiffArtifactPublisher) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Review surface used when `options.comment` is set
    pub fn with_review(mut self, review: Box<dyn ReviewSurface>) -> Self {
        self.review = Some(review);
        self
    }

    /// Token that aborts in-flight builds when cancelled
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Measure every target and report the outcomes in package-name order
    ///
    /// Only failing to start the worker pool is an error; package failures
    /// are part of the returned summary.
    pub fn run_all(&self, invocation: &Invocation) -> Result<RunSummary, SizeDiffError> {
        let targets = invocation.targets();
        if self.options.diff {
            self.sink.notice(Level::Warning, DIFF_WARNING);
        }
        self.sink.emit(Event::RunStarted {
            packages: targets.len(),
        });

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers.max(1))
            .thread_name(|i| format!("size-diff-worker-{}", i))
            .build()
            .map_err(|e| SizeDiffError::Io {
                context: "starting worker pool".to_string(),
                source: std::io::Error::other(e),
            })?;

        let outcomes: BTreeMap<String, PackageOutcome> = pool.install(|| {
            targets
                .par_iter()
                .map(|target| (target.name().to_string(), self.measure(target)))
                .collect()
        });
        let summary = RunSummary { outcomes };

        for (package, outcome) in &summary.outcomes {
            let event = match outcome {
                PackageOutcome::Measured {
                    verdict, report, ..
                } => Event::Report {
                    package: package.clone(),
                    verdict: *verdict,
                    table: report.clone(),
                },
                PackageOutcome::Failed { stage, message } => Event::PackageFailed {
                    package: package.clone(),
                    stage: *stage,
                    message: message.clone(),
                },
            };
            self.sink.emit(event);
        }
        self.sink.emit(Event::RunFinished {
            passed: summary.passed_count(),
            failed: summary.failed_count(),
        });

        Ok(summary)
    }

    fn measure(&self, target: &BuildTarget) -> PackageOutcome {
        self.sink.emit(Event::PackageStarted {
            package: target.name().to_string(),
        });

        let outcome = match self.measure_package(target) {
            Ok(outcome) => outcome,
            Err(StageFailure { stage, message }) => {
                log::error!(
                    "{}",
                    SizeDiffError::BuildFailure {
                        package: target.name().to_string(),
                        stage,
                        message: message.clone(),
                    }
                );
                PackageOutcome::Failed { stage, message }
            }
        };

        self.sink.emit(Event::PackageFinished {
            package: target.name().to_string(),
        });
        outcome
    }

    fn measure_package(&self, target: &BuildTarget) -> Result<PackageOutcome, StageFailure> {
        let (current, baseline) = rayon::join(
            || self.builder.build(target, BuildMode::Minified, &self.cancel),
            || {
                self.resolver
                    .resolve(target, &self.builder, &self.store, &self.cancel)
            },
        );
        let current = current.map_err(|e| StageFailure::at(Stage::Build)(&e))?;
        let baseline = baseline.map_err(|e| StageFailure::at(Stage::Baseline)(&e))?;

        let result = diff(&current, baseline.as_ref());
        if result.baseline_is_empty() {
            let message = format!(
                "{}: baseline measured 0 bytes, so it is reported as new; check the baseline build",
                target.name()
            );
            log::warn!("{}", message);
            self.sink.notice(Level::Warning, &message);
        }

        let verdict = classify(&result, self.options.tolerance);
        let report = format(&result, target.chunk_by_export(), target.split_assets());
        log::debug!("{}: {} (passed: {})", target.name(), verdict.percent, verdict.passed);

        self.persist(target, &current, baseline.as_ref())?;

        if self.options.comment {
            self.post_comment(target, &result, &verdict, &report);
        }
        if self.options.diff {
            self.publish(target);
        }

        Ok(PackageOutcome::Measured {
            result,
            verdict,
            report,
        })
    }

    fn persist(
        &self,
        target: &BuildTarget,
        current: &SizeSnapshot,
        baseline: Option<&SizeSnapshot>,
    ) -> Result<(), StageFailure> {
        let fail = StageFailure::at(Stage::Persist);

        if self.options.save_baseline {
            let path = self
                .store
                .save(target, SnapshotKind::Baseline, current)
                .map_err(|e| fail(&e))?;
            self.sink.notice(
                Level::Success,
                &format!("{}: saved baseline to {}", target.name(), path.display()),
            );
        }

        if !self.options.persist {
            return Ok(());
        }
        self.store
            .save(target, SnapshotKind::Current, current)
            .map_err(|e| fail(&e))?;

        let writes_baseline = !self.options.save_baseline
            && self.resolver.strategy() != BaselineStrategy::Persisted;
        let generated = match baseline {
            Some(baseline) if writes_baseline => {
                self.store
                    .save(target, SnapshotKind::Baseline, baseline)
                    .map_err(|e| fail(&e))?;
                "`bundle-master` and `bundle-pr`"
            }
            _ => "`bundle-pr`",
        };
        self.sink.notice(
            Level::Success,
            &format!("{}: generated {}!", target.name(), generated),
        );
        Ok(())
    }

    fn post_comment(
        &self,
        target: &BuildTarget,
        result: &DiffResult,
        verdict: &Verdict,
        report: &TabularReport,
    ) {
        let Some(review) = &self.review else {
            log::warn!("Comment requested but no review surface is configured");
            return;
        };
        let body = render_comment(result, verdict, self.options.tolerance, report);
        if let Err(e) = review.post(self.options.review_target.as_deref(), &body) {
            log::warn!("{}: {}", target.name(), e);
            self.sink
                .notice(Level::Warning, &format!("{}: {}", target.name(), e));
        }
    }

    fn publish(&self, target: &BuildTarget) {
        let Some(publisher) = &self.publisher else {
            return;
        };
        match publisher.publish(target, &self.builder, &self.resolver, &self.cancel) {
            Ok(published) => {
                let mut message = format!(
                    "{}: unminified build written to {}",
                    target.name(),
                    published.current.display()
                );
                if let Some(baseline) = &published.baseline {
                    message.push_str(&format!(" and {}", baseline.display()));
                }
                self.sink.notice(Level::Success, &message);
            }
            Err(e) => {
                log::warn!("{}", e);
                self.sink.notice(Level::Warning, &e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BuildError, BundleRequest};
    use crate::report::MemorySink;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Emits the entry module unchanged, so output size equals source size
    struct CopyBundler;

    impl Bundler for CopyBundler {
        fn bundle(
            &self,
            request: &BundleRequest<'_>,
            cancel: &CancellationToken,
        ) -> Result<(), BuildError> {
            if cancel.is_cancelled() {
                return Err(BuildError::Cancelled);
            }
            fs::create_dir_all(request.out_dir).map_err(BuildError::io("creating out dir"))?;
            fs::copy(request.entry, request.out_dir.join("index.js"))
                .map_err(BuildError::io("copying entry"))?;
            Ok(())
        }
    }

    fn package(root: &Path, name: &str, bytes: usize) -> BuildTarget {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("index.js"), "x".repeat(bytes)).unwrap();
        BuildTarget::new(name, &dir, dir.join("index.js")).unwrap()
    }

    fn orchestrator(
        scratch: &Path,
        sink: Arc<MemorySink>,
        options: RunOptions,
    ) -> Orchestrator<CopyBundler, RealFileSystem, RealCommandExecutor> {
        Orchestrator::new(
            ArtifactBuilder::with_fs(CopyBundler, RealFileSystem, scratch),
            BaselineResolver::persisted(),
            SnapshotStore::new("."),
            sink,
            options,
        )
    }

    #[test]
    fn test_new_package_passes() {
        let tmp = TempDir::new().unwrap();
        let target = package(tmp.path(), "a", 500);
        let sink = Arc::new(MemorySink::new());

        let summary = orchestrator(tmp.path(), sink.clone(), RunOptions::default())
            .run_all(&Invocation::Single(target))
            .unwrap();

        assert!(summary.passed());
        let events = sink.events();
        assert_eq!(events.first(), Some(&Event::RunStarted { packages: 1 }));
        assert!(matches!(events.last(), Some(Event::RunFinished { passed: 1, failed: 0 })));
    }

    #[test]
    fn test_failure_is_isolated_to_its_package() {
        let tmp = TempDir::new().unwrap();
        let good = package(tmp.path(), "good", 100);
        let broken = BuildTarget::new("broken", tmp.path(), tmp.path().join("missing.js")).unwrap();
        let sink = Arc::new(MemorySink::new());

        let options = RunOptions {
            workers: 2,
            ..RunOptions::default()
        };
        let summary = orchestrator(tmp.path(), sink.clone(), options)
            .run_all(&Invocation::Multi(vec![good, broken]))
            .unwrap();

        assert!(summary.outcomes["good"].passed());
        assert!(matches!(
            summary.outcomes["broken"],
            PackageOutcome::Failed {
                stage: Stage::Build,
                ..
            }
        ));
        assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn test_cancelled_run_fails_every_package() {
        let tmp = TempDir::new().unwrap();
        let target = package(tmp.path(), "a", 10);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = orchestrator(tmp.path(), Arc::new(MemorySink::new()), RunOptions::default())
            .with_cancellation(cancel)
            .run_all(&Invocation::Single(target))
            .unwrap();

        assert!(matches!(summary.outcomes["a"], PackageOutcome::Failed { .. }));
    }
}
