//! Unminified artifacts for manual diffing
//!
//! `--diff` writes the current and baseline builds of a package, unminified,
//! to `bundle-pr/` and `bundle-master/` so they can be compared with any diff
//! viewer. Nothing here feeds into the verdict.

use std::path::{Path, PathBuf};

use crate::baseline::BaselineResolver;
use crate::builder::{ArtifactBuilder, Bundler};
use crate::cancel::CancellationToken;
use crate::error::SizeDiffError;
use crate::infra::{CommandExecutor, FileSystem, RealFileSystem};
use crate::snapshot::BuildMode;
use crate::target::BuildTarget;

/// Directory holding the unminified current build
pub const CURRENT_DIR: &str = "bundle-pr";

/// Directory holding the unminified baseline build
pub const BASELINE_DIR: &str = "bundle-master";

/// Where a package's diff artifacts were written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifacts {
    /// Unminified current build
    pub current: PathBuf,
    /// Unminified baseline build; `None` for a package with no baseline
    pub baseline: Option<PathBuf>,
}

/// Writes unminified builds of both sides of a comparison
pub struct DiffArtifactPublisher<FS: FileSystem = RealFileSystem> {
    fs: FS,
    publish_dir: PathBuf,
}

impl DiffArtifactPublisher<RealFileSystem> {
    /// Publisher writing into `publish_dir`, relative to each package directory
    pub fn new(publish_dir: impl Into<PathBuf>) -> Self {
        Self::with_fs(publish_dir, RealFileSystem)
    }
}

impl<FS: FileSystem> DiffArtifactPublisher<FS> {
    /// Create a publisher with a custom filesystem implementation
    pub fn with_fs(publish_dir: impl Into<PathBuf>, fs: FS) -> Self {
        Self {
            fs,
            publish_dir: publish_dir.into(),
        }
    }

    /// Build both sides of `target` unminified and leave them on disk
    ///
    /// Every failure is a [`SizeDiffError::Reporting`].
    pub fn publish<B: Bundler, BFS: FileSystem, CE: CommandExecutor>(
        &self,
        target: &BuildTarget,
        builder: &ArtifactBuilder<B, BFS>,
        resolver: &BaselineResolver<CE>,
        cancel: &CancellationToken,
    ) -> Result<PublishedArtifacts, SizeDiffError> {
        let root = target.dir().join(&self.publish_dir);
        let fail = |message: String| SizeDiffError::Reporting {
            context: format!("publishing diff artifacts for {}", target.name()),
            message,
        };

        let current = root.join(CURRENT_DIR);
        self.clear(&current).map_err(&fail)?;
        builder
            .build_into(target, BuildMode::Unminified, &current, cancel)
            .map_err(|e| fail(format!("current build: {}", e)))?;

        let checkout = resolver
            .checkout(target, cancel)
            .map_err(|e| fail(format!("baseline checkout: {}", e)))?;
        let Some(checkout) = checkout else {
            log::info!("{} has no baseline; only {} was written", target.name(), CURRENT_DIR);
            return Ok(PublishedArtifacts {
                current,
                baseline: None,
            });
        };

        let baseline = root.join(BASELINE_DIR);
        self.clear(&baseline).map_err(&fail)?;
        builder
            .build_into(checkout.target(), BuildMode::Unminified, &baseline, cancel)
            .map_err(|e| fail(format!("baseline build: {}", e)))?;

        Ok(PublishedArtifacts {
            current,
            baseline: Some(baseline),
        })
    }

    /// Remove output left by an earlier run
    fn clear(&self, dir: &Path) -> Result<(), String> {
        match self.fs.remove_dir_all(dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(format!("clearing {}: {}", dir.display(), e)),
        }
    }
}
