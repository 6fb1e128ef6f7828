//! Baseline resolution
//!
//! Obtains the snapshot the current build is compared against. Which source
//! is used is fixed per run by [`BaselineStrategy`]:
//! - `persisted`: read `bundle-master.json` written by an earlier run
//! - `rebuild`: check the base ref out into a fresh worktree and build it
//! - `registry`: build the version currently published to npm
//!
//! A package that has no baseline yet resolves to `Ok(None)`.

pub mod checkout;
pub mod error;
pub mod store;

pub use checkout::{RegistryFetcher, UnpackedPackage, Worktree, WorktreeMaterializer};
pub use error::BaselineError;
pub use store::{SnapshotKind, SnapshotStore};

use std::collections::BTreeSet;
use std::path::Path;

use crate::builder::{ArtifactBuilder, Bundler};
use crate::cancel::CancellationToken;
use crate::config::manifest::{self, PACKAGE_MANIFEST};
use crate::config::BaselineStrategy;
use crate::infra::{CommandExecutor, FileSystem, RealCommandExecutor, RealFileSystem};
use crate::snapshot::{BuildMode, SizeSnapshot};
use crate::target::BuildTarget;

enum Source<CE: CommandExecutor> {
    Persisted,
    Rebuild(WorktreeMaterializer<CE>),
    Registry(RegistryFetcher<CE>),
}

/// The baseline on disk, ready to build; its directory is removed on drop
pub struct BaselineCheckout<'a, CE: CommandExecutor> {
    target: BuildTarget,
    _workspace: Workspace<'a, CE>,
}

enum Workspace<'a, CE: CommandExecutor> {
    Worktree(Worktree<'a, CE>),
    Unpacked(UnpackedPackage),
}

impl<CE: CommandExecutor> BaselineCheckout<'_, CE> {
    /// The package as it exists in the baseline
    pub fn target(&self) -> &BuildTarget {
        &self.target
    }
}

/// Resolves baseline snapshots with one strategy
pub struct BaselineResolver<CE: CommandExecutor = RealCommandExecutor> {
    source: Source<CE>,
}

impl<CE: CommandExecutor> BaselineResolver<CE> {
    /// Compare against `bundle-master.json` files
    pub fn persisted() -> Self {
        Self {
            source: Source::Persisted,
        }
    }

    /// Compare against a rebuild of the base ref
    pub fn rebuild(materializer: WorktreeMaterializer<CE>) -> Self {
        Self {
            source: Source::Rebuild(materializer),
        }
    }

    /// Compare against the published package
    pub fn registry(fetcher: RegistryFetcher<CE>) -> Self {
        Self {
            source: Source::Registry(fetcher),
        }
    }

    /// Strategy in use
    pub fn strategy(&self) -> BaselineStrategy {
        match self.source {
            Source::Persisted => BaselineStrategy::Persisted,
            Source::Rebuild(_) => BaselineStrategy::Rebuild,
            Source::Registry(_) => BaselineStrategy::Registry,
        }
    }

    /// Minified baseline snapshot for `target`, `None` when there is none
    pub fn resolve<B: Bundler, FS: FileSystem>(
        &self,
        target: &BuildTarget,
        builder: &ArtifactBuilder<B, FS>,
        store: &SnapshotStore<FS>,
        cancel: &CancellationToken,
    ) -> Result<Option<SizeSnapshot>, BaselineError> {
        if let Source::Persisted = self.source {
            return store.load(target, SnapshotKind::Baseline);
        }

        let Some(checkout) = self.checkout(target, cancel)? else {
            return Ok(None);
        };
        let snapshot = builder.build(checkout.target(), BuildMode::Minified, cancel)?;
        Ok(Some(snapshot))
    }

    /// Put the baseline sources of `target` on disk
    ///
    /// Fails for the persisted strategy, which has no sources to build.
    pub fn checkout(
        &self,
        target: &BuildTarget,
        cancel: &CancellationToken,
    ) -> Result<Option<BaselineCheckout<'_, CE>>, BaselineError> {
        let (workspace, package_dir) = match &self.source {
            Source::Persisted => {
                return Err(BaselineError::io("checking out a persisted baseline")(
                    std::io::Error::new(
                        std::io::ErrorKind::Unsupported,
                        "persisted snapshots carry no sources; use the rebuild or registry strategy",
                    ),
                ))
            }
            Source::Rebuild(materializer) => {
                let (worktree, dir) = materializer.checkout(target.dir(), cancel)?;
                (Workspace::Worktree(worktree), dir)
            }
            Source::Registry(fetcher) => match fetcher.fetch(target.name(), cancel)? {
                Some(unpacked) => {
                    let dir = unpacked.root();
                    (Workspace::Unpacked(unpacked), dir)
                }
                None => return Ok(None),
            },
        };

        Ok(locate(target, &package_dir).map(|target| BaselineCheckout {
            target,
            _workspace: workspace,
        }))
    }
}

/// The baseline version of `target` found in `dir`, if the package exists there
fn locate(target: &BuildTarget, dir: &Path) -> Option<BuildTarget> {
    let fs = RealFileSystem;
    if fs.metadata(&dir.join(PACKAGE_MANIFEST)).is_err() {
        log::debug!("{} does not exist in the baseline", target.name());
        return None;
    }
    let baseline = match manifest::read_manifest(dir, &fs) {
        Ok(baseline) => baseline,
        Err(e) => {
            log::warn!("Ignoring baseline of {}: {}", target.name(), e);
            return None;
        }
    };
    let Some(entry) = manifest::entry_point(dir, &baseline, &fs) else {
        log::warn!(
            "Baseline of {} has no entry point; treating it as new",
            target.name()
        );
        return None;
    };

    let externals: BTreeSet<String> = target
        .externals()
        .iter()
        .cloned()
        .chain(baseline.dependencies.into_keys())
        .chain(baseline.peer_dependencies.into_keys())
        .collect();

    Some(
        target
            .with_location(dir.to_path_buf(), entry)
            .with_externals(externals.into_iter().collect()),
    )
}
