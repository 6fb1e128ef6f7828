//! Artifact builds
//!
//! [`ArtifactBuilder`] drives a [`Bundler`] against a [`BuildTarget`] and
//! measures what it emits:
//! 1. bundle the entry point once and sum the emitted bytes per asset type
//! 2. in per-export mode, bundle a one-line re-export shim per named export
//!    so each export is measured as if it were the sole entry point

pub mod bundler;
pub mod error;
pub mod exports;

pub use bundler::{BundleRequest, Bundler, CommandBundler};
pub use error::BuildError;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::cancel::CancellationToken;
use crate::infra::{FileSystem, RealFileSystem};
use crate::snapshot::{Artifact, AssetType, BuildMode, SizeSnapshot};
use crate::target::BuildTarget;

/// How deep `export * from` chains are followed
const MAX_STAR_DEPTH: usize = 8;

/// Extensions tried when resolving a relative module specifier
const SOURCE_EXTENSIONS: [&str; 6] = ["ts", "tsx", "js", "jsx", "mjs", "cjs"];

/// Builds packages and measures the output
pub struct ArtifactBuilder<B: Bundler, FS: FileSystem = RealFileSystem> {
    bundler: B,
    fs: FS,
    scratch_root: PathBuf,
}

impl<B: Bundler> ArtifactBuilder<B, RealFileSystem> {
    /// Create a builder that uses the system temp directory for scratch output
    pub fn new(bundler: B) -> Self {
        Self::with_fs(bundler, RealFileSystem, std::env::temp_dir())
    }
}

impl<B: Bundler, FS: FileSystem> ArtifactBuilder<B, FS> {
    /// Create a builder with a custom filesystem and scratch root
    pub fn with_fs(bundler: B, fs: FS, scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            bundler,
            fs,
            scratch_root: scratch_root.into(),
        }
    }

    /// Build `target` in `mode` and measure it; emitted files are discarded
    pub fn build(
        &self,
        target: &BuildTarget,
        mode: BuildMode,
        cancel: &CancellationToken,
    ) -> Result<SizeSnapshot, BuildError> {
        let scratch = ScratchDir::create(
            &self.fs,
            self.scratch_root
                .join(format!("size-diff-{}", Uuid::new_v4().simple())),
        )?;
        self.build_into(target, mode, scratch.path(), cancel)
    }

    /// Build `target` in `mode`, leaving the emitted files under `out_root`
    ///
    /// Layout: `out_root/bundle` for the aggregate build and
    /// `out_root/exports/<nnn>-<export>` for per-export builds.
    pub fn build_into(
        &self,
        target: &BuildTarget,
        mode: BuildMode,
        out_root: &Path,
        cancel: &CancellationToken,
    ) -> Result<SizeSnapshot, BuildError> {
        let entry = std::path::absolute(target.entry())
            .map_err(BuildError::io("resolving entry point"))?;
        let working_dir = std::path::absolute(target.dir())
            .map_err(BuildError::io("resolving package directory"))?;

        if self.fs.metadata(&entry).is_err() {
            return Err(BuildError::EntryNotFound(entry));
        }

        log::debug!("Building {} ({:?})", target.name(), mode);
        let mut snapshot = SizeSnapshot::new(target.name(), mode);

        let aggregate_dir = out_root.join("bundle");
        let sizes = self.bundle_and_measure(target, &entry, &working_dir, &aggregate_dir, mode, cancel)?;
        snapshot
            .artifacts
            .extend(sizes.into_iter().map(|(asset, bytes)| Artifact::aggregate(asset, bytes)));

        if !target.chunk_by_export() {
            return Ok(snapshot);
        }

        let names = self.discover_exports(&entry)?;
        if names.is_empty() {
            return Err(BuildError::NoExports(entry));
        }

        let shim_dir = out_root.join("entries");
        self.fs
            .create_dir_all(&shim_dir)
            .map_err(BuildError::io("creating export entry directory"))?;

        for (index, name) in names.iter().enumerate() {
            let slug = format!("{:03}-{}", index, sanitize(name));
            let shim = shim_dir.join(format!("{}.js", slug));
            self.fs
                .write(&shim, reexport_shim(name, &entry))
                .map_err(BuildError::io(format!("writing entry for export {}", name)))?;

            let out_dir = out_root.join("exports").join(&slug);
            let sizes = self.bundle_and_measure(target, &shim, &working_dir, &out_dir, mode, cancel)?;
            snapshot.artifacts.extend(
                sizes
                    .into_iter()
                    .map(|(asset, bytes)| Artifact::for_export(name.as_str(), asset, bytes)),
            );
        }

        Ok(snapshot)
    }

    /// Run one bundle and sum emitted bytes per asset type (script first)
    fn bundle_and_measure(
        &self,
        target: &BuildTarget,
        entry: &Path,
        working_dir: &Path,
        out_dir: &Path,
        mode: BuildMode,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<AssetType, u64>, BuildError> {
        if cancel.is_cancelled() {
            return Err(BuildError::Cancelled);
        }
        self.fs
            .create_dir_all(out_dir)
            .map_err(BuildError::io("creating output directory"))?;

        self.bundler.bundle(
            &BundleRequest {
                entry,
                out_dir,
                working_dir,
                mode,
                externals: target.externals(),
            },
            cancel,
        )?;

        let mut sizes = BTreeMap::new();
        self.measure_dir(out_dir, &mut sizes)?;
        if !sizes.contains_key(&AssetType::Script) {
            return Err(BuildError::NoScriptOutput(out_dir.to_path_buf()));
        }
        Ok(sizes)
    }

    fn measure_dir(&self, dir: &Path, sizes: &mut BTreeMap<AssetType, u64>) -> Result<(), BuildError> {
        let entries = self
            .fs
            .read_dir(dir)
            .map_err(BuildError::io(format!("reading {}", dir.display())))?;

        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            let metadata = self
                .fs
                .metadata(&path)
                .map_err(BuildError::io(format!("reading {}", path.display())))?;
            if metadata.is_dir() {
                self.measure_dir(&path, sizes)?;
            } else if let Some(asset) = AssetType::from_path(&path) {
                *sizes.entry(asset).or_insert(0) += metadata.len();
            }
        }
        Ok(())
    }

    /// Export names of the entry, following `export * from` into relative modules
    fn discover_exports(&self, entry: &Path) -> Result<Vec<String>, BuildError> {
        let mut names = Vec::new();
        let mut visited = HashSet::new();
        self.collect_exports(entry, 0, &mut names, &mut visited)?;
        Ok(names)
    }

    fn collect_exports(
        &self,
        module: &Path,
        depth: usize,
        names: &mut Vec<String>,
        visited: &mut HashSet<PathBuf>,
    ) -> Result<(), BuildError> {
        if !visited.insert(module.to_path_buf()) {
            return Ok(());
        }
        let source = self
            .fs
            .read_to_string(module)
            .map_err(BuildError::io(format!("reading {}", module.display())))?;
        let found = exports::scan_exports(&source);

        for name in found.names {
            // Only the entry's own default export is reachable through `export *`
            if (depth == 0 || name != "default") && !names.contains(&name) {
                names.push(name);
            }
        }

        if depth >= MAX_STAR_DEPTH {
            return Ok(());
        }
        for specifier in found.star_sources {
            match self.resolve_relative(module, &specifier) {
                Some(path) => self.collect_exports(&path, depth + 1, names, visited)?,
                None => log::warn!(
                    "Cannot follow `export * from \"{}\"` in {}; its names are not measured separately",
                    specifier,
                    module.display()
                ),
            }
        }
        Ok(())
    }

    fn resolve_relative(&self, from: &Path, specifier: &str) -> Option<PathBuf> {
        if !specifier.starts_with('.') {
            return None;
        }
        let base = from.parent()?.join(specifier);
        let mut candidates = vec![base.clone()];
        candidates.extend(SOURCE_EXTENSIONS.iter().map(|ext| with_appended_extension(&base, ext)));
        candidates.extend(SOURCE_EXTENSIONS.iter().map(|ext| base.join(format!("index.{}", ext))));

        candidates
            .into_iter()
            .find(|candidate| self.fs.metadata(candidate).map(|m| m.is_file()).unwrap_or(false))
    }
}

/// Source of the entry bundled for a single export
fn reexport_shim(name: &str, entry: &Path) -> String {
    let specifier = entry.display().to_string().replace('\\', "/");
    format!("export {{ {} }} from {:?};\n", name, specifier)
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn with_appended_extension(path: &Path, ext: &str) -> PathBuf {
    let mut raw = path.as_os_str().to_owned();
    raw.push(".");
    raw.push(ext);
    PathBuf::from(raw)
}

/// Scratch output directory removed when dropped
struct ScratchDir<'a, FS: FileSystem> {
    fs: &'a FS,
    path: PathBuf,
}

impl<'a, FS: FileSystem> ScratchDir<'a, FS> {
    fn create(fs: &'a FS, path: PathBuf) -> Result<Self, BuildError> {
        fs.create_dir_all(&path)
            .map_err(BuildError::io("creating scratch directory"))?;
        Ok(Self { fs, path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl<FS: FileSystem> Drop for ScratchDir<'_, FS> {
    fn drop(&mut self) {
        if let Err(e) = self.fs.remove_dir_all(&self.path) {
            log::debug!("Could not remove {}: {}", self.path.display(), e);
        }
    }
}
