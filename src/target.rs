//! What to build for one package

use std::path::{Path, PathBuf};

use crate::error::SizeDiffError;

/// Identifies one package measurement. Immutable once constructed.
///
/// # Examples
///
/// ```
/// use size_diff::target::BuildTarget;
///
/// let target = BuildTarget::new("@scope/button", "packages/button", "packages/button/src/index.ts")?
///     .with_chunk_by_export(true)
///     .with_externals(vec!["react".to_string()]);
///
/// assert_eq!(target.name(), "@scope/button");
/// assert!(target.chunk_by_export());
/// assert!(BuildTarget::new("", ".", "index.js").is_err());
/// # Ok::<(), size_diff::error::SizeDiffError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    name: String,
    dir: PathBuf,
    entry: PathBuf,
    chunk_by_export: bool,
    split_assets: bool,
    externals: Vec<String>,
}

impl BuildTarget {
    /// Create a target; the package name is required
    pub fn new(
        name: impl Into<String>,
        dir: impl Into<PathBuf>,
        entry: impl Into<PathBuf>,
    ) -> Result<Self, SizeDiffError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SizeDiffError::configuration(
                "package name is required to measure a bundle",
            ));
        }
        Ok(Self {
            name,
            dir: dir.into(),
            entry: entry.into(),
            chunk_by_export: false,
            split_assets: false,
            externals: Vec::new(),
        })
    }

    /// Bundle each named export separately
    pub fn with_chunk_by_export(mut self, chunk: bool) -> Self {
        self.chunk_by_export = chunk;
        self
    }

    /// Report script and stylesheet sizes in separate columns
    pub fn with_split_assets(mut self, split: bool) -> Self {
        self.split_assets = split;
        self
    }

    /// Module names the bundler must leave external
    pub fn with_externals(mut self, externals: Vec<String>) -> Self {
        self.externals = externals;
        self
    }

    /// Package name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Package directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Entry point file
    pub fn entry(&self) -> &Path {
        &self.entry
    }

    /// Whether per-export artifacts are produced
    pub fn chunk_by_export(&self) -> bool {
        self.chunk_by_export
    }

    /// Whether stylesheet sizes get their own columns
    pub fn split_assets(&self) -> bool {
        self.split_assets
    }

    /// Externalized module names
    pub fn externals(&self) -> &[String] {
        &self.externals
    }

    /// Same package built from another directory, such as a baseline checkout
    pub fn with_location(&self, dir: PathBuf, entry: PathBuf) -> Self {
        Self {
            dir,
            entry,
            ..self.clone()
        }
    }
}
