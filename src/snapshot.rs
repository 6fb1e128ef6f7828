//! Measured build outputs
//!
//! A [`SizeSnapshot`] is the full set of [`Artifact`]s produced for one package
//! at one revision. Artifacts are keyed by asset type and, in per-export mode,
//! by export name.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Kind of emitted asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    /// JavaScript output
    Script,
    /// CSS output
    Stylesheet,
}

impl AssetType {
    /// All asset types in report column order
    pub const ALL: [AssetType; 2] = [AssetType::Script, AssetType::Stylesheet];

    /// Classify an emitted file by extension; source maps and other files are ignored
    ///
    /// ```
    /// use size_diff::snapshot::AssetType;
    /// use std::path::Path;
    ///
    /// assert_eq!(AssetType::from_path(Path::new("out/index.mjs")), Some(AssetType::Script));
    /// assert_eq!(AssetType::from_path(Path::new("out/index.css")), Some(AssetType::Stylesheet));
    /// assert_eq!(AssetType::from_path(Path::new("out/index.js.map")), None);
    /// ```
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "js" | "mjs" | "cjs" => Some(Self::Script),
            "css" => Some(Self::Stylesheet),
            _ => None,
        }
    }

    /// Short column label ("js" / "css")
    pub fn label(&self) -> &'static str {
        match self {
            Self::Script => "js",
            Self::Stylesheet => "css",
        }
    }
}

/// Build mode handed to the bundler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Production build used for every pass/fail measurement
    #[default]
    Minified,
    /// Readable output for manual diffing only
    Unminified,
}

/// One measured output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Asset type tag
    pub asset: AssetType,
    /// Export this artifact was bundled for; `None` for the aggregate build
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<String>,
    /// Size in bytes
    pub bytes: u64,
}

impl Artifact {
    /// Aggregate artifact for the whole entry point
    pub fn aggregate(asset: AssetType, bytes: u64) -> Self {
        Self {
            asset,
            export: None,
            bytes,
        }
    }

    /// Artifact for a single named export
    pub fn for_export(export: impl Into<String>, asset: AssetType, bytes: u64) -> Self {
        Self {
            asset,
            export: Some(export.into()),
            bytes,
        }
    }

    /// Matching key: asset type plus export name
    pub fn key(&self) -> (AssetType, Option<&str>) {
        (self.asset, self.export.as_deref())
    }
}

/// Every artifact for one package at one revision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeSnapshot {
    /// Package name
    pub package: String,
    /// Mode the snapshot was built in
    #[serde(default)]
    pub mode: BuildMode,
    /// Artifacts in export declaration order
    pub artifacts: Vec<Artifact>,
}

impl SizeSnapshot {
    /// Create an empty snapshot
    pub fn new(package: impl Into<String>, mode: BuildMode) -> Self {
        Self {
            package: package.into(),
            mode,
            artifacts: Vec::new(),
        }
    }

    /// Builder-style helper used when assembling snapshots by hand
    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    /// Look up an artifact by key
    pub fn get(&self, asset: AssetType, export: Option<&str>) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.key() == (asset, export))
    }

    /// Size of the aggregate artifact of the given type, if one was measured
    pub fn aggregate(&self, asset: AssetType) -> Option<u64> {
        self.get(asset, None).map(|a| a.bytes)
    }

    /// Export names in declaration order, without duplicates
    pub fn export_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for name in self.artifacts.iter().filter_map(|a| a.export.as_deref()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Whether any stylesheet output was measured
    pub fn has_stylesheet(&self) -> bool {
        self.artifacts
            .iter()
            .any(|a| a.asset == AssetType::Stylesheet)
    }
}
