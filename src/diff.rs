//! Size comparison between two snapshots
//!
//! Artifacts are matched by `(asset type, export name)`. Rows keep the
//! current snapshot's order; rows that exist only in the baseline are
//! appended at the end.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::snapshot::{Artifact, AssetType, SizeSnapshot};

/// A percentage change that may be unbounded
///
/// The change is unbounded when there is nothing to compare against:
/// the baseline is absent or measured zero bytes.
///
/// # Examples
///
/// ```
/// use size_diff::diff::Percent;
///
/// assert_eq!(Percent::change(110, 100), Percent::Finite(10.0));
/// assert_eq!(Percent::change(500, 0), Percent::Unbounded);
/// assert_eq!(Percent::change(110, 100).to_string(), "+10.00%");
/// assert_eq!(Percent::Unbounded.to_string(), "new");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Percent {
    /// `(current - baseline) / baseline * 100`
    Finite(f64),
    /// No baseline to divide by
    Unbounded,
}

impl Percent {
    /// Change from `baseline` to `current` bytes
    pub fn change(current: u64, baseline: u64) -> Self {
        if baseline == 0 {
            return Self::Unbounded;
        }
        Self::Finite((current as f64 - baseline as f64) / baseline as f64 * 100.0)
    }

    /// Whether this is the unbounded sentinel
    pub fn is_unbounded(self) -> bool {
        matches!(self, Self::Unbounded)
    }

    /// The finite value, if any
    pub fn finite(self) -> Option<f64> {
        match self {
            Self::Finite(p) => Some(p),
            Self::Unbounded => None,
        }
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finite(p) => write!(f, "{:+.2}%", p),
            Self::Unbounded => f.write_str("new"),
        }
    }
}

/// How a row's artifact relates to the baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    /// Present on both sides
    Matched,
    /// Only in the current build
    Added,
    /// Only in the baseline
    Removed,
}

/// One matched pair of artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffRow {
    /// Asset type of both artifacts
    pub asset: AssetType,
    /// Export name, `None` for aggregate rows
    pub export: Option<String>,
    /// Current size in bytes (0 when removed)
    pub current: u64,
    /// Baseline size in bytes (0 when added)
    pub baseline: u64,
    /// Which sides the artifact exists on
    pub status: RowStatus,
}

impl DiffRow {
    /// Byte change, negative when the artifact shrank
    pub fn delta(&self) -> i64 {
        self.current as i64 - self.baseline as i64
    }

    /// Percentage change; new artifacts are unbounded, removed ones -100%
    pub fn percent(&self) -> Percent {
        match self.status {
            RowStatus::Added => Percent::Unbounded,
            RowStatus::Matched | RowStatus::Removed => Percent::change(self.current, self.baseline),
        }
    }

    /// Whether this row is for the whole package rather than one export
    pub fn is_aggregate(&self) -> bool {
        self.export.is_none()
    }
}

/// All rows for one package plus the percentage that gates the verdict
#[derive(Debug, Clone, PartialEq)]
pub struct DiffResult {
    /// Package name
    pub package: String,
    /// Rows in current declaration order, removed rows last
    pub rows: Vec<DiffRow>,
    /// Change of the aggregate script size
    pub overall: Percent,
    /// Whether a baseline snapshot existed
    pub baseline_present: bool,
}

impl DiffResult {
    /// Rows for the whole package
    pub fn aggregate_rows(&self) -> impl Iterator<Item = &DiffRow> {
        self.rows.iter().filter(|r| r.is_aggregate())
    }

    /// Export names in row order, each once
    pub fn export_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.rows
            .iter()
            .filter_map(|r| r.export.as_deref())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// The row for `(asset, export)`, if either side had that artifact
    pub fn row(&self, asset: AssetType, export: Option<&str>) -> Option<&DiffRow> {
        self.rows
            .iter()
            .find(|r| r.asset == asset && r.export.as_deref() == export)
    }

    /// Whether a baseline existed but its aggregate script measured zero bytes
    pub fn baseline_is_empty(&self) -> bool {
        self.baseline_present && self.overall.is_unbounded()
    }
}

/// Compare `current` against `baseline` (`None` when there is no baseline)
///
/// # Examples
///
/// ```
/// use size_diff::diff::{diff, Percent};
/// use size_diff::snapshot::{Artifact, AssetType, BuildMode, SizeSnapshot};
///
/// let current = SizeSnapshot::new("pkg", BuildMode::Minified)
///     .with_artifact(Artifact::aggregate(AssetType::Script, 98_000));
/// let baseline = SizeSnapshot::new("pkg", BuildMode::Minified)
///     .with_artifact(Artifact::aggregate(AssetType::Script, 94_000));
///
/// let result = diff(&current, Some(&baseline));
/// assert_eq!(result.rows[0].delta(), 4_000);
/// assert!(matches!(result.overall, Percent::Finite(p) if (p - 4.255).abs() < 0.01));
///
/// assert_eq!(diff(&current, None).overall, Percent::Unbounded);
/// ```
pub fn diff(current: &SizeSnapshot, baseline: Option<&SizeSnapshot>) -> DiffResult {
    let empty = Vec::new();
    let baseline_artifacts = baseline.map_or(&empty, |b| &b.artifacts);

    let mut rows = Vec::with_capacity(current.artifacts.len());
    let mut matched = HashSet::new();

    for artifact in &current.artifacts {
        let key = artifact.key();
        if !matched.insert(key) {
            continue;
        }
        let counterpart = baseline_artifacts.iter().find(|b| b.key() == key);
        rows.push(DiffRow {
            asset: artifact.asset,
            export: artifact.export.clone(),
            current: artifact.bytes,
            baseline: counterpart.map_or(0, |b| b.bytes),
            status: if counterpart.is_some() {
                RowStatus::Matched
            } else {
                RowStatus::Added
            },
        });
    }

    for artifact in baseline_artifacts {
        if !matched.insert(artifact.key()) {
            continue;
        }
        rows.push(DiffRow {
            asset: artifact.asset,
            export: artifact.export.clone(),
            current: 0,
            baseline: artifact.bytes,
            status: RowStatus::Removed,
        });
    }

    let overall = match baseline {
        Some(baseline) => Percent::change(script_total(&current.artifacts), script_total(&baseline.artifacts)),
        None => Percent::Unbounded,
    };

    DiffResult {
        package: current.package.clone(),
        rows,
        overall,
        baseline_present: baseline.is_some(),
    }
}

/// Aggregate script bytes, or the sum of per-export scripts when not measured
fn script_total(artifacts: &[Artifact]) -> u64 {
    let scripts = artifacts.iter().filter(|a| a.asset == AssetType::Script);
    match scripts.clone().find(|a| a.export.is_none()) {
        Some(aggregate) => aggregate.bytes,
        None => scripts.map(|a| a.bytes).sum(),
    }
}
