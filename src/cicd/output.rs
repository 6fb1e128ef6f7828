//! JSON output formatting for CI/CD integration

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::diff::{DiffRow, Percent, RowStatus};
use crate::pipeline::{PackageOutcome, RunSummary};
use crate::snapshot::AssetType;

use super::threshold::Tolerance;

/// JSON output structure for CI/CD tools
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonOutput {
    /// Whether every package passed
    pub success: bool,
    /// Tolerance the verdicts were computed with
    pub tolerance_percent: f64,
    /// Per-package results, ordered by name
    pub packages: BTreeMap<String, PackageInfo>,
}

/// One package in JSON output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PackageInfo {
    /// Measured and within tolerance
    Passed {
        /// Change of the aggregate script
        percent: Percent,
        /// Every compared artifact
        rows: Vec<RowInfo>,
    },
    /// Measured and over tolerance
    Failed {
        /// Change of the aggregate script
        percent: Percent,
        /// Every compared artifact
        rows: Vec<RowInfo>,
    },
    /// Could not be measured
    Error {
        /// Stage that failed
        stage: String,
        /// Human-readable cause
        message: String,
    },
}

/// One compared artifact in JSON output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowInfo {
    /// Asset type
    pub asset: AssetType,
    /// Export name, absent for aggregate rows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<String>,
    /// Current bytes
    pub current: u64,
    /// Baseline bytes
    pub baseline: u64,
    /// Byte change
    pub delta: i64,
    /// Percentage change
    pub percent: Percent,
    /// Which sides the artifact exists on
    pub status: RowStatus,
}

impl From<&DiffRow> for RowInfo {
    fn from(row: &DiffRow) -> Self {
        Self {
            asset: row.asset,
            export: row.export.clone(),
            current: row.current,
            baseline: row.baseline,
            delta: row.delta(),
            percent: row.percent(),
            status: row.status,
        }
    }
}

impl PackageInfo {
    /// Convert from a package outcome
    pub fn from_outcome(outcome: &PackageOutcome) -> Self {
        match outcome {
            PackageOutcome::Measured {
                result, verdict, ..
            } => {
                let rows = result.rows.iter().map(RowInfo::from).collect();
                if verdict.passed {
                    Self::Passed {
                        percent: verdict.percent,
                        rows,
                    }
                } else {
                    Self::Failed {
                        percent: verdict.percent,
                        rows,
                    }
                }
            }
            PackageOutcome::Failed { stage, message } => Self::Error {
                stage: stage.to_string(),
                message: message.clone(),
            },
        }
    }
}

impl JsonOutput {
    /// Create JSON output for a finished run
    pub fn new(summary: &RunSummary, tolerance: Tolerance) -> Self {
        Self {
            success: summary.passed(),
            tolerance_percent: tolerance.percent(),
            packages: summary
                .outcomes
                .iter()
                .map(|(name, outcome)| (name.clone(), PackageInfo::from_outcome(outcome)))
                .collect(),
        }
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize JSON output: {}", e))
    }

    /// Print JSON to stdout
    pub fn print(&self) {
        match self.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error formatting JSON: {}", e),
        }
    }
}
