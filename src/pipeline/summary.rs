//! Per-package outcomes and the aggregated exit signal

use std::collections::BTreeMap;

use crate::cicd::threshold::Verdict;
use crate::diff::DiffResult;
use crate::error::Stage;
use crate::report::TabularReport;

/// What happened to one package
#[derive(Debug, Clone, PartialEq)]
pub enum PackageOutcome {
    /// Measured and classified
    Measured {
        /// Current vs. baseline
        result: DiffResult,
        /// Pass/fail
        verdict: Verdict,
        /// Formatted table
        report: TabularReport,
    },
    /// The pipeline stopped at `stage`
    Failed {
        /// Stage that failed
        stage: Stage,
        /// Human-readable cause
        message: String,
    },
}

impl PackageOutcome {
    /// Measured and within tolerance
    pub fn passed(&self) -> bool {
        matches!(self, Self::Measured { verdict, .. } if verdict.passed)
    }
}

/// Outcomes of a run, keyed (and therefore ordered) by package name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Package name to outcome
    pub outcomes: BTreeMap<String, PackageOutcome>,
}

impl RunSummary {
    /// True when every package passed; an empty run passes
    pub fn passed(&self) -> bool {
        self.outcomes.values().all(PackageOutcome::passed)
    }

    /// Number of packages that passed
    pub fn passed_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.passed()).count()
    }

    /// Number of packages that failed or could not be measured
    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.passed_count()
    }

    /// Process exit code: 0 iff the run passed
    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }
}
