//! Pass/fail classification
//!
//! A package passes when its aggregate script grew by no more than the
//! tolerance, boundary included. A package with nothing to compare against
//! (unbounded change) always passes.

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_TOLERANCE_PERCENT;
use crate::diff::{DiffResult, Percent};
use crate::error::SizeDiffError;

/// Allowed growth, in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance(f64);

impl Tolerance {
    /// Create a tolerance; must be finite and non-negative
    pub fn new(percent: f64) -> Result<Self, SizeDiffError> {
        if !percent.is_finite() || percent < 0.0 {
            return Err(SizeDiffError::configuration(format!(
                "tolerance must be a finite, non-negative percentage (got {})",
                percent
            )));
        }
        Ok(Self(percent))
    }

    /// Tolerance in percent
    pub fn percent(self) -> f64 {
        self.0
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self(DEFAULT_TOLERANCE_PERCENT)
    }
}

/// Outcome for one package
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the package is within tolerance
    pub passed: bool,
    /// The percentage that produced the verdict
    pub percent: Percent,
}

/// Classify a diff against `tolerance`
///
/// # Examples
///
/// ```
/// use size_diff::cicd::threshold::{classify, Tolerance};
/// use size_diff::diff::diff;
/// use size_diff::snapshot::{Artifact, AssetType, BuildMode, SizeSnapshot};
///
/// let build = |bytes| SizeSnapshot::new("pkg", BuildMode::Minified)
///     .with_artifact(Artifact::aggregate(AssetType::Script, bytes));
///
/// let verdict = classify(&diff(&build(100_000), Some(&build(94_000))), Tolerance::default());
/// assert!(!verdict.passed);
///
/// let verdict = classify(&diff(&build(50_000), None), Tolerance::default());
/// assert!(verdict.passed);
/// ```
pub fn classify(result: &DiffResult, tolerance: Tolerance) -> Verdict {
    Verdict {
        passed: within(result.overall, tolerance),
        percent: result.overall,
    }
}

fn within(percent: Percent, tolerance: Tolerance) -> bool {
    match percent {
        Percent::Finite(p) => p <= tolerance.percent(),
        Percent::Unbounded => true,
    }
}
