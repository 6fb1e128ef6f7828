//! Review comment bodies

use std::fmt::Write as _;

use crate::cicd::threshold::{Tolerance, Verdict};
use crate::diff::{DiffResult, Percent};

use super::table::TabularReport;

/// Markdown body for a pull request comment about one package
///
/// Pure: builds a string from the diff and its verdict.
pub fn render_comment(
    result: &DiffResult,
    verdict: &Verdict,
    tolerance: Tolerance,
    table: &TabularReport,
) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "### Bundle size: `{}`\n", result.package);

    let summary = match (verdict.passed, verdict.percent) {
        (_, Percent::Unbounded) if !result.baseline_present => {
            "✅ New package, no baseline to compare against.".to_string()
        }
        (_, Percent::Unbounded) => {
            "✅ Baseline measured 0 bytes, so the change cannot be expressed as a percentage."
                .to_string()
        }
        (true, percent) => format!(
            "✅ Size changed by {} (tolerance {:.2}%).",
            percent,
            tolerance.percent()
        ),
        (false, percent) => format!(
            "❌ Size grew by {}, more than the {:.2}% tolerance.",
            percent,
            tolerance.percent()
        ),
    };
    let _ = writeln!(body, "{}\n", summary);
    body.push_str(&table.to_markdown());
    body
}
