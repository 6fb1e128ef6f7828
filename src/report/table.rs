//! Tabular size reports
//!
//! Every asset type gets a `master | pr | +/- | %` column group. Summary
//! mode shows one row for the whole package; detailed mode shows one row per
//! export with a leading `name` column.

use std::fmt::Write as _;

use serde::Serialize;

use crate::diff::{DiffResult, DiffRow, RowStatus};
use crate::fmt::{format_bytes, format_delta};
use crate::snapshot::AssetType;

/// Placeholder for an artifact neither side produced
const MISSING: &str = "-";

/// A rendered-to-strings report table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabularReport {
    /// Column titles
    pub header: Vec<String>,
    /// Cells, one inner vector per row
    pub rows: Vec<Vec<String>>,
}

/// Lay out `result` as a table
///
/// # Examples
///
/// ```
/// use size_diff::diff::diff;
/// use size_diff::report::table::format;
/// use size_diff::snapshot::{Artifact, AssetType, BuildMode, SizeSnapshot};
///
/// let current = SizeSnapshot::new("pkg", BuildMode::Minified)
///     .with_artifact(Artifact::aggregate(AssetType::Script, 50_000));
///
/// let report = format(&diff(&current, None), false, false);
/// assert_eq!(report.header, vec!["master", "pr", "+/-", "%"]);
/// assert_eq!(report.rows[0], vec!["0 B", "48.83 KB", "+48.83 KB", "new"]);
/// ```
pub fn format(result: &DiffResult, detailed: bool, split_by_asset: bool) -> TabularReport {
    let assets: &[AssetType] = if split_by_asset {
        &AssetType::ALL
    } else {
        &AssetType::ALL[..1]
    };

    let mut header = Vec::new();
    if detailed {
        header.push("name".to_string());
    }
    for asset in assets {
        header.extend(column_titles(*asset, split_by_asset));
    }

    let rows = if detailed {
        result
            .export_names()
            .into_iter()
            .map(|name| {
                let mut cells = vec![name.to_string()];
                for asset in assets {
                    cells.extend(cells_for(result.row(*asset, Some(name)).cloned()));
                }
                cells
            })
            .collect()
    } else {
        let cells = assets
            .iter()
            .flat_map(|asset| cells_for(summary_row(result, *asset)))
            .collect();
        vec![cells]
    };

    TabularReport { header, rows }
}

fn column_titles(asset: AssetType, split: bool) -> [String; 4] {
    if split {
        [
            format!("master: {}", asset.label()),
            format!("pr: {}", asset.label()),
            "+/-".to_string(),
            "%".to_string(),
        ]
    } else {
        ["master", "pr", "+/-", "%"].map(str::to_string)
    }
}

fn cells_for(row: Option<DiffRow>) -> [String; 4] {
    match row {
        Some(row) => [
            format_bytes(row.baseline),
            format_bytes(row.current),
            format_delta(row.delta()),
            row.percent().to_string(),
        ],
        None => [MISSING; 4].map(str::to_string),
    }
}

/// The aggregate row for `asset`, or the per-export rows summed when the
/// aggregate was not measured
fn summary_row(result: &DiffResult, asset: AssetType) -> Option<DiffRow> {
    if let Some(row) = result.row(asset, None) {
        return Some(row.clone());
    }
    let parts: Vec<&DiffRow> = result.rows.iter().filter(|r| r.asset == asset).collect();
    if parts.is_empty() {
        return None;
    }
    let status = if parts.iter().all(|r| r.status == RowStatus::Added) {
        RowStatus::Added
    } else {
        RowStatus::Matched
    };
    Some(DiffRow {
        asset,
        export: None,
        current: parts.iter().map(|r| r.current).sum(),
        baseline: parts.iter().map(|r| r.baseline).sum(),
        status,
    })
}

impl TabularReport {
    /// Column widths (in characters) over header and rows
    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.header.iter().map(|h| console::measure_text_width(h)).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(console::measure_text_width(cell));
                }
            }
        }
        widths
    }

    /// Plain-text table with aligned columns
    pub fn render(&self) -> String {
        let widths = self.widths();
        let line = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, w)| console::pad_str(cell, *w, console::Alignment::Left, None).into_owned())
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut out = String::new();
        let _ = writeln!(out, "{}", line(&self.header));
        let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
        let _ = writeln!(out, "{}", line(&rule));
        for row in &self.rows {
            let _ = writeln!(out, "{}", line(row));
        }
        out
    }

    /// GitHub-flavoured markdown table
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "| {} |", self.header.join(" | "));
        let _ = writeln!(
            out,
            "|{}|",
            self.header.iter().map(|_| " --- ").collect::<Vec<_>>().join("|")
        );
        for row in &self.rows {
            let _ = writeln!(out, "| {} |", row.join(" | "));
        }
        out
    }
}
