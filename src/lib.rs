#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! size-diff library
//!
//! This library measures how a change affects the minified size of JavaScript
//! packages, compares it against a baseline build and classifies the result
//! against a growth tolerance. It can be used programmatically in addition to
//! the CLI interface.
//!
//! # Basic Example
//!
//! Diffing two snapshots and classifying the result:
//!
//! ```
//! use size_diff::cicd::{classify, Tolerance};
//! use size_diff::diff::{diff, Percent};
//! use size_diff::snapshot::{Artifact, AssetType, BuildMode, SizeSnapshot};
//!
//! let current = SizeSnapshot::new("@scope/button", BuildMode::Minified)
//!     .with_artifact(Artifact::aggregate(AssetType::Script, 100_000));
//! let baseline = SizeSnapshot::new("@scope/button", BuildMode::Minified)
//!     .with_artifact(Artifact::aggregate(AssetType::Script, 94_000));
//!
//! let result = diff(&current, Some(&baseline));
//! let verdict = classify(&result, Tolerance::default());
//! assert!(!verdict.passed);
//! assert!(matches!(verdict.percent, Percent::Finite(p) if p > 6.0));
//! ```
//!
//! # Advanced Example: Per-export Report
//!
//! A new export has no baseline and is reported as `new`:
//!
//! ```
//! use size_diff::diff::diff;
//! use size_diff::report::format;
//! use size_diff::snapshot::{Artifact, AssetType, BuildMode, SizeSnapshot};
//!
//! let current = SizeSnapshot::new("pkg", BuildMode::Minified)
//!     .with_artifact(Artifact::for_export("default", AssetType::Script, 1000))
//!     .with_artifact(Artifact::for_export("utils", AssetType::Script, 500));
//! let baseline = SizeSnapshot::new("pkg", BuildMode::Minified)
//!     .with_artifact(Artifact::for_export("default", AssetType::Script, 900));
//!
//! let report = format(&diff(&current, Some(&baseline)), true, false);
//! assert_eq!(report.header, vec!["name", "master", "pr", "+/-", "%"]);
//! assert_eq!(report.rows[1], vec!["utils", "0 B", "500 B", "+500 B", "new"]);
//! ```

/// Baseline resolution: persisted snapshots, git worktrees, registry tarballs
pub mod baseline;
/// Bundling and measuring build artifacts
pub mod builder;
/// Cooperative cancellation
pub mod cancel;
/// CI/CD integration tooling
pub mod cicd;
/// Command-line surface
pub mod cli;
/// Command handlers for CLI operations
pub mod cmd;
/// Configuration file and package manifest discovery
pub mod config;
/// Size comparison between two snapshots
pub mod diff;
/// Enhanced error types with contextual suggestions
pub mod error;
/// Shared formatting utilities
pub mod fmt;
/// Git worktree utilities
pub mod git;
/// Infrastructure traits for filesystem and command execution
pub mod infra;
/// Size pipeline orchestration
pub mod pipeline;
/// Unminified builds for manual diffing
pub mod publish;
/// Tables, comment bodies and report sinks
pub mod report;
/// Posting comments to a code-review system
pub mod review;
/// Measured build output
pub mod snapshot;
/// What to build
pub mod target;
/// Tool detection and version checking
pub mod tools;
