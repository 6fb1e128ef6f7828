//! Size pipeline orchestration
//!
//! For every package of an [`Invocation`]:
//! 1. build the working tree (minified) and resolve the baseline, in parallel
//! 2. diff the two snapshots and classify the result against the tolerance
//! 3. format the report, then persist, comment and publish as requested
//!
//! Outcomes are collected into a [`RunSummary`] ordered by package name.

pub mod config;
pub mod orchestrator;
pub mod summary;

pub use config::{Invocation, RunOptions};
pub use orchestrator::Orchestrator;
pub use summary::{PackageOutcome, RunSummary};
