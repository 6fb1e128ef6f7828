//! CI/CD integration module
//!
//! Provides:
//! - Pass/fail classification against a growth tolerance
//! - JSON output for CI/CD tool integration

pub mod output;
pub mod threshold;

pub use output::JsonOutput;
pub use threshold::{classify, Tolerance, Verdict};
