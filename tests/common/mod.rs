//! Common test utilities and helpers
//!
//! This module provides shared functionality for integration tests:
//! - Package and monorepo fixtures
//! - A shell stand-in for the bundler
//! - The size-diff binary under test

pub mod fixtures;

use assert_cmd::Command;

/// Check if running in CI environment
#[allow(dead_code)]
pub fn is_ci() -> bool {
    std::env::var("CI").is_ok() || std::env::var("GITHUB_ACTIONS").is_ok()
}

/// Check if git is available for worktree tests
#[allow(dead_code)]
pub fn has_git() -> bool {
    which::which("git").is_ok()
}

/// The size-diff binary
#[allow(dead_code)]
pub fn get_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_size-diff"));
    cmd.env_remove("RUST_LOG");
    cmd
}
