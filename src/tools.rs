//! Tool detection and verification module
//!
//! Detects the external programs a size run depends on:
//! - the bundler (always required)
//! - git (required when the baseline is rebuilt from a branch)
//! - npm (required when the baseline is fetched from a registry)

use crate::config::BaselineStrategy;
use crate::infra::{CommandExecutor, RealCommandExecutor};
use thiserror::Error;

/// Errors that can occur during tool operations
#[derive(Error, Debug)]
pub enum ToolError {
    /// I/O error during tool execution
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tool execution failed
    #[error("Failed to get version for {0}")]
    VersionFailed(String),

    /// Required tool is missing
    #[error("Required tool missing: {0}")]
    MissingTool(String),
}

/// An external program with detection capabilities
#[derive(Debug)]
pub struct Tool<CE: CommandExecutor = RealCommandExecutor> {
    /// Human-readable name
    pub name: String,
    /// Binary name in PATH
    pub binary: String,
    /// Whether this tool is required for the current run
    pub required: bool,
    cmd_executor: CE,
}

impl<CE: CommandExecutor> Tool<CE> {
    /// Create a new Tool with a custom command executor
    pub fn with_executor(
        name: impl Into<String>,
        binary: impl Into<String>,
        required: bool,
        cmd_executor: CE,
    ) -> Self {
        Self {
            name: name.into(),
            binary: binary.into(),
            required,
            cmd_executor,
        }
    }

    /// Check if the tool is installed and available in PATH
    pub fn is_installed(&self) -> bool {
        which::which(&self.binary).is_ok()
    }

    /// Get the first line the tool prints for `--version`
    pub fn version(&self) -> Result<String, ToolError> {
        let output = self
            .cmd_executor
            .execute(|cmd| cmd.arg("--version"), &self.binary)?;

        if !output.status.success() {
            return Err(ToolError::VersionFailed(self.name.clone()));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .to_string())
    }
}

/// The programs a run needs, resolved from configuration
pub struct ToolChain<CE: CommandExecutor = RealCommandExecutor> {
    /// Bundler used to produce measured artifacts
    pub bundler: Tool<CE>,
    /// git, for materializing baseline checkouts
    pub git: Tool<CE>,
    /// npm, for fetching published baselines
    pub npm: Tool<CE>,
}

impl ToolChain<RealCommandExecutor> {
    /// Create a tool chain with real command execution
    pub fn new(bundler: &str, strategy: BaselineStrategy) -> Self {
        Self::with_executor(bundler, strategy, RealCommandExecutor)
    }
}

impl<CE: CommandExecutor + Clone> ToolChain<CE> {
    /// Create a tool chain with a custom command executor
    pub fn with_executor(bundler: &str, strategy: BaselineStrategy, cmd_executor: CE) -> Self {
        Self {
            bundler: Tool::with_executor("bundler", bundler, true, cmd_executor.clone()),
            git: Tool::with_executor(
                "git",
                "git",
                strategy == BaselineStrategy::Rebuild,
                cmd_executor.clone(),
            ),
            npm: Tool::with_executor(
                "npm",
                "npm",
                strategy == BaselineStrategy::Registry,
                cmd_executor,
            ),
        }
    }
}

impl<CE: CommandExecutor> ToolChain<CE> {
    /// Fail with the first required tool that is not installed
    pub fn check_required(&self) -> Result<(), ToolError> {
        for tool in [&self.bundler, &self.git, &self.npm] {
            if tool.required && !tool.is_installed() {
                return Err(ToolError::MissingTool(tool.binary.clone()));
            }
            if tool.required {
                match tool.version() {
                    Ok(version) => log::debug!("Found {} ({})", tool.binary, version),
                    Err(e) => log::debug!("{} is installed but {}", tool.binary, e),
                }
            }
        }
        Ok(())
    }
}
