//! Configuration file data structures

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = ".size-diff.toml";

/// Default tolerated growth of the aggregate script, in percent
pub const DEFAULT_TOLERANCE_PERCENT: f64 = 5.0;

/// Upper bound for the default worker count
const MAX_DEFAULT_WORKERS: usize = 4;

/// size-diff configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConfigFile {
    /// Allowed growth of the aggregate script size, in percent
    pub tolerance_percent: f64,

    /// Packages measured concurrently in a monorepo
    pub workers: usize,

    /// Bundler invocation
    pub bundler: BundlerSettings,

    /// Where the comparison build comes from
    pub baseline: BaselineSettings,

    /// Output locations
    pub output: OutputSettings,

    /// Review comment posting
    pub review: ReviewSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            tolerance_percent: DEFAULT_TOLERANCE_PERCENT,
            workers: default_workers(),
            bundler: BundlerSettings::default(),
            baseline: BaselineSettings::default(),
            output: OutputSettings::default(),
            review: ReviewSettings::default(),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_DEFAULT_WORKERS)
}

impl ConfigFile {
    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if !self.tolerance_percent.is_finite() || self.tolerance_percent < 0.0 {
            anyhow::bail!(
                "tolerance-percent must be a finite, non-negative number (got {})",
                self.tolerance_percent
            );
        }
        if self.workers == 0 {
            anyhow::bail!("workers must be at least 1");
        }
        if self.bundler.program.trim().is_empty() {
            anyhow::bail!("[bundler] program must not be empty");
        }
        if self.baseline.base_ref.trim().is_empty() {
            anyhow::bail!("[baseline] base-ref must not be empty");
        }
        if matches!(&self.baseline.install_command, Some(argv) if argv.is_empty()) {
            anyhow::bail!("[baseline] install-command must name a program");
        }
        Ok(())
    }
}

/// Bundler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BundlerSettings {
    /// esbuild-compatible executable
    pub program: String,

    /// Arguments appended to every bundler invocation
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_args: Vec<String>,
}

impl Default for BundlerSettings {
    fn default() -> Self {
        Self {
            program: "esbuild".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// How the baseline snapshot is obtained
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BaselineStrategy {
    /// Check out `base-ref` into a temporary worktree and build it
    #[default]
    Rebuild,
    /// Read `bundle-master.json` written by an earlier run
    Persisted,
    /// Build the version currently published to the npm registry
    Registry,
}

/// Baseline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BaselineSettings {
    /// Baseline strategy
    pub strategy: BaselineStrategy,

    /// Revision built by the `rebuild` strategy
    pub base_ref: String,

    /// Command run in a fresh checkout before building, e.g. `["npm", "ci"]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_command: Option<Vec<String>>,

    /// npm registry used by the `registry` strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
}

impl Default for BaselineSettings {
    fn default() -> Self {
        Self {
            strategy: BaselineStrategy::default(),
            base_ref: "origin/master".to_string(),
            install_command: None,
            registry: None,
        }
    }
}

/// Output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputSettings {
    /// Directory, relative to each package, for `bundle-master.json` / `bundle-pr.json`
    pub snapshot_dir: String,

    /// Directory, relative to each package, for unminified diff builds
    pub publish_dir: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            snapshot_dir: ".".to_string(),
            publish_dir: ".".to_string(),
        }
    }
}

/// Review comment settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ReviewSettings {
    /// GitHub CLI compatible executable
    pub program: String,

    /// Pull request number or URL; the current branch's PR when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl Default for ReviewSettings {
    fn default() -> Self {
        Self {
            program: "gh".to_string(),
            target: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_default_values() {
        let config = ConfigFile::default();
        assert_eq!(config.tolerance_percent, 5.0);
        assert!(config.workers >= 1 && config.workers <= 4);
        assert_eq!(config.bundler.program, "esbuild");
        assert_eq!(config.baseline.strategy, BaselineStrategy::Rebuild);
        assert_eq!(config.baseline.base_ref, "origin/master");
        assert_eq!(config.output.snapshot_dir, ".");
        assert_eq!(config.review.program, "gh");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_parses_kebab_case_keys() {
        let config: ConfigFile = toml_edit::de::from_str(
            r#"
tolerance-percent = 2.5
workers = 2

[bundler]
extra-args = ["--target=es2019"]

[baseline]
strategy = "registry"
registry = "https://npm.example.com"
install-command = ["npm", "ci"]

[output]
snapshot-dir = ".size"
"#,
        )
        .unwrap();

        assert_eq!(config.tolerance_percent, 2.5);
        assert_eq!(config.workers, 2);
        assert_eq!(config.bundler.program, "esbuild");
        assert_eq!(config.bundler.extra_args, vec!["--target=es2019"]);
        assert_eq!(config.baseline.strategy, BaselineStrategy::Registry);
        assert_eq!(config.baseline.base_ref, "origin/master");
        assert_eq!(
            config.baseline.install_command,
            Some(vec!["npm".to_string(), "ci".to_string()])
        );
        assert_eq!(config.output.snapshot_dir, ".size");
        assert_eq!(config.output.publish_dir, ".");
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let result: Result<ConfigFile, _> = toml_edit::de::from_str("[baseline]\nstrategy = \"cache\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_negative_tolerance() {
        let config = ConfigFile {
            tolerance_percent: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_tolerance() {
        let config = ConfigFile {
            tolerance_percent: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = ConfigFile {
            workers: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn test_validate_rejects_empty_install_command() {
        let mut config = ConfigFile::default();
        config.baseline.install_command = Some(Vec::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_tolerance_is_allowed() {
        let config = ConfigFile {
            tolerance_percent: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
