//! Error types with contextual suggestions
//!
//! [`SizeDiffError`] carries the failure taxonomy of a size run:
//! - configuration errors abort the whole run before anything is built
//! - build failures are fatal to one package only
//! - reporting failures are logged and never change the exit status
//!
//! # Examples
//!
//! ```
//! use size_diff::error::{SizeDiffError, Stage};
//!
//! let err = SizeDiffError::BuildFailure {
//!     package: "@scope/button".to_string(),
//!     stage: Stage::Build,
//!     message: "entry point not found".to_string(),
//! };
//! assert_eq!(err.to_string(), "@scope/button: build stage failed: entry point not found");
//! assert_eq!(err.exit_code(), 1);
//! ```

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline stage a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Building the current snapshot
    Build,
    /// Resolving or rebuilding the baseline snapshot
    Baseline,
    /// Writing persisted snapshot files
    Persist,
    /// Emitting unminified artifacts for manual diffing
    Publish,
    /// Posting the rendered report
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Build => "build",
            Self::Baseline => "baseline",
            Self::Persist => "persist",
            Self::Publish => "publish",
            Self::Report => "report",
        };
        f.write_str(name)
    }
}

/// Errors surfaced to the user by a size run
#[derive(Error, Debug)]
pub enum SizeDiffError {
    /// No resolvable package identity or entry point
    #[error("Configuration error: {message}")]
    Configuration {
        /// What is missing or invalid
        message: String,
        /// File the problem was found in, if any
        path: Option<PathBuf>,
    },

    /// Required external program is not installed
    #[error("Tool not installed: {tool}")]
    ToolMissing {
        /// Binary name
        tool: String,
    },

    /// A package's pipeline failed at a specific stage
    #[error("{package}: {stage} stage failed: {message}")]
    BuildFailure {
        /// Package that failed
        package: String,
        /// Stage that failed
        stage: Stage,
        /// Human-readable cause
        message: String,
    },

    /// Posting a comment or publishing artifacts failed
    #[error("Reporting failed ({context}): {message}")]
    Reporting {
        /// What was being reported
        context: String,
        /// Human-readable cause
        message: String,
    },

    /// Generic I/O error with context
    #[error("I/O error: {context}")]
    Io {
        /// Context about where the error occurred
        context: String,
        #[source]
        /// IO error source
        source: std::io::Error,
    },
}

impl SizeDiffError {
    /// Shorthand for a configuration error without a file
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            path: None,
        }
    }

    /// Get actionable suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Configuration { path: Some(path), .. } => Some(format!(
                "Check {} and make sure the package declares a \"name\" and an entry point",
                path.display()
            )),
            Self::Configuration { path: None, .. } => Some(
                "Run size-diff from a package directory containing package.json".to_string(),
            ),
            Self::ToolMissing { tool } => Some(format!(
                "Install {} and make sure it is on PATH, or set [bundler] program in .size-diff.toml",
                tool
            )),
            Self::BuildFailure { stage, .. } => match stage {
                Stage::Baseline => Some(
                    "Check that the base ref exists locally (git fetch) or use --strategy persisted"
                        .to_string(),
                ),
                _ => Some("Check the bundler output above and fix the build".to_string()),
            },
            Self::Reporting { .. } => None,
            Self::Io { context, .. } => Some(format!(
                "Check file permissions and that {} is accessible",
                context
            )),
        }
    }

    /// Get appropriate exit code for this error (sysexits.h conventions).
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration { .. } => 78, // EX_CONFIG
            Self::ToolMissing { .. } => 127,  // Command not found
            Self::BuildFailure { .. } => 1,
            Self::Reporting { .. } => 0, // Never affects exit status
            Self::Io { .. } => 74,       // EX_IOERR
        }
    }
}

/// Error formatter with colors and structured output
pub struct ErrorFormatter;

impl ErrorFormatter {
    /// Format error with its cause chain and suggestions
    pub fn format(error: &anyhow::Error) -> String {
        use console::style;

        let mut output = String::new();

        output.push_str(&format!("{} {}\n", style("error:").red().bold(), error));

        let mut source = error.source();
        let mut indent = 1;
        while let Some(err) = source {
            output.push_str(&format!(
                "{}{} {}\n",
                "  ".repeat(indent),
                style("caused by:").yellow(),
                err
            ));
            source = err.source();
            indent += 1;
        }

        if let Some(suggestion) = error
            .downcast_ref::<SizeDiffError>()
            .and_then(SizeDiffError::suggestion)
        {
            output.push_str(&format!(
                "\n{} {}\n",
                style("help:").cyan().bold(),
                suggestion
            ));
        }

        output
    }

    /// Get exit code from error
    pub fn exit_code(error: &anyhow::Error) -> i32 {
        match error.downcast_ref::<SizeDiffError>() {
            Some(e) if e.exit_code() != 0 => e.exit_code(),
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_exit_code() {
        let err = SizeDiffError::configuration("missing name");
        assert_eq!(err.exit_code(), 78);
        assert!(err.suggestion().unwrap().contains("package.json"));
    }

    #[test]
    fn test_configuration_error_with_path_mentions_file() {
        let err = SizeDiffError::Configuration {
            message: "missing name".to_string(),
            path: Some(PathBuf::from("packages/button/package.json")),
        };
        assert!(err
            .suggestion()
            .unwrap()
            .contains("packages/button/package.json"));
    }

    #[test]
    fn test_build_failure_names_package_and_stage() {
        let err = SizeDiffError::BuildFailure {
            package: "@scope/card".to_string(),
            stage: Stage::Baseline,
            message: "unknown revision origin/master".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("@scope/card"));
        assert!(msg.contains("baseline"));
        assert!(err.suggestion().unwrap().contains("git fetch"));
    }

    #[test]
    fn test_reporting_failure_never_fails_the_run() {
        let err = SizeDiffError::Reporting {
            context: "comment".to_string(),
            message: "gh exited with 1".to_string(),
        };
        assert_eq!(err.exit_code(), 0);
        assert_eq!(ErrorFormatter::exit_code(&anyhow::Error::new(err)), 1);
    }

    #[test]
    fn test_all_error_variants_have_exit_codes_that_fit_a_byte() {
        let errors = vec![
            SizeDiffError::configuration("x"),
            SizeDiffError::ToolMissing {
                tool: "esbuild".to_string(),
            },
            SizeDiffError::BuildFailure {
                package: "a".to_string(),
                stage: Stage::Build,
                message: "x".to_string(),
            },
            SizeDiffError::Io {
                context: "reading package.json".to_string(),
                source: std::io::Error::other("x"),
            },
        ];
        for err in errors {
            let code = err.exit_code();
            assert!(code > 0 && code < 256, "{:?} -> {}", err, code);
        }
    }

    #[test]
    fn test_formatter_includes_cause_chain_and_help() {
        let err = anyhow::Error::new(SizeDiffError::Io {
            context: "reading .size-diff.toml".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        });
        let formatted = ErrorFormatter::format(&err);
        assert!(formatted.contains("reading .size-diff.toml"));
        assert!(formatted.contains("denied"));
        assert!(formatted.contains("permissions"));
        assert_eq!(ErrorFormatter::exit_code(&err), 74);
    }

    #[test]
    fn test_formatter_handles_plain_anyhow_errors() {
        let err = anyhow::anyhow!("plain failure");
        assert!(ErrorFormatter::format(&err).contains("plain failure"));
        assert_eq!(ErrorFormatter::exit_code(&err), 1);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Persist.to_string(), "persist");
        assert_eq!(Stage::Publish.to_string(), "publish");
    }
}
