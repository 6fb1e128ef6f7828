//! Error types for artifact builds

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while producing a snapshot
#[derive(Error, Debug)]
pub enum BuildError {
    /// The entry point does not exist
    #[error("Entry point not found: {}", .0.display())]
    EntryNotFound(PathBuf),

    /// The bundler exited abnormally
    #[error("{program} exited with {}: {stderr}", .code.map_or_else(|| "a signal".to_string(), |c| format!("status {}", c)))]
    BundlerFailed {
        /// Bundler binary
        program: String,
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
        /// Captured error output
        stderr: String,
    },

    /// The bundler succeeded but emitted no script
    #[error("Bundler produced no script output in {}", .0.display())]
    NoScriptOutput(PathBuf),

    /// Per-export mode was requested but the entry declares no exports
    #[error("No named exports found in {}", .0.display())]
    NoExports(PathBuf),

    /// The run was cancelled while this build was in flight
    #[error("Build cancelled")]
    Cancelled,

    /// I/O error with context
    #[error("{context}: {source}")]
    Io {
        /// What was being done
        context: String,
        #[source]
        /// IO error source
        source: std::io::Error,
    },
}

impl BuildError {
    /// Wrap an I/O error with what was being done
    pub fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
        let context = context.into();
        move |source| Self::Io { context, source }
    }
}
