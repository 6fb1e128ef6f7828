//! Error types for baseline resolution

use std::path::PathBuf;
use thiserror::Error;

use crate::builder::BuildError;
use crate::git::GitError;

/// Errors that can occur while establishing a baseline snapshot
///
/// A baseline that simply does not exist is not an error; resolvers return
/// `Ok(None)` for that.
#[derive(Error, Debug)]
pub enum BaselineError {
    /// Checking out the comparison revision failed
    #[error("Baseline checkout failed: {0}")]
    Git(#[from] GitError),

    /// Building the comparison revision failed
    #[error("Baseline build failed: {0}")]
    Build(#[from] BuildError),

    /// The install command in a fresh checkout failed
    #[error("`{command}` failed in baseline checkout: {message}")]
    Install {
        /// Command line that was run
        command: String,
        /// Captured error output
        message: String,
    },

    /// Fetching the published package failed for a reason other than 404
    #[error("Fetching {package} from the registry failed: {message}")]
    Registry {
        /// Package name
        package: String,
        /// Captured error output
        message: String,
    },

    /// A persisted snapshot could not be parsed
    #[error("Invalid snapshot file {}: {source}", path.display())]
    Corrupt {
        /// Snapshot file
        path: PathBuf,
        #[source]
        /// Parse error
        source: serde_json::Error,
    },

    /// A persisted baseline was measured from an unminified build
    #[error("{} holds unminified sizes and cannot be compared", .0.display())]
    Unminified(PathBuf),

    /// A snapshot file was already written during this run
    #[error("{} was already written during this run", .0.display())]
    AlreadyWritten(PathBuf),

    /// The run was cancelled
    #[error("Baseline cancelled")]
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

impl BaselineError {
    pub(crate) fn io(context: impl Into<String>) -> impl FnOnce(std::io::Error) -> Self {
        let context = context.into();
        move |source| Self::Io { context, source }
    }
}
