//! Posting reports to a code-review system

use std::path::PathBuf;

use uuid::Uuid;

use crate::error::SizeDiffError;
use crate::infra::{CommandExecutor, FileSystem, RealCommandExecutor, RealFileSystem};

/// Accepts rendered comment bodies
pub trait ReviewSurface: Send + Sync {
    /// Post `body` to `target` (a pull request number or URL); `None` lets the
    /// surface pick the pull request of the current branch
    fn post(&self, target: Option<&str>, body: &str) -> Result<(), SizeDiffError>;
}

/// Posts comments through a `gh`-compatible CLI
///
/// Runs `<program> pr comment [target] --body-file <file>`.
pub struct CommandReviewSurface<
    CE: CommandExecutor = RealCommandExecutor,
    FS: FileSystem = RealFileSystem,
> {
    program: String,
    cmd_executor: CE,
    fs: FS,
    scratch_root: PathBuf,
}

impl CommandReviewSurface<RealCommandExecutor, RealFileSystem> {
    /// Surface driving `program`
    pub fn new(program: impl Into<String>) -> Self {
        Self::with_executor(program, RealCommandExecutor, RealFileSystem, std::env::temp_dir())
    }
}

impl<CE: CommandExecutor, FS: FileSystem> CommandReviewSurface<CE, FS> {
    /// Surface with custom executor, filesystem and scratch directory
    pub fn with_executor(
        program: impl Into<String>,
        cmd_executor: CE,
        fs: FS,
        scratch_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            cmd_executor,
            fs,
            scratch_root: scratch_root.into(),
        }
    }

    fn failure(message: impl Into<String>) -> SizeDiffError {
        SizeDiffError::Reporting {
            context: "posting review comment".to_string(),
            message: message.into(),
        }
    }
}

impl<CE, FS> ReviewSurface for CommandReviewSurface<CE, FS>
where
    CE: CommandExecutor + Send + Sync,
    FS: FileSystem + Send + Sync,
{
    fn post(&self, target: Option<&str>, body: &str) -> Result<(), SizeDiffError> {
        let dir = self
            .scratch_root
            .join(format!("size-diff-comment-{}", Uuid::new_v4().simple()));
        let body_file = dir.join("comment.md");

        self.fs
            .create_dir_all(&dir)
            .and_then(|_| self.fs.write(&body_file, body))
            .map_err(|e| Self::failure(format!("writing comment body: {}", e)))?;

        let result = self.cmd_executor.execute(
            |cmd| {
                cmd.arg("pr").arg("comment");
                if let Some(target) = target {
                    cmd.arg(target);
                }
                cmd.arg("--body-file").arg(&body_file)
            },
            &self.program,
        );
        let _ = self.fs.remove_dir_all(&dir);

        let output = result.map_err(|e| Self::failure(format!("running {}: {}", self.program, e)))?;
        if !output.status.success() {
            return Err(Self::failure(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        log::debug!("Posted review comment via {}", self.program);
        Ok(())
    }
}
