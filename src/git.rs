//! Git plumbing for baseline checkouts

use std::path::{Path, PathBuf};

use crate::infra::{CommandExecutor, RealCommandExecutor};
use thiserror::Error;

/// Git operation errors
#[derive(Debug, Error)]
pub enum GitError {
    /// Git command failed with an error message
    #[error("git {command} failed: {stderr}")]
    CommandFailed {
        /// Subcommand that failed
        command: String,
        /// Captured error output
        stderr: String,
    },

    /// The directory is not inside a git repository
    #[error("{} is not inside a git repository", .0.display())]
    NotARepository(PathBuf),

    /// The requested revision does not exist
    #[error("Unknown revision '{0}'")]
    UnknownRevision(String),

    /// Git output contained invalid UTF-8
    #[error("Invalid UTF-8 in git output")]
    InvalidUtf8,

    /// IO error occurred while executing git command
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Git repository interface with dependency injection for testability
#[derive(Debug, Clone)]
pub struct GitRepository<CE: CommandExecutor = RealCommandExecutor> {
    cmd_executor: CE,
}

impl GitRepository<RealCommandExecutor> {
    /// Create a new GitRepository with real command execution
    pub fn new() -> Self {
        Self {
            cmd_executor: RealCommandExecutor,
        }
    }
}

impl Default for GitRepository<RealCommandExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<CE: CommandExecutor> GitRepository<CE> {
    /// Create a GitRepository with a custom command executor (for testing)
    pub fn with_executor(cmd_executor: CE) -> Self {
        Self { cmd_executor }
    }

    /// Path of `dir` relative to the root of its working tree (empty at the root)
    pub fn prefix(&self, dir: &Path) -> Result<PathBuf, GitError> {
        let stdout = self
            .git(dir, &["rev-parse", "--show-prefix"])
            .map_err(|e| match e {
                GitError::CommandFailed { ref stderr, .. }
                    if stderr.contains("not a git repository") =>
                {
                    GitError::NotARepository(dir.to_path_buf())
                }
                other => other,
            })?;
        Ok(PathBuf::from(stdout))
    }

    /// Check out `revision` detached into a new worktree at `path`
    ///
    /// `repo` may be any directory inside the repository.
    pub fn worktree_add(&self, repo: &Path, path: &Path, revision: &str) -> Result<(), GitError> {
        let path_arg = path.display().to_string();
        self.git(repo, &["worktree", "add", "--detach", &path_arg, revision])
            .map_err(|e| match e {
                GitError::CommandFailed { ref stderr, .. } if stderr.contains("invalid reference") => {
                    GitError::UnknownRevision(revision.to_string())
                }
                other => other,
            })?;
        Ok(())
    }

    /// Remove a worktree created by [`worktree_add`](Self::worktree_add)
    pub fn worktree_remove(&self, repo: &Path, path: &Path) -> Result<(), GitError> {
        let path_arg = path.display().to_string();
        self.git(repo, &["worktree", "remove", "--force", &path_arg])?;
        Ok(())
    }

    /// Run `git -C <dir> <args>` and return trimmed stdout
    fn git(&self, dir: &Path, args: &[&str]) -> Result<String, GitError> {
        let output = self
            .cmd_executor
            .execute(|cmd| cmd.arg("-C").arg(dir).args(args), "git")?;

        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: args.first().copied().unwrap_or_default().to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8(output.stdout)
            .map_err(|_| GitError::InvalidUtf8)?
            .trim()
            .to_string())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::infra::mock_exit_status;
    use parking_lot::Mutex;
    use std::process::{Command, Output};
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct MockCommandExecutor {
        stdout: &'static str,
        stderr: &'static str,
        code: i32,
        calls: Arc<Mutex<Vec<Vec<String>>>>,
    }

    impl CommandExecutor for MockCommandExecutor {
        fn output(&self, cmd: &mut Command) -> std::io::Result<Output> {
            self.calls.lock().push(
                cmd.get_args()
                    .map(|a| a.to_string_lossy().to_string())
                    .collect(),
            );
            Ok(Output {
                status: mock_exit_status(self.code),
                stdout: self.stdout.as_bytes().to_vec(),
                stderr: self.stderr.as_bytes().to_vec(),
            })
        }
    }

    #[test]
    fn test_prefix_trims_output() {
        let executor = MockCommandExecutor {
            stdout: "packages/button/\n",
            ..Default::default()
        };
        let repo = GitRepository::with_executor(executor.clone());
        let prefix = repo.prefix(Path::new("/home/dev/ds/packages/button")).unwrap();
        assert_eq!(prefix, PathBuf::from("packages/button"));
        assert_eq!(
            executor.calls.lock()[0],
            vec!["-C", "/home/dev/ds/packages/button", "rev-parse", "--show-prefix"]
        );
    }

    #[test]
    fn test_prefix_at_repository_root_is_empty() {
        let repo = GitRepository::with_executor(MockCommandExecutor {
            stdout: "\n",
            ..Default::default()
        });
        assert_eq!(repo.prefix(Path::new("/repo")).unwrap(), PathBuf::new());
    }

    #[test]
    fn test_prefix_outside_repository() {
        let repo = GitRepository::with_executor(MockCommandExecutor {
            stderr: "fatal: not a git repository (or any of the parent directories): .git",
            code: 128,
            ..Default::default()
        });
        let err = repo.prefix(Path::new("/tmp/x")).unwrap_err();
        assert!(matches!(err, GitError::NotARepository(_)));
    }

    #[test]
    fn test_worktree_add_is_detached() {
        let executor = MockCommandExecutor::default();
        let repo = GitRepository::with_executor(executor.clone());
        repo.worktree_add(Path::new("/repo"), Path::new("/tmp/wt"), "origin/master")
            .unwrap();

        let calls = executor.calls.lock();
        assert_eq!(
            calls[0],
            vec!["-C", "/repo", "worktree", "add", "--detach", "/tmp/wt", "origin/master"]
        );
    }

    #[test]
    fn test_worktree_add_unknown_revision() {
        let repo = GitRepository::with_executor(MockCommandExecutor {
            stderr: "fatal: invalid reference: origin/nope",
            code: 128,
            ..Default::default()
        });
        let err = repo
            .worktree_add(Path::new("/repo"), Path::new("/tmp/wt"), "origin/nope")
            .unwrap_err();
        assert!(matches!(err, GitError::UnknownRevision(r) if r == "origin/nope"));
    }

    #[test]
    fn test_worktree_remove_is_forced() {
        let executor = MockCommandExecutor::default();
        let repo = GitRepository::with_executor(executor.clone());
        repo.worktree_remove(Path::new("/repo"), Path::new("/tmp/wt")).unwrap();
        assert_eq!(
            executor.calls.lock()[0],
            vec!["-C", "/repo", "worktree", "remove", "--force", "/tmp/wt"]
        );
    }

    #[test]
    fn test_failed_command_keeps_stderr() {
        let repo = GitRepository::with_executor(MockCommandExecutor {
            stderr: "fatal: '/tmp/wt' is not a working tree\n",
            code: 128,
            ..Default::default()
        });
        let err = repo
            .worktree_remove(Path::new("/repo"), Path::new("/tmp/wt"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "git worktree failed: fatal: '/tmp/wt' is not a working tree"
        );
    }

    #[test]
    fn test_real_git_outside_repository() {
        let temp_dir = tempfile::tempdir().unwrap();
        let repo = GitRepository::new();
        // Either git is missing (Io) or the directory is not a repository
        assert!(repo.prefix(temp_dir.path()).is_err());
    }
}
