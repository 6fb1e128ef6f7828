//! Putting the comparison revision on disk
//!
//! Two materializers produce a directory the [`ArtifactBuilder`] can build:
//! - [`WorktreeMaterializer`] checks the base ref out into a detached git worktree
//! - [`RegistryFetcher`] downloads and unpacks the published tarball
//!
//! Both hand out guards that delete the directory when dropped, and every
//! call gets its own uniquely named directory so concurrent packages never
//! share a checkout.
//!
//! [`ArtifactBuilder`]: crate::builder::ArtifactBuilder

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Command;

use flate2::read::GzDecoder;
use parking_lot::Mutex;
use serde::Deserialize;
use tar::Archive;
use uuid::Uuid;

use super::error::BaselineError;
use crate::cancel::CancellationToken;
use crate::git::GitRepository;
use crate::infra::{CommandExecutor, RealCommandExecutor};

fn unique_dir(scratch_root: &Path) -> PathBuf {
    scratch_root.join(format!("size-diff-{}", Uuid::new_v4().simple()))
}

/// Run a command, mapping cancellation and failure exits
fn run_checked<CE: CommandExecutor>(
    executor: &CE,
    cmd: &mut Command,
    cancel: &CancellationToken,
) -> Result<std::process::Output, BaselineError> {
    let program = cmd.get_program().to_string_lossy().to_string();
    match executor.output_cancellable(cmd, cancel) {
        Ok(output) => Ok(output),
        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => Err(BaselineError::Cancelled),
        Err(e) => Err(BaselineError::io(format!("running {}", program))(e)),
    }
}

/// Checks out the base ref into per-call git worktrees
pub struct WorktreeMaterializer<CE: CommandExecutor = RealCommandExecutor> {
    git: GitRepository<CE>,
    cmd_executor: CE,
    base_ref: String,
    install_command: Option<Vec<String>>,
    scratch_root: PathBuf,
    // git takes a lock on the repository's worktree list
    lock: Mutex<()>,
}

impl WorktreeMaterializer<RealCommandExecutor> {
    /// Materializer for `base_ref` using the system temp directory
    pub fn new(base_ref: impl Into<String>, install_command: Option<Vec<String>>) -> Self {
        Self::with_executor(base_ref, install_command, std::env::temp_dir(), RealCommandExecutor)
    }
}

impl<CE: CommandExecutor + Clone> WorktreeMaterializer<CE> {
    /// Create a materializer with a custom command executor
    pub fn with_executor(
        base_ref: impl Into<String>,
        install_command: Option<Vec<String>>,
        scratch_root: impl Into<PathBuf>,
        cmd_executor: CE,
    ) -> Self {
        Self {
            git: GitRepository::with_executor(cmd_executor.clone()),
            cmd_executor,
            base_ref: base_ref.into(),
            install_command,
            scratch_root: scratch_root.into(),
            lock: Mutex::new(()),
        }
    }
}

impl<CE: CommandExecutor> WorktreeMaterializer<CE> {
    /// Revision checked out
    pub fn base_ref(&self) -> &str {
        &self.base_ref
    }

    /// Check out the base ref and locate `package_dir` inside the checkout
    ///
    /// Returns the worktree guard and the package's directory within it.
    pub fn checkout(
        &self,
        package_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<(Worktree<'_, CE>, PathBuf), BaselineError> {
        if cancel.is_cancelled() {
            return Err(BaselineError::Cancelled);
        }
        let prefix = self.git.prefix(package_dir)?;
        let path = unique_dir(&self.scratch_root);

        {
            let _guard = self.lock.lock();
            log::debug!("Checking out {} into {}", self.base_ref, path.display());
            self.git.worktree_add(package_dir, &path, &self.base_ref)?;
        }
        let worktree = Worktree {
            owner: self,
            repo: package_dir.to_path_buf(),
            path,
        };

        if let Some(argv) = &self.install_command {
            self.install(argv, worktree.root(), cancel)?;
        }

        let package_dir = worktree.root().join(prefix);
        Ok((worktree, package_dir))
    }

    fn install(&self, argv: &[String], dir: &Path, cancel: &CancellationToken) -> Result<(), BaselineError> {
        let Some((program, args)) = argv.split_first() else {
            return Ok(());
        };
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(dir);

        let output = run_checked(&self.cmd_executor, &mut cmd, cancel)?;
        if !output.status.success() {
            return Err(BaselineError::Install {
                command: argv.join(" "),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// A detached worktree, removed when dropped
pub struct Worktree<'a, CE: CommandExecutor> {
    owner: &'a WorktreeMaterializer<CE>,
    repo: PathBuf,
    path: PathBuf,
}

impl<CE: CommandExecutor> Worktree<'_, CE> {
    /// Root of the checkout
    pub fn root(&self) -> &Path {
        &self.path
    }
}

impl<CE: CommandExecutor> Drop for Worktree<'_, CE> {
    fn drop(&mut self) {
        let _guard = self.owner.lock.lock();
        if let Err(e) = self.owner.git.worktree_remove(&self.repo, &self.path) {
            log::warn!("Could not remove worktree {}: {}", self.path.display(), e);
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}

#[derive(Debug, Deserialize)]
struct PackEntry {
    filename: String,
}

/// Downloads published packages with `npm pack`
pub struct RegistryFetcher<CE: CommandExecutor = RealCommandExecutor> {
    cmd_executor: CE,
    registry: Option<String>,
    scratch_root: PathBuf,
}

impl RegistryFetcher<RealCommandExecutor> {
    /// Fetcher using the default (or given) registry and the system temp directory
    pub fn new(registry: Option<String>) -> Self {
        Self::with_executor(registry, std::env::temp_dir(), RealCommandExecutor)
    }
}

impl<CE: CommandExecutor> RegistryFetcher<CE> {
    /// Create a fetcher with a custom command executor
    pub fn with_executor(
        registry: Option<String>,
        scratch_root: impl Into<PathBuf>,
        cmd_executor: CE,
    ) -> Self {
        Self {
            cmd_executor,
            registry,
            scratch_root: scratch_root.into(),
        }
    }

    /// Download and unpack the latest published `package`
    ///
    /// Returns `None` when the registry does not know the package.
    pub fn fetch(
        &self,
        package: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<UnpackedPackage>, BaselineError> {
        let scratch = unique_dir(&self.scratch_root);
        std::fs::create_dir_all(&scratch)
            .map_err(BaselineError::io(format!("creating {}", scratch.display())))?;
        let unpacked = UnpackedPackage { scratch };

        let mut pack = Command::new("npm");
        pack.arg("pack")
            .arg(package)
            .arg("--json")
            .arg("--pack-destination")
            .arg(&unpacked.scratch)
            .current_dir(&unpacked.scratch);
        if let Some(registry) = &self.registry {
            pack.arg("--registry").arg(registry);
        }

        let output = run_checked(&self.cmd_executor, &mut pack, cancel)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("E404") || stderr.contains("404 Not Found") {
                log::debug!("{} is not published yet", package);
                return Ok(None);
            }
            return Err(BaselineError::Registry {
                package: package.to_string(),
                message: stderr.trim().to_string(),
            });
        }

        let entries: Vec<PackEntry> =
            serde_json::from_slice(&output.stdout).map_err(|e| BaselineError::Registry {
                package: package.to_string(),
                message: format!("unexpected `npm pack` output: {}", e),
            })?;
        let Some(tarball) = entries.into_iter().next() else {
            return Err(BaselineError::Registry {
                package: package.to_string(),
                message: "`npm pack` produced no tarball".to_string(),
            });
        };

        let tarball = Path::new(&tarball.filename)
            .file_name()
            .map(|name| unpacked.scratch.join(name))
            .ok_or_else(|| BaselineError::Registry {
                package: package.to_string(),
                message: format!("`npm pack` reported an invalid file name '{}'", tarball.filename),
            })?;
        if cancel.is_cancelled() {
            return Err(BaselineError::Cancelled);
        }
        unpack_tarball(&tarball, &unpacked.scratch).map_err(|e| BaselineError::Registry {
            package: package.to_string(),
            message: format!("cannot unpack {}: {}", tarball.display(), e),
        })?;

        Ok(Some(unpacked))
    }
}

/// Extract a gzipped tarball into `dest`
fn unpack_tarball(tarball: &Path, dest: &Path) -> std::io::Result<()> {
    let file = File::open(tarball)?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
    archive.unpack(dest)
}

/// An unpacked registry tarball, removed when dropped
#[derive(Debug)]
pub struct UnpackedPackage {
    scratch: PathBuf,
}

impl UnpackedPackage {
    /// Package directory (npm tarballs unpack into `package/`)
    pub fn root(&self) -> PathBuf {
        self.scratch.join("package")
    }
}

impl Drop for UnpackedPackage {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.scratch) {
            log::debug!("Could not remove {}: {}", self.scratch.display(), e);
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::infra::mock_exit_status;
    use std::io;
    use std::process::Output;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Answers by program name; records every command line
    #[derive(Clone, Default)]
    struct ScriptedExecutor {
        responses: Arc<Vec<(&'static str, i32, &'static str, &'static str)>>,
        calls: Arc<Mutex<Vec<String>>>,
        // File written into `--pack-destination` by `npm pack`
        packed: Option<(&'static str, Arc<Vec<u8>>)>,
    }

    impl ScriptedExecutor {
        fn new(responses: Vec<(&'static str, i32, &'static str, &'static str)>) -> Self {
            Self {
                responses: Arc::new(responses),
                ..Self::default()
            }
        }

        fn packing(mut self, filename: &'static str, bytes: Vec<u8>) -> Self {
            self.packed = Some((filename, Arc::new(bytes)));
            self
        }
    }

    /// Gzipped tarball laid out like `npm pack` output
    fn npm_tarball(files: &[(&str, &str)]) -> Vec<u8> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, format!("package/{}", path), contents.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    impl CommandExecutor for ScriptedExecutor {
        fn output(&self, cmd: &mut Command) -> io::Result<Output> {
            let program = cmd.get_program().to_string_lossy().to_string();
            let line = std::iter::once(program.clone())
                .chain(cmd.get_args().map(|a| a.to_string_lossy().to_string()))
                .collect::<Vec<_>>()
                .join(" ");
            self.calls.lock().push(line.clone());

            if let Some((filename, bytes)) = &self.packed {
                let args: Vec<_> = cmd.get_args().collect();
                if let Some(pos) = args.iter().position(|a| *a == "--pack-destination") {
                    std::fs::write(Path::new(args[pos + 1]).join(filename), bytes.as_slice())?;
                }
            }

            let (_, code, stdout, stderr) = self
                .responses
                .iter()
                .find(|(needle, ..)| line.contains(needle))
                .copied()
                .unwrap_or(("", 0, "", ""));
            Ok(Output {
                status: mock_exit_status(code),
                stdout: stdout.as_bytes().to_vec(),
                stderr: stderr.as_bytes().to_vec(),
            })
        }
    }

    #[test]
    fn test_checkout_locates_package_and_removes_worktree() {
        let scratch = TempDir::new().unwrap();
        let executor = ScriptedExecutor::new(vec![("--show-prefix", 0, "packages/button/\n", "")]);
        let materializer = WorktreeMaterializer::with_executor(
            "origin/master",
            None,
            scratch.path(),
            executor.clone(),
        );

        {
            let (worktree, package_dir) = materializer
                .checkout(Path::new("/repo/packages/button"), &CancellationToken::new())
                .unwrap();
            assert!(worktree.root().starts_with(scratch.path()));
            assert_eq!(package_dir, worktree.root().join("packages/button"));
        }

        let calls = executor.calls.lock();
        assert_eq!(calls.len(), 3);
        assert!(calls[1].contains("worktree add --detach"));
        assert!(calls[1].ends_with("origin/master"));
        assert!(calls[2].contains("worktree remove --force"));
    }

    #[test]
    fn test_each_checkout_gets_its_own_directory() {
        let scratch = TempDir::new().unwrap();
        let materializer = WorktreeMaterializer::with_executor(
            "main",
            None,
            scratch.path(),
            ScriptedExecutor::default(),
        );
        let token = CancellationToken::new();
        let (a, _) = materializer.checkout(Path::new("/repo"), &token).unwrap();
        let (b, _) = materializer.checkout(Path::new("/repo"), &token).unwrap();
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn test_install_command_runs_in_checkout() {
        let scratch = TempDir::new().unwrap();
        let executor = ScriptedExecutor::default();
        let materializer = WorktreeMaterializer::with_executor(
            "main",
            Some(vec!["npm".to_string(), "ci".to_string()]),
            scratch.path(),
            executor.clone(),
        );
        let _checkout = materializer
            .checkout(Path::new("/repo"), &CancellationToken::new())
            .unwrap();
        assert!(executor.calls.lock().iter().any(|c| c == "npm ci"));
    }

    #[test]
    fn test_failed_install_is_reported_and_worktree_still_removed() {
        let scratch = TempDir::new().unwrap();
        let executor = ScriptedExecutor::new(vec![("npm ci", 1, "", "npm ERR! missing lockfile")]);
        let materializer = WorktreeMaterializer::with_executor(
            "main",
            Some(vec!["npm".to_string(), "ci".to_string()]),
            scratch.path(),
            executor.clone(),
        );
        let err = materializer
            .checkout(Path::new("/repo"), &CancellationToken::new())
            .err()
            .unwrap();
        assert!(matches!(err, BaselineError::Install { ref message, .. } if message.contains("lockfile")));
        assert!(executor.calls.lock().last().unwrap().contains("worktree remove"));
    }

    #[test]
    fn test_unknown_base_ref_is_a_git_error() {
        let scratch = TempDir::new().unwrap();
        let executor = ScriptedExecutor::new(vec![("worktree add", 128, "", "fatal: invalid reference: nope")]);
        let materializer = WorktreeMaterializer::with_executor("nope", None, scratch.path(), executor);
        let err = materializer
            .checkout(Path::new("/repo"), &CancellationToken::new())
            .err()
            .unwrap();
        assert!(matches!(err, BaselineError::Git(_)));
    }

    #[test]
    fn test_registry_404_is_absent() {
        let scratch = TempDir::new().unwrap();
        let executor = ScriptedExecutor::new(vec![(
            "npm pack",
            1,
            "",
            "npm ERR! code E404\nnpm ERR! 404 Not Found - GET https://registry.npmjs.org/@scope%2fnew",
        )]);
        let fetcher = RegistryFetcher::with_executor(None, scratch.path(), executor);
        let fetched = fetcher.fetch("@scope/new", &CancellationToken::new()).unwrap();
        assert!(fetched.is_none());
        // Scratch directory was cleaned up
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_registry_fetch_unpacks_tarball() {
        let scratch = TempDir::new().unwrap();
        let executor = ScriptedExecutor::new(vec![(
            "npm pack",
            0,
            r#"[{"id": "@scope/button@1.2.0", "filename": "scope-button-1.2.0.tgz"}]"#,
            "",
        )])
        .packing(
            "scope-button-1.2.0.tgz",
            npm_tarball(&[
                ("package.json", r#"{"name": "@scope/button", "version": "1.2.0"}"#),
                ("src/index.ts", "export const Button = 1;"),
            ]),
        );
        let fetcher = RegistryFetcher::with_executor(
            Some("https://npm.example.com".to_string()),
            scratch.path(),
            executor.clone(),
        );
        let unpacked = fetcher
            .fetch("@scope/button", &CancellationToken::new())
            .unwrap()
            .unwrap();
        assert!(unpacked.root().ends_with("package"));
        assert_eq!(
            std::fs::read_to_string(unpacked.root().join("src/index.ts")).unwrap(),
            "export const Button = 1;"
        );

        // Unpacking happens in-process; npm is the only command run
        let calls = executor.calls.lock();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("npm pack @scope/button --json --pack-destination"));
        assert!(calls[0].ends_with("--registry https://npm.example.com"));
    }

    #[test]
    fn test_corrupt_tarball_is_a_registry_error() {
        let scratch = TempDir::new().unwrap();
        let executor = ScriptedExecutor::new(vec![(
            "npm pack",
            0,
            r#"[{"filename": "a-1.0.0.tgz"}]"#,
            "",
        )])
        .packing("a-1.0.0.tgz", b"not a gzip stream".to_vec());
        let fetcher = RegistryFetcher::with_executor(None, scratch.path(), executor);
        let err = fetcher.fetch("a", &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, BaselineError::Registry { ref message, .. } if message.contains("cannot unpack")));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_registry_failure_other_than_404_is_an_error() {
        let scratch = TempDir::new().unwrap();
        let executor = ScriptedExecutor::new(vec![("npm pack", 1, "", "npm ERR! code ECONNREFUSED")]);
        let fetcher = RegistryFetcher::with_executor(None, scratch.path(), executor);
        let err = fetcher.fetch("a", &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, BaselineError::Registry { .. }));
    }

    #[test]
    fn test_cancelled_fetch() {
        let scratch = TempDir::new().unwrap();
        let fetcher = RegistryFetcher::with_executor(None, scratch.path(), ScriptedExecutor::default());
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            fetcher.fetch("a", &token).unwrap_err(),
            BaselineError::Cancelled
        ));
    }
}
