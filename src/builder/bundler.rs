//! The external bundling collaborator
//!
//! A [`Bundler`] turns one entry module into files in an output directory.
//! Measuring those files is the [`ArtifactBuilder`](super::ArtifactBuilder)'s
//! job, so implementations only have to run the build.

use std::path::Path;

use crate::cancel::CancellationToken;
use crate::infra::{CommandExecutor, RealCommandExecutor};
use crate::snapshot::BuildMode;

use super::error::BuildError;

/// One bundling job
#[derive(Debug, Clone, Copy)]
pub struct BundleRequest<'a> {
    /// Entry module
    pub entry: &'a Path,
    /// Directory that receives the emitted files
    pub out_dir: &'a Path,
    /// Directory the bundler runs in (module resolution starts here)
    pub working_dir: &'a Path,
    /// Minified or readable output
    pub mode: BuildMode,
    /// Modules left out of the bundle
    pub externals: &'a [String],
}

/// Builds an entry point into an output directory
pub trait Bundler: Send + Sync {
    /// Run one build; emitted files land in `request.out_dir`
    fn bundle(
        &self,
        request: &BundleRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), BuildError>;
}

/// Drives an esbuild-compatible command line
///
/// Invocation: `<program> <entry> --bundle --format=esm --outdir=<out>
/// --log-level=warning [--minify] [--external:<name>...] [extra args]`.
#[derive(Debug, Clone)]
pub struct CommandBundler<CE: CommandExecutor = RealCommandExecutor> {
    program: String,
    extra_args: Vec<String>,
    cmd_executor: CE,
}

impl CommandBundler<RealCommandExecutor> {
    /// Create a bundler running `program` as a real child process
    pub fn new(program: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self::with_executor(program, extra_args, RealCommandExecutor)
    }
}

impl<CE: CommandExecutor> CommandBundler<CE> {
    /// Create a bundler with a custom command executor
    pub fn with_executor(program: impl Into<String>, extra_args: Vec<String>, cmd_executor: CE) -> Self {
        Self {
            program: program.into(),
            extra_args,
            cmd_executor,
        }
    }

    /// Program name
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed for a request
    pub fn args(&self, request: &BundleRequest<'_>) -> Vec<String> {
        let mut args = vec![
            request.entry.display().to_string(),
            "--bundle".to_string(),
            "--format=esm".to_string(),
            format!("--outdir={}", request.out_dir.display()),
            "--log-level=warning".to_string(),
        ];
        if request.mode == BuildMode::Minified {
            args.push("--minify".to_string());
        }
        args.extend(request.externals.iter().map(|e| format!("--external:{}", e)));
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

impl<CE: CommandExecutor + Send + Sync> Bundler for CommandBundler<CE> {
    fn bundle(
        &self,
        request: &BundleRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), BuildError> {
        let args = self.args(request);
        log::debug!("{} {}", self.program, args.join(" "));

        let mut cmd = std::process::Command::new(&self.program);
        cmd.current_dir(request.working_dir).args(&args);

        let output = match self.cmd_executor.output_cancellable(&mut cmd, cancel) {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {
                return Err(BuildError::Cancelled)
            }
            Err(e) => return Err(BuildError::io(format!("running {}", self.program))(e)),
        };

        if !output.status.success() {
            return Err(BuildError::BundlerFailed {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
