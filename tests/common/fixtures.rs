//! Test fixture helpers for creating JavaScript packages
//!
//! Provides utilities for setting up single packages and monorepos with a
//! `package.json`, an entry module and a fake bundler on disk.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Re-export anyhow for convenience
pub use anyhow;

/// Bundler stand-in that copies the entry module into `--outdir`, so the
/// measured size is the size of the entry source
const FAKE_BUNDLER: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
  echo "0.0.0-fake"
  exit 0
fi
entry="$1"
out=""
for arg in "$@"; do
  case "$arg" in
    --outdir=*) out="${arg#--outdir=}" ;;
  esac
done
if [ ! -f "$entry" ]; then
  echo "Could not resolve $entry" >&2
  exit 1
fi
mkdir -p "$out"
cp "$entry" "$out/index.js"
"#;

/// Write `<dir>/package.json` and `<dir>/src/index.js` of `bytes` bytes
pub fn write_package(dir: &Path, name: &str, bytes: usize) -> anyhow::Result<()> {
    fs::create_dir_all(dir.join("src"))?;
    fs::write(
        dir.join("package.json"),
        format!(r#"{{ "name": "{}", "version": "1.0.0", "source": "src/index.js" }}"#, name),
    )?;
    write_source(dir, bytes)
}

/// Replace the entry module with `bytes` bytes of source
pub fn write_source(dir: &Path, bytes: usize) -> anyhow::Result<()> {
    let prefix = "export const size = 1;\n";
    let padding = bytes.saturating_sub(prefix.len());
    fs::write(
        dir.join("src/index.js"),
        format!("{}{}", prefix, "/".repeat(padding)),
    )?;
    Ok(())
}

/// Write a monorepo root declaring `packages/*` as workspaces
pub fn write_monorepo_root(root: &Path) -> anyhow::Result<()> {
    fs::write(
        root.join("package.json"),
        r#"{ "name": "root", "private": true, "workspaces": ["packages/*"] }"#,
    )?;
    Ok(())
}

/// Install the fake bundler into `dir`, returning its path
#[cfg(unix)]
pub fn install_fake_bundler(dir: &Path) -> anyhow::Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-esbuild");
    fs::write(&path, FAKE_BUNDLER)?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

/// Write `.size-diff.toml` using `bundler` and extra `settings`
pub fn write_config(root: &Path, bundler: &Path, settings: &str) -> anyhow::Result<()> {
    fs::write(
        root.join(".size-diff.toml"),
        format!(
            "[bundler]\nprogram = {:?}\n\n{}\n",
            bundler.display().to_string(),
            settings
        ),
    )?;
    Ok(())
}

/// Initialise a git repository in `dir` and commit everything in it
pub fn git_commit_all(dir: &Path) -> anyhow::Result<()> {
    let git = |args: &[&str]| -> anyhow::Result<()> {
        let status = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(["-c", "user.name=size-diff", "-c", "user.email=size-diff@example.com"])
            .args(args)
            .output()?;
        anyhow::ensure!(
            status.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&status.stderr)
        );
        Ok(())
    };
    if !dir.join(".git").exists() {
        git(&["init", "--quiet"])?;
    }
    git(&["add", "--all"])?;
    git(&["commit", "--quiet", "--no-gpg-sign", "-m", "baseline"])
}
