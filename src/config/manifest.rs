//! Package manifest discovery
//!
//! Decides once, at startup, whether a run measures a single package or a
//! monorepo, and turns `package.json` files into [`BuildTarget`]s.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use glob_match::glob_match;
use serde::Deserialize;

use crate::error::SizeDiffError;
use crate::infra::{FileSystem, RealFileSystem};
use crate::pipeline::Invocation;
use crate::target::BuildTarget;

/// Package manifest file name
pub const PACKAGE_MANIFEST: &str = "package.json";

/// Lerna configuration file name
pub const LERNA_MANIFEST: &str = "lerna.json";

/// How deep `**` workspace patterns search below the root
const MAX_WORKSPACE_DEPTH: usize = 6;

/// Conventional source entry points, tried in order
const SOURCE_ENTRIES: [&str; 5] = [
    "src/index.ts",
    "src/index.tsx",
    "src/index.js",
    "src/index.jsx",
    "src/index.mjs",
];

/// The parts of `package.json` a size run reads
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PackageManifest {
    /// Package identity
    pub name: Option<String>,
    /// Source entry (microbundle convention)
    pub source: Option<String>,
    /// ES module entry
    pub module: Option<String>,
    /// CommonJS entry
    pub main: Option<String>,
    /// Unpublishable packages are skipped in monorepos
    pub private: bool,
    /// Runtime dependencies, left external when bundling
    pub dependencies: BTreeMap<String, serde_json::Value>,
    /// Peer dependencies, left external when bundling
    pub peer_dependencies: BTreeMap<String, serde_json::Value>,
    /// npm/yarn workspace globs
    pub workspaces: Option<Workspaces>,
}

/// Both shapes of the `workspaces` field
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Workspaces {
    /// `"workspaces": ["packages/*"]`
    List(Vec<String>),
    /// `"workspaces": { "packages": ["packages/*"] }`
    Object {
        /// Package globs
        packages: Vec<String>,
    },
}

impl Workspaces {
    fn patterns(&self) -> &[String] {
        match self {
            Self::List(patterns) => patterns,
            Self::Object { packages } => packages,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LernaManifest {
    #[serde(default = "default_lerna_packages")]
    packages: Vec<String>,
}

fn default_lerna_packages() -> Vec<String> {
    vec!["packages/*".to_string()]
}

/// Per-run switches applied to every discovered target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetOptions {
    /// Bundle each named export separately
    pub chunk_by_export: bool,
    /// Report stylesheet sizes in their own columns
    pub split_assets: bool,
}

/// Discover what to measure under `root`
pub fn discover(root: &Path, options: TargetOptions) -> Result<Invocation, SizeDiffError> {
    discover_with_fs(root, options, &RealFileSystem)
}

/// Discover what to measure with a custom filesystem implementation
pub fn discover_with_fs<FS: FileSystem>(
    root: &Path,
    options: TargetOptions,
    fs: &FS,
) -> Result<Invocation, SizeDiffError> {
    if let Some((patterns, declared_in)) = monorepo_patterns(root, fs)? {
        let dirs = expand_patterns(root, &patterns, fs);
        if dirs.is_empty() && patterns.iter().any(|p| !p.trim().starts_with('!')) {
            return Err(SizeDiffError::Configuration {
                message: format!("workspace patterns {:?} match no package", patterns),
                path: Some(declared_in),
            });
        }

        let mut targets = Vec::new();
        let mut seen = BTreeSet::new();
        for dir in dirs {
            let manifest = read_manifest(&dir, fs)?;
            if manifest.private {
                log::debug!("Skipping private package in {}", dir.display());
                continue;
            }
            let target = target_from_manifest(&dir, &manifest, options, fs)?;
            if !seen.insert(target.name().to_string()) {
                return Err(SizeDiffError::Configuration {
                    message: format!("package name '{}' is declared twice", target.name()),
                    path: Some(dir.join(PACKAGE_MANIFEST)),
                });
            }
            targets.push(target);
        }
        targets.sort_by(|a, b| a.name().cmp(b.name()));
        log::debug!("Discovered {} publishable packages", targets.len());
        return Ok(Invocation::Multi(targets));
    }

    let manifest = read_manifest(root, fs)?;
    Ok(Invocation::Single(target_from_manifest(root, &manifest, options, fs)?))
}

/// Read and parse `<dir>/package.json`
pub fn read_manifest<FS: FileSystem>(dir: &Path, fs: &FS) -> Result<PackageManifest, SizeDiffError> {
    let path = dir.join(PACKAGE_MANIFEST);
    let contents = fs.read_to_string(&path).map_err(|e| SizeDiffError::Configuration {
        message: format!("cannot read {}: {}", PACKAGE_MANIFEST, e),
        path: Some(path.clone()),
    })?;
    serde_json::from_str(&contents).map_err(|e| SizeDiffError::Configuration {
        message: format!("invalid {}: {}", PACKAGE_MANIFEST, e),
        path: Some(path),
    })
}

/// Build target for the package in `dir`
pub fn target_from_manifest<FS: FileSystem>(
    dir: &Path,
    manifest: &PackageManifest,
    options: TargetOptions,
    fs: &FS,
) -> Result<BuildTarget, SizeDiffError> {
    let manifest_path = dir.join(PACKAGE_MANIFEST);
    let name = manifest
        .name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| SizeDiffError::Configuration {
            message: "package.json has no \"name\"".to_string(),
            path: Some(manifest_path.clone()),
        })?;
    let entry = entry_point(dir, manifest, fs).ok_or_else(|| SizeDiffError::Configuration {
        message: format!("no entry point found for {}", name),
        path: Some(manifest_path),
    })?;

    let externals = manifest
        .dependencies
        .keys()
        .chain(manifest.peer_dependencies.keys())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    Ok(BuildTarget::new(name, dir, entry)?
        .with_chunk_by_export(options.chunk_by_export)
        .with_split_assets(options.split_assets)
        .with_externals(externals))
}

/// First existing entry: `source`, `src/index.*`, `module`, then `main`
pub fn entry_point<FS: FileSystem>(dir: &Path, manifest: &PackageManifest, fs: &FS) -> Option<PathBuf> {
    let declared = |field: &Option<String>| field.as_deref().map(|p| dir.join(p));

    declared(&manifest.source)
        .into_iter()
        .chain(SOURCE_ENTRIES.iter().map(|p| dir.join(p)))
        .chain(declared(&manifest.module))
        .chain(declared(&manifest.main))
        .find(|candidate| fs.metadata(candidate).map(|m| m.is_file()).unwrap_or(false))
}

/// Workspace patterns and the file that declares them
fn monorepo_patterns<FS: FileSystem>(
    root: &Path,
    fs: &FS,
) -> Result<Option<(Vec<String>, PathBuf)>, SizeDiffError> {
    let lerna_path = root.join(LERNA_MANIFEST);
    match fs.read_to_string(&lerna_path) {
        Ok(contents) => {
            let lerna: LernaManifest =
                serde_json::from_str(&contents).map_err(|e| SizeDiffError::Configuration {
                    message: format!("invalid {}: {}", LERNA_MANIFEST, e),
                    path: Some(lerna_path.clone()),
                })?;
            return Ok(Some((lerna.packages, lerna_path)));
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(SizeDiffError::Io {
                context: format!("reading {}", lerna_path.display()),
                source: e,
            })
        }
    }

    let manifest_path = root.join(PACKAGE_MANIFEST);
    if fs.metadata(&manifest_path).is_ok() {
        let manifest = read_manifest(root, fs)?;
        if let Some(workspaces) = manifest.workspaces {
            return Ok(Some((workspaces.patterns().to_vec(), manifest_path)));
        }
    }
    Ok(None)
}

/// Package directories matched by workspace globs, minus `!` exclusions
///
/// Patterns are matched against `/`-separated paths relative to `root`.
fn expand_patterns<FS: FileSystem>(root: &Path, patterns: &[String], fs: &FS) -> Vec<PathBuf> {
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    for pattern in patterns {
        let pattern = pattern.trim();
        let (negated, glob) = match pattern.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, pattern),
        };
        let glob = glob.trim_start_matches("./").trim_end_matches('/').to_string();
        if glob.is_empty() {
            continue;
        }
        if negated {
            exclude.push(glob);
        } else {
            include.push(glob);
        }
    }

    let depth = include
        .iter()
        .map(|glob| {
            if glob.contains("**") {
                MAX_WORKSPACE_DEPTH
            } else {
                glob.split('/').count()
            }
        })
        .max()
        .unwrap_or(0);

    let mut candidates = Vec::new();
    collect_package_dirs(root, "", depth, fs, &mut candidates);

    candidates
        .into_iter()
        .filter(|(rel, _)| include.iter().any(|glob| glob_match(glob, rel)))
        .filter(|(rel, _)| {
            let excluded = exclude.iter().any(|glob| glob_match(glob, rel));
            if excluded {
                log::debug!("Workspace {} excluded by a negated pattern", rel);
            }
            !excluded
        })
        .map(|(_, dir)| dir)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Every directory below `dir` holding a `package.json`, up to `depth` levels
fn collect_package_dirs<FS: FileSystem>(
    dir: &Path,
    rel: &str,
    depth: usize,
    fs: &FS,
    found: &mut Vec<(String, PathBuf)>,
) {
    if depth == 0 {
        return;
    }
    let Ok(entries) = fs.read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || name == "node_modules" {
            continue;
        }
        let path = entry.path();
        if !fs.metadata(&path).map(|m| m.is_dir()).unwrap_or(false) {
            continue;
        }
        let child_rel = if rel.is_empty() {
            name
        } else {
            format!("{}/{}", rel, name)
        };
        if fs.metadata(&path.join(PACKAGE_MANIFEST)).is_ok() {
            found.push((child_rel.clone(), path.clone()));
        }
        collect_package_dirs(&path, &child_rel, depth - 1, fs, found);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_package(root: &Path, rel: &str, manifest: &str, entry: Option<&str>) {
        let dir = root.join(rel);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(PACKAGE_MANIFEST), manifest).unwrap();
        if let Some(entry) = entry {
            let path = dir.join(entry);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "export default 1;").unwrap();
        }
    }

    #[test]
    fn test_single_package() {
        let temp = TempDir::new().unwrap();
        write_package(
            temp.path(),
            ".",
            r#"{"name": "@scope/button", "dependencies": {"react-dom": "^18"}, "peerDependencies": {"react": "^18"}}"#,
            Some("src/index.tsx"),
        );

        let options = TargetOptions {
            chunk_by_export: true,
            split_assets: false,
        };
        let Invocation::Single(target) = discover(temp.path(), options).unwrap() else {
            panic!("expected a single package");
        };
        assert_eq!(target.name(), "@scope/button");
        assert!(target.entry().ends_with("src/index.tsx"));
        assert!(target.chunk_by_export());
        assert_eq!(target.externals(), ["react", "react-dom"]);
    }

    #[test]
    fn test_missing_name_is_a_configuration_error() {
        let temp = TempDir::new().unwrap();
        write_package(temp.path(), ".", r#"{"version": "1.0.0"}"#, Some("src/index.ts"));

        let err = discover(temp.path(), TargetOptions::default()).unwrap_err();
        assert!(matches!(err, SizeDiffError::Configuration { path: Some(_), .. }));
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_missing_manifest_is_a_configuration_error() {
        let temp = TempDir::new().unwrap();
        let err = discover(temp.path(), TargetOptions::default()).unwrap_err();
        assert_eq!(err.exit_code(), 78);
    }

    #[test]
    fn test_missing_entry_is_a_configuration_error() {
        let temp = TempDir::new().unwrap();
        write_package(temp.path(), ".", r#"{"name": "a", "main": "dist/index.js"}"#, None);
        let err = discover(temp.path(), TargetOptions::default()).unwrap_err();
        assert!(err.to_string().contains("no entry point"));
    }

    #[test]
    fn test_entry_resolution_order() {
        let temp = TempDir::new().unwrap();
        write_package(
            temp.path(),
            ".",
            r#"{"name": "a", "source": "lib/entry.ts", "main": "dist/index.js"}"#,
            Some("dist/index.js"),
        );
        let manifest = read_manifest(temp.path(), &RealFileSystem).unwrap();
        assert!(entry_point(temp.path(), &manifest, &RealFileSystem)
            .unwrap()
            .ends_with("dist/index.js"));

        fs::create_dir_all(temp.path().join("lib")).unwrap();
        fs::write(temp.path().join("lib/entry.ts"), "").unwrap();
        assert!(entry_point(temp.path(), &manifest, &RealFileSystem)
            .unwrap()
            .ends_with("lib/entry.ts"));
    }

    #[test]
    fn test_lerna_monorepo_skips_private_and_sorts_by_name() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(LERNA_MANIFEST), r#"{"packages": ["packages/*"]}"#).unwrap();
        write_package(temp.path(), "packages/zeta", r#"{"name": "@ds/card"}"#, Some("src/index.ts"));
        write_package(temp.path(), "packages/alpha", r#"{"name": "@ds/tabs"}"#, Some("src/index.ts"));
        write_package(
            temp.path(),
            "packages/docs",
            r#"{"name": "@ds/docs", "private": true}"#,
            None,
        );
        fs::create_dir_all(temp.path().join("packages/not-a-package")).unwrap();

        let Invocation::Multi(targets) = discover(temp.path(), TargetOptions::default()).unwrap()
        else {
            panic!("expected a monorepo");
        };
        let names: Vec<_> = targets.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["@ds/card", "@ds/tabs"]);
    }

    #[test]
    fn test_lerna_without_packages_uses_default_glob() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(LERNA_MANIFEST), r#"{"version": "independent"}"#).unwrap();
        write_package(temp.path(), "packages/a", r#"{"name": "a"}"#, Some("src/index.js"));

        let invocation = discover(temp.path(), TargetOptions::default()).unwrap();
        assert!(matches!(invocation, Invocation::Multi(ref t) if t.len() == 1));
    }

    #[test]
    fn test_workspaces_object_form_and_literal_dirs() {
        let temp = TempDir::new().unwrap();
        write_package(
            temp.path(),
            ".",
            r#"{"name": "root", "private": true, "workspaces": {"packages": ["tools/cli"]}}"#,
            None,
        );
        write_package(temp.path(), "tools/cli", r#"{"name": "cli"}"#, Some("src/index.ts"));

        let Invocation::Multi(targets) = discover(temp.path(), TargetOptions::default()).unwrap()
        else {
            panic!("expected a monorepo");
        };
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name(), "cli");
    }

    #[test]
    fn test_duplicate_package_names_are_rejected() {
        let temp = TempDir::new().unwrap();
        write_package(temp.path(), ".", r#"{"name": "root", "workspaces": ["packages/*"]}"#, None);
        write_package(temp.path(), "packages/a", r#"{"name": "same"}"#, Some("src/index.ts"));
        write_package(temp.path(), "packages/b", r#"{"name": "same"}"#, Some("src/index.ts"));

        let err = discover(temp.path(), TargetOptions::default()).unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_workspaces_matching_nothing_is_a_configuration_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(LERNA_MANIFEST), r#"{"packages": ["packages/*"]}"#).unwrap();
        let err = discover(temp.path(), TargetOptions::default()).unwrap_err();
        assert_eq!(err.exit_code(), 78);
        assert!(err.to_string().contains("match no package"));
    }

    #[test]
    fn test_monorepo_of_private_packages_is_empty() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(LERNA_MANIFEST), r#"{"packages": ["packages/*"]}"#).unwrap();
        write_package(temp.path(), "packages/docs", r#"{"name": "docs", "private": true}"#, None);
        let invocation = discover(temp.path(), TargetOptions::default()).unwrap();
        assert!(matches!(invocation, Invocation::Multi(ref t) if t.is_empty()));
    }

    #[test]
    fn test_globstar_finds_nested_packages() {
        let temp = TempDir::new().unwrap();
        write_package(temp.path(), ".", r#"{"name": "root", "private": true, "workspaces": ["packages/**"]}"#, None);
        write_package(temp.path(), "packages/ui/button", r#"{"name": "button"}"#, Some("src/index.ts"));
        write_package(temp.path(), "packages/ui/card", r#"{"name": "card"}"#, Some("src/index.ts"));
        write_package(temp.path(), "packages/core", r#"{"name": "core"}"#, Some("src/index.ts"));
        write_package(
            temp.path(),
            "packages/core/node_modules/dep",
            r#"{"name": "dep"}"#,
            Some("src/index.ts"),
        );

        let Invocation::Multi(targets) = discover(temp.path(), TargetOptions::default()).unwrap()
        else {
            panic!("expected a monorepo");
        };
        let names: Vec<_> = targets.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["button", "card", "core"]);
    }

    #[test]
    fn test_infix_wildcard_and_negation() {
        let temp = TempDir::new().unwrap();
        write_package(
            temp.path(),
            ".",
            r#"{"name": "root", "workspaces": ["packages/*-kit", "!packages/legacy-kit"]}"#,
            None,
        );
        write_package(temp.path(), "packages/ui-kit", r#"{"name": "ui-kit"}"#, Some("src/index.ts"));
        write_package(temp.path(), "packages/legacy-kit", r#"{"name": "legacy-kit"}"#, Some("src/index.ts"));
        write_package(temp.path(), "packages/docs", r#"{"name": "docs"}"#, Some("src/index.ts"));

        let Invocation::Multi(targets) = discover(temp.path(), TargetOptions::default()).unwrap()
        else {
            panic!("expected a monorepo");
        };
        let names: Vec<_> = targets.iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["ui-kit"]);
    }
}
