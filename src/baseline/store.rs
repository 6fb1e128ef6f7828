//! Persisted snapshot files
//!
//! A package's snapshots live next to it as `bundle-master.json` (baseline)
//! and `bundle-pr.json` (current), each holding one pretty-printed
//! [`SizeSnapshot`]. Every path is written at most once per run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::error::BaselineError;
use crate::infra::{FileSystem, RealFileSystem};
use crate::snapshot::{BuildMode, SizeSnapshot};
use crate::target::BuildTarget;

/// Which side of the comparison a file holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    /// The comparison build, `bundle-master.json`
    Baseline,
    /// The build of the working tree, `bundle-pr.json`
    Current,
}

impl SnapshotKind {
    /// File name on disk
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Baseline => "bundle-master.json",
            Self::Current => "bundle-pr.json",
        }
    }
}

/// Reads and writes persisted snapshots
#[derive(Debug)]
pub struct SnapshotStore<FS: FileSystem = RealFileSystem> {
    fs: FS,
    snapshot_dir: PathBuf,
    written: Mutex<HashSet<PathBuf>>,
}

impl SnapshotStore<RealFileSystem> {
    /// Store writing into `snapshot_dir`, relative to each package directory
    pub fn new(snapshot_dir: impl Into<PathBuf>) -> Self {
        Self::with_fs(snapshot_dir, RealFileSystem)
    }
}

impl<FS: FileSystem> SnapshotStore<FS> {
    /// Create a store with a custom filesystem implementation
    pub fn with_fs(snapshot_dir: impl Into<PathBuf>, fs: FS) -> Self {
        Self {
            fs,
            snapshot_dir: snapshot_dir.into(),
            written: Mutex::new(HashSet::new()),
        }
    }

    /// Location of `kind` for `target`
    pub fn path_for(&self, target: &BuildTarget, kind: SnapshotKind) -> PathBuf {
        target.dir().join(&self.snapshot_dir).join(kind.file_name())
    }

    /// Read a persisted snapshot; `None` when there is none for this package
    pub fn load(
        &self,
        target: &BuildTarget,
        kind: SnapshotKind,
    ) -> Result<Option<SizeSnapshot>, BaselineError> {
        let path = self.path_for(target, kind);
        let contents = match self.fs.read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No persisted snapshot at {}", path.display());
                return Ok(None);
            }
            Err(e) => return Err(BaselineError::io(format!("reading {}", path.display()))(e)),
        };

        let snapshot: SizeSnapshot = serde_json::from_str(&contents)
            .map_err(|source| BaselineError::Corrupt { path: path.clone(), source })?;

        if snapshot.package != target.name() {
            log::warn!(
                "{} belongs to {}, not {}; ignoring it",
                path.display(),
                snapshot.package,
                target.name()
            );
            return Ok(None);
        }
        if snapshot.mode != BuildMode::Minified {
            return Err(BaselineError::Unminified(path));
        }
        Ok(Some(snapshot))
    }

    /// Write `snapshot` as `kind` for `target`, returning the path written
    pub fn save(
        &self,
        target: &BuildTarget,
        kind: SnapshotKind,
        snapshot: &SizeSnapshot,
    ) -> Result<PathBuf, BaselineError> {
        let path = self.path_for(target, kind);
        self.claim(&path)?;

        if let Some(parent) = path.parent() {
            self.fs
                .create_dir_all(parent)
                .map_err(BaselineError::io(format!("creating {}", parent.display())))?;
        }
        let mut json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| BaselineError::io("serializing snapshot")(std::io::Error::other(e)))?;
        json.push('\n');

        self.fs
            .write(&path, json)
            .map_err(BaselineError::io(format!("writing {}", path.display())))?;
        log::debug!("Wrote {}", path.display());
        Ok(path)
    }

    fn claim(&self, path: &Path) -> Result<(), BaselineError> {
        if self.written.lock().insert(path.to_path_buf()) {
            Ok(())
        } else {
            Err(BaselineError::AlreadyWritten(path.to_path_buf()))
        }
    }
}
