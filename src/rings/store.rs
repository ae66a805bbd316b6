//! Storage capabilities behind ring snapshots.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::rollout::RolloutError;

/// File holding the source version a ring snapshot was built from.
pub const MARKER_FILE: &str = ".rollout-version";

/// The minimal set of operations ring propagation needs from a storage
/// medium. Rings are addressed by index; how they are laid out is up to the
/// implementation.
pub trait RingStore {
    /// Version stamped into `ring`, or `None` when the ring has no marker.
    fn read_marker(&self, ring: usize) -> Result<Option<String>, RolloutError>;

    /// Remove everything in `to`, then copy the content of `from` into it.
    /// The marker of `from` is not copied.
    fn clear_and_copy(&self, from: usize, to: usize) -> Result<(), RolloutError>;

    fn write_marker(&self, ring: usize, version: &str) -> Result<(), RolloutError>;

    /// Replace `ring` with `files`, given relative to `source_root`.
    fn replace_with_files(
        &self,
        ring: usize,
        source_root: &Path,
        files: &[PathBuf],
    ) -> Result<(), RolloutError>;
}

/// Rings laid out as `<root>/<index>/` on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsRingStore {
    root: PathBuf,
}

impl FsRingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ring_dir(&self, ring: usize) -> PathBuf {
        self.root.join(ring.to_string())
    }

    fn reset_dir(dir: &Path) -> Result<(), RolloutError> {
        match fs::remove_dir_all(dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(RolloutError::io(dir, e)),
        }
        fs::create_dir_all(dir).map_err(|e| RolloutError::io(dir, e))
    }

    fn copy_file(from: &Path, to: &Path) -> Result<(), RolloutError> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).map_err(|e| RolloutError::io(parent, e))?;
        }
        fs::copy(from, to).map_err(|e| RolloutError::io(from, e))?;
        Ok(())
    }
}

impl RingStore for FsRingStore {
    fn read_marker(&self, ring: usize) -> Result<Option<String>, RolloutError> {
        let path = self.ring_dir(ring).join(MARKER_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content.trim().to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RolloutError::io(path, e)),
        }
    }

    fn clear_and_copy(&self, from: usize, to: usize) -> Result<(), RolloutError> {
        let source = self.ring_dir(from);
        let destination = self.ring_dir(to);
        Self::reset_dir(&destination)?;

        for entry in WalkDir::new(&source).min_depth(1) {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| source.clone());
                RolloutError::io(path, e.into())
            })?;
            let Ok(relative) = entry.path().strip_prefix(&source) else {
                continue;
            };
            if relative == Path::new(MARKER_FILE) {
                continue;
            }

            let target = destination.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target).map_err(|e| RolloutError::io(&target, e))?;
            } else {
                Self::copy_file(entry.path(), &target)?;
            }
        }

        debug!(from, to, root = %self.root.display(), "copied ring snapshot");
        Ok(())
    }

    fn write_marker(&self, ring: usize, version: &str) -> Result<(), RolloutError> {
        let path = self.ring_dir(ring).join(MARKER_FILE);
        fs::write(&path, format!("{version}\n")).map_err(|e| RolloutError::io(path, e))
    }

    fn replace_with_files(
        &self,
        ring: usize,
        source_root: &Path,
        files: &[PathBuf],
    ) -> Result<(), RolloutError> {
        let destination = self.ring_dir(ring);
        Self::reset_dir(&destination)?;

        for relative in files {
            Self::copy_file(&source_root.join(relative), &destination.join(relative))?;
        }
        Ok(())
    }
}
