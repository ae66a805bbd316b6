//! Ring promotion with version-marker consistency checks.
//!
//! Every ring snapshot carries the source version it was built from. Before
//! ring N is copied into ring N+1 the marker at N must match the version the
//! caller believes it is rolling out; anything else means another rollout for
//! the same target got there first, and the caller must abort rather than
//! propagate someone else's artifacts.

use glob::{MatchOptions, Pattern};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use super::store::{RingStore, MARKER_FILE};
use crate::rollout::RolloutError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromoteResult {
    Promoted {
        to_ring: usize,
    },
    VersionMismatch {
        ring: usize,
        expected: String,
        found: Option<String>,
    },
}

impl PromoteResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, PromoteResult::Promoted { .. })
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            PromoteResult::Promoted { .. } => None,
            PromoteResult::VersionMismatch {
                ring,
                expected,
                found: Some(found),
            } => Some(format!(
                "version mismatch in ring {ring}: expected '{expected}', found '{found}' \
                 (another rollout for this target is in flight)"
            )),
            // An unpublished or interrupted promotion leaves the ring unstamped.
            PromoteResult::VersionMismatch {
                ring,
                expected,
                found: None,
            } => Some(format!(
                "ring {ring} has no version marker (expected '{expected}'): \
                 its snapshot is missing, incomplete or was never published"
            )),
        }
    }
}

/// Promotion as seen by the decision engine.
#[cfg_attr(test, mockall::automock)]
pub trait RingPropagation {
    fn promote(&self, ring_index: usize, expected_version: &str)
        -> Result<PromoteResult, RolloutError>;
}

#[derive(Debug, Clone)]
pub struct RingPropagator<S> {
    store: S,
}

impl<S: RingStore> RingPropagator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Build ring 0 from the live artifact tree.
    ///
    /// Returns the number of files placed in the snapshot.
    pub fn materialize_initial(
        &self,
        source_root: &Path,
        pattern: &str,
        exclude: &[PathBuf],
        version: &str,
    ) -> Result<usize, RolloutError> {
        let files = select_artifacts(source_root, pattern, exclude)?;
        if files.is_empty() {
            warn!(
                pattern,
                source_root = %source_root.display(),
                "artifact pattern matched no files, ring 0 will be empty"
            );
        }

        self.store.replace_with_files(0, source_root, &files)?;
        self.store.write_marker(0, version)?;

        info!(files = files.len(), version, "materialized ring 0");
        Ok(files.len())
    }
}

impl<S: RingStore> RingPropagation for RingPropagator<S> {
    fn promote(
        &self,
        ring_index: usize,
        expected_version: &str,
    ) -> Result<PromoteResult, RolloutError> {
        let found = self.store.read_marker(ring_index)?;
        if found.as_deref() != Some(expected_version) {
            warn!(
                ring = ring_index,
                expected = expected_version,
                found = ?found,
                "ring marker does not match rollout version"
            );
            return Ok(PromoteResult::VersionMismatch {
                ring: ring_index,
                expected: expected_version.to_string(),
                found,
            });
        }

        let next = ring_index + 1;
        self.store.clear_and_copy(ring_index, next)?;
        // Marker last: an interrupted copy leaves a ring no promotion will accept.
        self.store.write_marker(next, expected_version)?;

        info!(from = ring_index, to = next, version = expected_version, "promoted ring");
        Ok(PromoteResult::Promoted { to_ring: next })
    }
}

/// Compile an artifact selection pattern.
pub fn compile_pattern(pattern: &str) -> Result<Pattern, RolloutError> {
    Pattern::new(pattern)
        .map_err(|e| RolloutError::config(format!("invalid artifact pattern '{pattern}': {e}")))
}

/// Files under `source_root` whose relative path matches `pattern`.
///
/// `*` does not cross directory boundaries; use `**` for recursion. `.git`
/// and any directory listed in `exclude` (typically the ring target root)
/// are never descended into. Results are sorted.
pub fn select_artifacts(
    source_root: &Path,
    pattern: &str,
    exclude: &[PathBuf],
) -> Result<Vec<PathBuf>, RolloutError> {
    let pattern = compile_pattern(pattern)?;
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    let excluded: Vec<PathBuf> = exclude
        .iter()
        .filter_map(|path| fs::canonicalize(path).ok())
        .collect();

    let walker = WalkDir::new(source_root).min_depth(1).into_iter().filter_entry(|entry| {
        if !entry.file_type().is_dir() {
            return true;
        }
        if entry.file_name() == ".git" {
            return false;
        }
        match fs::canonicalize(entry.path()) {
            Ok(canonical) => !excluded.contains(&canonical),
            Err(_) => true,
        }
    });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| source_root.to_path_buf());
            RolloutError::io(path, e.into())
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(source_root) else {
            continue;
        };
        if relative.file_name().is_some_and(|name| name == MARKER_FILE) {
            continue;
        }

        let normalized = relative.to_string_lossy().replace('\\', "/");
        if pattern.matches_with(&normalized, options) {
            files.push(relative.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rings::FsRingStore;
    use std::cell::RefCell;
    use std::io;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn pattern_selects_relative_paths() {
        let source = TempDir::new().unwrap();
        write(&source.path().join("flags/a.json"), "a");
        write(&source.path().join("flags/deep/b.json"), "b");
        write(&source.path().join("flags/readme.md"), "docs");
        write(&source.path().join(".git/HEAD"), "ref");

        let top_level = select_artifacts(source.path(), "flags/*.json", &[]).unwrap();
        assert_eq!(top_level, vec![PathBuf::from("flags/a.json")]);

        let recursive = select_artifacts(source.path(), "flags/**/*.json", &[]).unwrap();
        assert_eq!(
            recursive,
            vec![PathBuf::from("flags/a.json"), PathBuf::from("flags/deep/b.json")]
        );

        let everything = select_artifacts(source.path(), "**/*", &[]).unwrap();
        assert!(!everything.iter().any(|p| p.starts_with(".git")));
    }

    #[test]
    fn excluded_directories_are_skipped() {
        let source = TempDir::new().unwrap();
        write(&source.path().join("app.json"), "live");
        write(&source.path().join("rings/0/app.json"), "snapshot");

        let files =
            select_artifacts(source.path(), "**/*.json", &[source.path().join("rings")]).unwrap();
        assert_eq!(files, vec![PathBuf::from("app.json")]);
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let source = TempDir::new().unwrap();
        let err = select_artifacts(source.path(), "[unclosed", &[]).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn materialize_initial_stamps_ring_zero() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        write(&source.path().join("app.json"), "{}");

        let propagator = RingPropagator::new(FsRingStore::new(target.path()));
        let count = propagator
            .materialize_initial(source.path(), "*.json", &[], "abc123")
            .unwrap();

        assert_eq!(count, 1);
        assert!(target.path().join("0/app.json").exists());
        assert_eq!(
            propagator.store().read_marker(0).unwrap().as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn promote_copies_and_stamps_next_ring() {
        let target = TempDir::new().unwrap();
        let store = FsRingStore::new(target.path());
        write(&store.ring_dir(1).join("app.json"), "v2");
        store.write_marker(1, "abc123").unwrap();

        let propagator = RingPropagator::new(store);
        let result = propagator.promote(1, "abc123").unwrap();

        assert_eq!(result, PromoteResult::Promoted { to_ring: 2 });
        assert!(result.reason().is_none());
        assert_eq!(
            fs::read_to_string(target.path().join("2/app.json")).unwrap(),
            "v2"
        );
        assert_eq!(
            propagator.store().read_marker(2).unwrap().as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn promote_refuses_on_marker_mismatch() {
        let target = TempDir::new().unwrap();
        let store = FsRingStore::new(target.path());
        write(&store.ring_dir(1).join("app.json"), "theirs");
        store.write_marker(1, "xyz999").unwrap();

        let propagator = RingPropagator::new(store);
        let result = propagator.promote(1, "abc123").unwrap();

        assert!(!result.is_ok());
        let reason = result.reason().unwrap();
        assert!(reason.contains("abc123"));
        assert!(reason.contains("xyz999"));
        assert!(!target.path().join("2").exists());
    }

    #[test]
    fn promote_refuses_when_marker_missing() {
        let target = TempDir::new().unwrap();
        let propagator = RingPropagator::new(FsRingStore::new(target.path()));

        let result = propagator.promote(0, "abc123").unwrap();
        assert_eq!(
            result,
            PromoteResult::VersionMismatch {
                ring: 0,
                expected: "abc123".to_string(),
                found: None,
            }
        );
        let reason = result.reason().unwrap();
        assert!(reason.contains("no version marker"));
        assert!(!reason.contains("in flight"));
    }

    /// Store whose copy dies after writing part of the next ring.
    struct InterruptedCopy {
        inner: FsRingStore,
        stamped: RefCell<Vec<usize>>,
    }

    impl RingStore for InterruptedCopy {
        fn read_marker(&self, ring: usize) -> Result<Option<String>, RolloutError> {
            self.inner.read_marker(ring)
        }

        fn clear_and_copy(&self, _from: usize, to: usize) -> Result<(), RolloutError> {
            let partial = self.inner.ring_dir(to).join("app.json");
            write(&partial, "half");
            Err(RolloutError::io(
                partial,
                io::Error::new(io::ErrorKind::Other, "no space left on device"),
            ))
        }

        fn write_marker(&self, ring: usize, version: &str) -> Result<(), RolloutError> {
            self.stamped.borrow_mut().push(ring);
            self.inner.write_marker(ring, version)
        }

        fn replace_with_files(
            &self,
            ring: usize,
            source_root: &Path,
            files: &[PathBuf],
        ) -> Result<(), RolloutError> {
            self.inner.replace_with_files(ring, source_root, files)
        }
    }

    #[test]
    fn interrupted_copy_leaves_next_ring_unstamped() {
        let target = TempDir::new().unwrap();
        let store = FsRingStore::new(target.path());
        write(&store.ring_dir(1).join("app.json"), "v2");
        store.write_marker(1, "abc123").unwrap();

        let interrupted = RingPropagator::new(InterruptedCopy {
            inner: store.clone(),
            stamped: RefCell::new(Vec::new()),
        });
        let err = interrupted.promote(1, "abc123").unwrap_err();
        assert!(matches!(err, RolloutError::Io { .. }));
        assert!(interrupted.store().stamped.borrow().is_empty());
        assert!(target.path().join("2/app.json").exists());

        // The half-copied ring can never be promoted further.
        let next = RingPropagator::new(store).promote(2, "abc123").unwrap();
        assert_eq!(
            next,
            PromoteResult::VersionMismatch {
                ring: 2,
                expected: "abc123".to_string(),
                found: None,
            }
        );
    }
}
