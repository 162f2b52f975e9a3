//! Per-submission scratch directory.
//!
//! Mirrors the original's `./tmp/socket_sandbox_<pid>/run_<pid>_<epoch>/`
//! naming and "create eagerly, clean up on drop" lifecycle (spec §4.A).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

/// Per-process disambiguator so two submissions created in the same second
/// still get distinct workspace directories.
static WORKSPACE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Owns a uniquely-named scratch directory for one submission.
///
/// Created eagerly on construction. `cleanup()` removes the tree recursively
/// and is idempotent; it also runs on `Drop` so failures to explicitly call
/// it still release the directory. Removal errors are logged, never
/// propagated — spec §4.A: "errors from removal are logged but never
/// propagated".
pub struct Workspace {
    dir: PathBuf,
}

impl Workspace {
    /// Create a new workspace under `root`, named
    /// `socket_sandbox_<pid>/run_<pid>_<epoch>_<counter>`.
    pub fn create(root: &str) -> std::io::Result<Self> {
        let pid = std::process::id();
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        let counter = WORKSPACE_COUNTER.fetch_add(1, Ordering::Relaxed);

        let dir = Path::new(root)
            .join(format!("socket_sandbox_{pid}"))
            .join(format!("run_{pid}_{epoch}_{counter}"));

        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Absolute-or-relative path to this workspace's directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Path to the compiled artifact, `<workspace>/program`.
    #[must_use]
    pub fn artifact_path(&self) -> PathBuf {
        self.dir.join("program")
    }

    /// Path to the captured compiler stderr, `<workspace>/compile_errors.txt`.
    #[must_use]
    pub fn compile_errors_path(&self) -> PathBuf {
        self.dir.join("compile_errors.txt")
    }

    /// Remove the workspace tree. Idempotent — a missing directory is not an
    /// error. Failures are logged and swallowed.
    pub fn cleanup(&self) {
        if self.dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.dir) {
                warn!("Failed to clean up workspace {}: {e}", self.dir.display());
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_cleanup_round_trips() {
        let root = tempfile::tempdir().unwrap();
        let root_path = root.path().to_str().unwrap();

        let ws = Workspace::create(root_path).unwrap();
        assert!(ws.path().exists());
        ws.cleanup();
        assert!(!ws.path().exists());
        // Idempotent: calling again on an already-removed tree is fine.
        ws.cleanup();
    }

    #[test]
    fn drop_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let root_path = root.path().to_str().unwrap();

        let dir = {
            let ws = Workspace::create(root_path).unwrap();
            ws.path().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn two_workspaces_in_same_root_are_distinct() {
        let root = tempfile::tempdir().unwrap();
        let root_path = root.path().to_str().unwrap();

        let a = Workspace::create(root_path).unwrap();
        let b = Workspace::create(root_path).unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn artifact_and_compile_error_paths_are_under_workspace() {
        let root = tempfile::tempdir().unwrap();
        let ws = Workspace::create(root.path().to_str().unwrap()).unwrap();
        assert_eq!(ws.artifact_path(), ws.path().join("program"));
        assert_eq!(
            ws.compile_errors_path(),
            ws.path().join("compile_errors.txt")
        );
    }
}
