//! Git repository test fixtures
//!
//! Provides temporary git repositories for testing artifact commits.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// A temporary git repository for testing.
/// Cleaned up automatically when dropped.
pub struct TestRepo {
    /// TempDir handle (keeps directory alive until dropped)
    _dir: TempDir,
    /// Path to the repository root
    pub path: PathBuf,
}

impl TestRepo {
    /// Create a new test repository with an initial commit.
    /// GPG signing is disabled for CI compatibility.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().to_path_buf();

        Self::git(&path, &["init"]);
        Self::git(&path, &["config", "user.email", "test@example.com"]);
        Self::git(&path, &["config", "user.name", "Test User"]);
        Self::git(&path, &["config", "commit.gpgsign", "false"]);

        std::fs::write(path.join("README.md"), "# Test Repository\n").unwrap();
        Self::git(&path, &["add", "."]);
        Self::git(&path, &["commit", "-m", "Initial commit"]);

        Self { _dir: dir, path }
    }

    /// Message of the HEAD commit
    pub fn head_message(&self) -> String {
        let output = Command::new("git")
            .args(["log", "-1", "--pretty=%s"])
            .current_dir(&self.path)
            .output()
            .expect("Failed to run git log");
        String::from_utf8_lossy(&output.stdout).trim().to_string()
    }

    fn git(path: &Path, args: &[&str]) {
        let output = Command::new("git")
            .args(args)
            .current_dir(path)
            .output()
            .expect("Failed to run git");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

impl Default for TestRepo {
    fn default() -> Self {
        Self::new()
    }
}
