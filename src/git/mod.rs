//! Git auto-commit for experiment artifacts.
//!
//! One operation: stage a set of project-relative paths and commit them,
//! returning the commit id. Callers treat a commit failure as a warning,
//! never as an experiment failure, so the error type is structured rather
//! than fatal.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitError {
    #[error("Git command failed: {0}")]
    CommandFailed(String),
    #[error("Not a git repository: {0}")]
    NotAGitRepo(PathBuf),
    #[error("No files provided to commit")]
    NoFiles,
    #[error("Commit message cannot be empty")]
    EmptyMessage,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stage `files` (paths relative to `repo_path`) and commit them.
///
/// Falls back to a default author identity when the repository has none
/// configured. Returns the new commit's SHA.
pub fn auto_commit(repo_path: &Path, files: &[String], message: &str) -> Result<String, GitError> {
    if files.is_empty() {
        return Err(GitError::NoFiles);
    }
    if message.trim().is_empty() {
        return Err(GitError::EmptyMessage);
    }

    validate_git_repo(repo_path)?;

    tracing::info!(
        files = files.len(),
        repo = %repo_path.display(),
        "Auto-committing artifacts"
    );

    let mut add = Command::new("git");
    add.args(["add", "--"]).args(files).current_dir(repo_path);
    run_checked(add)?;

    let mut commit = Command::new("git");
    if !has_identity(repo_path) {
        tracing::debug!("Git user not configured, using default signature");
        commit.args([
            "-c",
            "user.name=Panelist",
            "-c",
            "user.email=panelist@localhost",
        ]);
    }
    commit
        .args(["commit", "-m", message])
        .current_dir(repo_path);
    run_checked(commit)?;

    let mut rev_parse = Command::new("git");
    rev_parse.args(["rev-parse", "HEAD"]).current_dir(repo_path);
    let sha = run_checked(rev_parse)?.trim().to_string();

    tracing::info!(commit = %sha, "Created commit");
    Ok(sha)
}

fn validate_git_repo(repo_path: &Path) -> Result<(), GitError> {
    let output = Command::new("git")
        .args(["rev-parse", "--git-dir"])
        .current_dir(repo_path)
        .output()?;
    if output.status.success() {
        Ok(())
    } else {
        Err(GitError::NotAGitRepo(repo_path.to_path_buf()))
    }
}

fn has_identity(repo_path: &Path) -> bool {
    Command::new("git")
        .args(["config", "user.email"])
        .current_dir(repo_path)
        .output()
        .map(|o| o.status.success() && !o.stdout.is_empty())
        .unwrap_or(false)
}

fn run_checked(mut command: Command) -> Result<String, GitError> {
    let output = command.output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GitError::CommandFailed(stderr.trim().to_string()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
