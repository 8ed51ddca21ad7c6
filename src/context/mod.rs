//! Context file staging.
//!
//! Copies local files into the project's context directory so experiment
//! configs can reference them. Staging runs through the bounded upload
//! scheduler: any number of files can be submitted at once, but only a few
//! copy (and commit) concurrently.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::oneshot;

use crate::git;
use crate::scheduler::UploadScheduler;
use crate::util::slugify;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Source file not found: {0}")]
    SourceMissing(PathBuf),

    #[error("Source has no usable filename: {0}")]
    InvalidSource(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One file to stage into the project.
#[derive(Debug, Clone)]
pub struct UploadTask {
    /// File to copy
    pub source: PathBuf,
    /// Directory under the project root, e.g. "context"
    pub destination: String,
}

impl UploadTask {
    pub fn new(source: PathBuf) -> Self {
        Self {
            source,
            destination: "context".to_string(),
        }
    }
}

/// Record of a staged context file.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub original_filename: String,
    pub stored_filename: String,
    /// Path relative to the project root
    pub relative_path: String,
    pub size_bytes: u64,
}

/// Stages context files into a project, bounded by the upload scheduler.
pub struct ContextStager {
    project_root: PathBuf,
    scheduler: UploadScheduler,
    auto_commit: bool,
}

impl ContextStager {
    pub fn new(project_root: PathBuf, scheduler: UploadScheduler, auto_commit: bool) -> Self {
        Self {
            project_root,
            scheduler,
            auto_commit,
        }
    }

    /// Submit one staging task. Returns immediately; the receiver resolves
    /// when the copy (and optional commit) finishes.
    pub fn stage(&self, task: UploadTask) -> oneshot::Receiver<Result<StagedFile, ContextError>> {
        let project_root = self.project_root.clone();
        let auto_commit = self.auto_commit;
        self.scheduler
            .submit_with_result(async move { stage_file(&project_root, task, auto_commit).await })
    }
}

async fn stage_file(
    project_root: &Path,
    task: UploadTask,
    auto_commit: bool,
) -> Result<StagedFile, ContextError> {
    if !task.source.exists() {
        return Err(ContextError::SourceMissing(task.source));
    }

    let original_filename = task
        .source
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| ContextError::InvalidSource(task.source.clone()))?;

    let stored_filename = stored_name(&original_filename);
    let dest_dir = project_root.join(&task.destination);
    tokio::fs::create_dir_all(&dest_dir).await?;

    let stored_filename = unique_name(&dest_dir, &stored_filename);
    let dest_path = dest_dir.join(&stored_filename);

    tracing::debug!(
        from = %task.source.display(),
        to = %dest_path.display(),
        "Staging context file"
    );
    let size_bytes = tokio::fs::copy(&task.source, &dest_path).await?;

    let relative_path = format!("{}/{stored_filename}", task.destination);

    if auto_commit {
        let message = format!("Add context file: {stored_filename}");
        match git::auto_commit(project_root, &[relative_path.clone()], &message) {
            Ok(commit) => tracing::info!(%commit, "Context file committed"),
            Err(e) => {
                tracing::error!("Git commit failed: {e}");
                tracing::warn!("Context file staged but not committed");
            }
        }
    }

    Ok(StagedFile {
        original_filename,
        stored_filename,
        relative_path,
        size_bytes,
    })
}

/// Slugified stem, original extension
fn stored_name(original: &str) -> String {
    match original.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            format!("{}.{}", slugify(stem), ext.to_ascii_lowercase())
        }
        _ => slugify(original),
    }
}

fn unique_name(dir: &Path, filename: &str) -> String {
    if !dir.join(filename).exists() {
        return filename.to_string();
    }

    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) => (stem.to_string(), format!(".{ext}")),
        None => (filename.to_string(), String::new()),
    };

    let mut counter = 2;
    loop {
        let candidate = format!("{stem}-{counter}{ext}");
        if !dir.join(&candidate).exists() {
            return candidate;
        }
        counter += 1;
    }
}
