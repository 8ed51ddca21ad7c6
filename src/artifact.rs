//! Durable results artifacts.
//!
//! The final report of an experiment is serialized as pretty JSON under
//! `<project_root>/<results_dir>/`. Filenames are slugs derived from the
//! experiment name; collisions resolve by appending -2, -3, and so on.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::events::{ExperimentMetrics, PersonaResponse};
use crate::util::{slugify, validate_filename};

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Invalid artifact filename: {0}")]
    InvalidFilename(String),

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Final report written after a completed experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub experiment_id: String,
    /// Reference to the experiment config this run executed
    pub config_ref: String,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub results: Vec<PersonaResponse>,
    pub metrics: Option<ExperimentMetrics>,
}

/// Write `report` under `<project_root>/<results_dir>/`, creating the
/// directory when missing. Returns the project-relative path of the file.
pub fn write_report(
    project_root: &Path,
    results_dir: &str,
    name: &str,
    report: &ExperimentReport,
) -> Result<String, ArtifactError> {
    let filename = format!("{}.json", slugify(name));
    validate_filename(&filename).map_err(ArtifactError::InvalidFilename)?;

    let dir = project_root.join(results_dir);
    if !dir.exists() {
        tracing::debug!(dir = %dir.display(), "Creating results directory");
        fs::create_dir_all(&dir)?;
    }

    let final_filename = resolve_unique_filename(&dir, &filename);
    let path = dir.join(&final_filename);

    let contents = serde_json::to_string_pretty(report)?;
    fs::write(&path, contents)?;

    let relative = format!(
        "{}/{final_filename}",
        results_dir.trim_end_matches('/')
    );
    tracing::info!(path = %relative, "Wrote experiment report");
    Ok(relative)
}

/// Resolve a unique filename by appending -2, -3, etc. if the file already
/// exists, incrementing until a unique name is found.
fn resolve_unique_filename(dir: &PathBuf, filename: &str) -> String {
    if !dir.join(filename).exists() {
        return filename.to_string();
    }

    let stem = filename.trim_end_matches(".json");
    let mut counter = 2;

    loop {
        let candidate = format!("{stem}-{counter}.json");
        if !dir.join(&candidate).exists() {
            return candidate;
        }
        counter += 1;
    }
}
