//! Experiment run state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::events::{ExperimentMetrics, PersonaResponse};

/// Lifecycle status of one experiment execution.
///
/// Transitions only move forward: `Pending → GeneratingPersonas → Running →
/// {Completed | Failed}`. Intermediate states may be skipped (a stream can
/// complete without ever reporting a running phase), terminal states are
/// never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Pending,
    GeneratingPersonas,
    Running,
    Completed,
    Failed,
}

impl ExperimentStatus {
    /// String representation for storage and the system-of-record
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentStatus::Pending => "pending",
            ExperimentStatus::GeneratingPersonas => "generating_personas",
            ExperimentStatus::Running => "running",
            ExperimentStatus::Completed => "completed",
            ExperimentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExperimentStatus::Completed | ExperimentStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            ExperimentStatus::Pending => 0,
            ExperimentStatus::GeneratingPersonas => 1,
            ExperimentStatus::Running => 2,
            ExperimentStatus::Completed | ExperimentStatus::Failed => 3,
        }
    }

    /// Whether moving to `next` respects forward-only ordering
    pub fn can_transition_to(&self, next: ExperimentStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }
}

impl std::fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mutable state for one experiment execution. Created once at orchestration
/// start, mutated only by the orchestrator, finalized exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentRunState {
    pub experiment_id: String,
    pub status: ExperimentStatus,
    pub completed_personas: u32,
    pub total_personas: u32,
    pub results: Vec<PersonaResponse>,
    pub metrics: Option<ExperimentMetrics>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExperimentRunState {
    pub fn new(experiment_id: impl Into<String>, total_personas: u32) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            status: ExperimentStatus::Pending,
            completed_personas: 0,
            total_personas,
            results: Vec::new(),
            metrics: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Apply a forward transition. Returns true when the status changed;
    /// backward or repeated transitions are ignored.
    pub fn transition(&mut self, next: ExperimentStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        tracing::debug!(
            experiment_id = %self.experiment_id,
            from = %self.status,
            to = %next,
            "Experiment status transition"
        );
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        true
    }

    /// Accumulate one completed persona response.
    /// The completed counter never exceeds the known total.
    pub fn record_response(&mut self, response: PersonaResponse) {
        self.results.push(response);
        if self.total_personas == 0 || self.completed_personas < self.total_personas {
            self.completed_personas += 1;
        }
    }

    /// Replace accumulated results and metrics with the authoritative
    /// `experiment_complete` payload.
    pub fn replace_results(&mut self, results: Vec<PersonaResponse>, metrics: ExperimentMetrics) {
        self.completed_personas = results.len() as u32;
        if metrics.total_personas > 0 {
            self.total_personas = metrics.total_personas;
        }
        self.results = results;
        self.metrics = Some(metrics);
    }

    /// Elapsed run duration in seconds, using completion time when final
    pub fn duration_seconds(&self) -> f64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}
