//! System-of-record interface.
//!
//! The remote store that owns project, decision, and experiment entities is
//! an external collaborator; this module specifies its contract and ships an
//! in-memory implementation for tests and local runs. The status enum the
//! store persists is the orchestrator's own [`ExperimentStatus`], so remote
//! and local state machines cannot drift.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::client::events::{ExperimentMetrics, PersonaResponse};
use crate::orchestrator::state::ExperimentStatus;

/// Errors from the system-of-record.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transient: the store could not be reached or answered 5xx
    #[error("Record store unavailable: {0}")]
    Unavailable(String),

    /// Permanent: the store understood and refused the request
    #[error("Record store rejected the request: {0}")]
    Rejected(String),

    #[error("Unknown record: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Whether a deferred resend can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Status of a linked business decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Ready,
    Running,
    Completed,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionStatus::Ready => "ready",
            DecisionStatus::Running => "running",
            DecisionStatus::Completed => "completed",
        }
    }
}

/// Fields for creating a new experiment record.
#[derive(Debug, Clone)]
pub struct NewExperimentRecord {
    pub project_id: String,
    pub config_ref: String,
    pub total_personas: u32,
}

/// Final results attached to a completed experiment record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentOutcome {
    pub results: Vec<PersonaResponse>,
    pub metrics: Option<ExperimentMetrics>,
    /// Project-relative path of the results artifact
    pub artifact_path: Option<String>,
    /// Commit id of the auto-committed artifact, when committed
    pub commit_id: Option<String>,
    pub duration_seconds: f64,
}

/// Contract consumed by the orchestrator. Implementations talk to the real
/// remote store; [`InMemoryRecordStore`] backs tests and local runs.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create an experiment record, returning its id
    async fn create_experiment(&self, new: NewExperimentRecord) -> Result<String, StoreError>;

    /// Persist a status transition
    async fn update_status(
        &self,
        experiment_id: &str,
        status: ExperimentStatus,
    ) -> Result<(), StoreError>;

    /// Persist incremental progress
    async fn record_progress(
        &self,
        experiment_id: &str,
        completed: u32,
        total: u32,
    ) -> Result<(), StoreError>;

    /// Mark the experiment completed with its final outcome
    async fn complete_experiment(
        &self,
        experiment_id: &str,
        outcome: &ExperimentOutcome,
    ) -> Result<(), StoreError>;

    /// Mark the experiment failed with an error message
    async fn fail_experiment(&self, experiment_id: &str, message: &str) -> Result<(), StoreError>;

    /// Update a linked decision's status
    async fn update_decision(
        &self,
        decision_id: &str,
        status: DecisionStatus,
    ) -> Result<(), StoreError>;
}

// ============================================================================
// In-memory implementation
// ============================================================================

/// One experiment record as held by the in-memory store.
#[derive(Debug, Clone)]
pub struct ExperimentRecord {
    pub id: String,
    pub project_id: String,
    pub config_ref: String,
    pub status: ExperimentStatus,
    pub completed_personas: u32,
    pub total_personas: u32,
    pub outcome: Option<ExperimentOutcome>,
    pub failure_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// In-memory system-of-record used by tests and `--local` runs.
#[derive(Default)]
pub struct InMemoryRecordStore {
    experiments: Mutex<HashMap<String, ExperimentRecord>>,
    decisions: Mutex<HashMap<String, DecisionStatus>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn experiment(&self, id: &str) -> Option<ExperimentRecord> {
        self.experiments.lock().get(id).cloned()
    }

    /// All experiment records, newest last
    pub fn experiments(&self) -> Vec<ExperimentRecord> {
        let mut records: Vec<_> = self.experiments.lock().values().cloned().collect();
        records.sort_by_key(|record| record.created_at);
        records
    }

    pub fn decision_status(&self, id: &str) -> Option<DecisionStatus> {
        self.decisions.lock().get(id).copied()
    }

    /// Pre-seed a decision (records created by the surrounding app)
    pub fn seed_decision(&self, id: impl Into<String>, status: DecisionStatus) {
        self.decisions.lock().insert(id.into(), status);
    }

    fn with_experiment<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut ExperimentRecord) -> T,
    ) -> Result<T, StoreError> {
        let mut experiments = self.experiments.lock();
        let record = experiments
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.updated_at = Utc::now();
        Ok(f(record))
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create_experiment(&self, new: NewExperimentRecord) -> Result<String, StoreError> {
        let id = format!("exprec-{}", Uuid::new_v4());
        let now = Utc::now();
        let record = ExperimentRecord {
            id: id.clone(),
            project_id: new.project_id,
            config_ref: new.config_ref,
            status: ExperimentStatus::Pending,
            completed_personas: 0,
            total_personas: new.total_personas,
            outcome: None,
            failure_message: None,
            created_at: now,
            updated_at: now,
        };
        self.experiments.lock().insert(id.clone(), record);
        Ok(id)
    }

    async fn update_status(
        &self,
        experiment_id: &str,
        status: ExperimentStatus,
    ) -> Result<(), StoreError> {
        self.with_experiment(experiment_id, |record| record.status = status)
    }

    async fn record_progress(
        &self,
        experiment_id: &str,
        completed: u32,
        total: u32,
    ) -> Result<(), StoreError> {
        self.with_experiment(experiment_id, |record| {
            record.completed_personas = completed;
            record.total_personas = total;
        })
    }

    async fn complete_experiment(
        &self,
        experiment_id: &str,
        outcome: &ExperimentOutcome,
    ) -> Result<(), StoreError> {
        self.with_experiment(experiment_id, |record| {
            record.status = ExperimentStatus::Completed;
            record.outcome = Some(outcome.clone());
        })
    }

    async fn fail_experiment(&self, experiment_id: &str, message: &str) -> Result<(), StoreError> {
        self.with_experiment(experiment_id, |record| {
            record.status = ExperimentStatus::Failed;
            record.failure_message = Some(message.to_string());
        })
    }

    async fn update_decision(
        &self,
        decision_id: &str,
        status: DecisionStatus,
    ) -> Result<(), StoreError> {
        self.decisions.lock().insert(decision_id.to_string(), status);
        Ok(())
    }
}
