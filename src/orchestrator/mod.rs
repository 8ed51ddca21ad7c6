//! Experiment execution orchestrator.
//!
//! Composes the streaming client, the system-of-record, the config loader,
//! artifact writing, and git auto-commit into one state-machine-driven run:
//! `pending → generating_personas → running → {completed | failed}`. Any
//! step's failure propagates to a single failure handler that performs
//! best-effort compensations and re-throws the original error.

pub mod events;
pub mod state;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;

use crate::artifact::{self, ExperimentReport};
use crate::client::events::StreamEvent;
use crate::client::experiment::ExperimentClient;
use crate::config::{ConfigLoader, ExperimentConfig};
use crate::error::ExperimentError;
use crate::git;
use crate::queue::{DeferredUpdate, Outbox};
use crate::retry::{with_retry_classified, RetryOptions};
use crate::store::{DecisionStatus, ExperimentOutcome, NewExperimentRecord, RecordStore};

pub use events::{event_channel, EventReceiver, EventSender, OrchestratorEvent};
pub use state::{ExperimentRunState, ExperimentStatus};

/// Options for one experiment execution.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Reference resolved by the config loader
    pub config_ref: String,
    /// Project this experiment belongs to in the system-of-record
    pub project_id: String,
    /// Local project root (artifact destination, git repository)
    pub project_root: std::path::PathBuf,
    /// Linked decision advanced alongside the experiment, when present
    pub decision_id: Option<String>,
}

/// Drives one experiment end to end.
pub struct ExperimentOrchestrator {
    client: Arc<dyn ExperimentClient>,
    store: Arc<dyn RecordStore>,
    loader: Arc<dyn ConfigLoader>,
    events: EventSender,
    retry: RetryOptions,
    outbox: Option<Arc<Outbox>>,
}

impl ExperimentOrchestrator {
    pub fn new(
        client: Arc<dyn ExperimentClient>,
        store: Arc<dyn RecordStore>,
        loader: Arc<dyn ConfigLoader>,
        events: EventSender,
    ) -> Self {
        Self {
            client,
            store,
            loader,
            events,
            retry: RetryOptions::default(),
            outbox: None,
        }
    }

    pub fn with_retry_options(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// Route best-effort decision updates through an offline outbox so
    /// they are deferred instead of dropped while the store is unreachable
    pub fn with_outbox(mut self, outbox: Arc<Outbox>) -> Self {
        self.outbox = Some(outbox);
        self
    }

    /// Execute one experiment. On failure the experiment record is marked
    /// failed, a linked decision reverts to ready, exactly one failure
    /// notification is emitted, and the original error is returned.
    pub async fn execute(
        &self,
        options: ExecuteOptions,
    ) -> Result<ExperimentRunState, ExperimentError> {
        let mut run: Option<ExperimentRunState> = None;

        match self.try_execute(&options, &mut run).await {
            Ok(state) => Ok(state),
            Err(error) => {
                self.handle_failure(&options, run.as_mut(), &error).await;
                Err(error)
            }
        }
    }

    async fn try_execute(
        &self,
        options: &ExecuteOptions,
        run: &mut Option<ExperimentRunState>,
    ) -> Result<ExperimentRunState, ExperimentError> {
        // Config loads before anything remote: a failure here starts no work
        let config = self.loader.load(&options.config_ref)?;
        let total_personas = config.request.personas.count;

        let record_id = with_retry_classified(&self.retry, || async move {
            self.store
                .create_experiment(NewExperimentRecord {
                    project_id: options.project_id.clone(),
                    config_ref: options.config_ref.clone(),
                    total_personas,
                })
                .await
                .map_err(ExperimentError::from)
        })
        .await?;
        tracing::info!(experiment_id = %record_id, "Experiment record created");

        let state = run.insert(ExperimentRunState::new(record_id.clone(), total_personas));

        self.update_decision_best_effort(options, DecisionStatus::Running)
            .await;

        state.transition(ExperimentStatus::GeneratingPersonas);
        self.persist_status(&record_id, ExperimentStatus::GeneratingPersonas)
            .await?;

        self.consume_stream(&config, state).await?;

        state.transition(ExperimentStatus::Completed);

        // Durable artifact
        let report = ExperimentReport {
            experiment_id: record_id.clone(),
            config_ref: options.config_ref.clone(),
            completed_at: state.completed_at.unwrap_or_else(Utc::now),
            duration_seconds: state.duration_seconds(),
            results: state.results.clone(),
            metrics: state.metrics.clone(),
        };
        let artifact_path =
            artifact::write_report(&options.project_root, &config.results_dir, &config.name, &report)?;

        // Version control is desirable, never required: a failed commit
        // leaves the artifact on disk and the experiment completed
        let mut commit_id = None;
        if config.auto_commit {
            let message = format!("Add experiment results: {artifact_path}");
            match git::auto_commit(
                &options.project_root,
                std::slice::from_ref(&artifact_path),
                &message,
            ) {
                Ok(sha) => {
                    tracing::info!(commit = %sha, "Experiment results committed");
                    commit_id = Some(sha);
                }
                Err(e) => {
                    tracing::error!("Git commit failed: {e}");
                    tracing::warn!("Experiment results saved but not committed");
                }
            }
        }

        let outcome = ExperimentOutcome {
            results: state.results.clone(),
            metrics: state.metrics.clone(),
            artifact_path: Some(artifact_path.clone()),
            commit_id,
            duration_seconds: state.duration_seconds(),
        };
        let record_ref: &str = &record_id;
        let outcome_ref = &outcome;
        with_retry_classified(&self.retry, || async move {
            self.store
                .complete_experiment(record_ref, outcome_ref)
                .await
                .map_err(ExperimentError::from)
        })
        .await?;

        if let Some(decision_id) = &options.decision_id {
            self.store
                .update_decision(decision_id, DecisionStatus::Completed)
                .await
                .map_err(ExperimentError::from)?;
        }

        let _ = self.events.send(OrchestratorEvent::ExperimentCompleted {
            experiment_id: record_id,
            artifact_path: Some(artifact_path),
            metrics: state.metrics.clone(),
        });

        Ok(state.clone())
    }

    /// Run the streaming client and handle every event in wire order.
    async fn consume_stream(
        &self,
        config: &ExperimentConfig,
        state: &mut ExperimentRunState,
    ) -> Result<(), ExperimentError> {
        let (tx, mut rx) = mpsc::channel(32);
        let client = Arc::clone(&self.client);
        let request = config.request.clone();
        let stream = tokio::spawn(async move { client.run(request, tx).await });

        while let Some(event) = rx.recv().await {
            self.handle_event(event, state).await?;
        }

        match stream.await {
            Ok(result) => result.map_err(ExperimentError::from),
            Err(e) => Err(ExperimentError::Other(format!(
                "experiment stream task failed: {e}"
            ))),
        }
    }

    async fn handle_event(
        &self,
        event: StreamEvent,
        state: &mut ExperimentRunState,
    ) -> Result<(), ExperimentError> {
        match event {
            StreamEvent::Status { message, .. } => {
                tracing::info!(experiment_id = %state.experiment_id, "Status: {message}");
                if signals_running(&message)
                    && state.status.can_transition_to(ExperimentStatus::Running)
                {
                    state.transition(ExperimentStatus::Running);
                    let experiment_id = state.experiment_id.clone();
                    self.persist_status(&experiment_id, ExperimentStatus::Running)
                        .await?;
                }
            }

            StreamEvent::PersonaGenerated {
                name,
                archetype_name,
                ..
            } => {
                // Observability only; no state mutation
                tracing::debug!(persona = %name, archetype = %archetype_name, "Persona generated");
            }

            StreamEvent::ResponseComplete(response) => {
                state.record_response(response.clone());
                let _ = self.events.send(OrchestratorEvent::PersonaCompleted {
                    experiment_id: state.experiment_id.clone(),
                    response,
                    completed: state.completed_personas,
                    total: state.total_personas,
                });

                let experiment_id = state.experiment_id.clone();
                let id: &str = &experiment_id;
                let (completed, total) = (state.completed_personas, state.total_personas);
                with_retry_classified(&self.retry, || async move {
                    self.store
                        .record_progress(id, completed, total)
                        .await
                        .map_err(ExperimentError::from)
                })
                .await?;
            }

            StreamEvent::ExperimentComplete {
                results, metrics, ..
            } => {
                tracing::info!(
                    experiment_id = %state.experiment_id,
                    results = results.len(),
                    "Experiment complete, adopting authoritative results"
                );
                state.replace_results(results, metrics);
            }
        }
        Ok(())
    }

    async fn persist_status(
        &self,
        experiment_id: &str,
        status: ExperimentStatus,
    ) -> Result<(), ExperimentError> {
        with_retry_classified(&self.retry, || async move {
            self.store
                .update_status(experiment_id, status)
                .await
                .map_err(ExperimentError::from)
        })
        .await
    }

    async fn update_decision_best_effort(&self, options: &ExecuteOptions, status: DecisionStatus) {
        let Some(decision_id) = &options.decision_id else {
            return;
        };

        if let Some(outbox) = &self.outbox {
            outbox
                .send_or_enqueue(DeferredUpdate::DecisionStatus {
                    decision_id: decision_id.clone(),
                    status,
                })
                .await;
        } else if let Err(e) = self.store.update_decision(decision_id, status).await {
            tracing::warn!(
                "Failed to mark decision {decision_id} {}: {e}",
                status.as_str()
            );
        }
    }

    /// Compensations for a failed run. Secondary failures are logged and
    /// never mask the original error, which the caller re-throws verbatim.
    async fn handle_failure(
        &self,
        options: &ExecuteOptions,
        state: Option<&mut ExperimentRunState>,
        error: &ExperimentError,
    ) {
        tracing::error!("Experiment execution failed: {error}");

        let experiment_id = state
            .as_ref()
            .map(|s| s.experiment_id.clone())
            .unwrap_or_else(|| "unknown".to_string());

        if let Some(state) = state {
            if let Err(secondary) = self
                .store
                .fail_experiment(&state.experiment_id, &error.to_string())
                .await
            {
                tracing::error!(
                    "Failed to mark experiment {} failed: {secondary}",
                    state.experiment_id
                );
            }
            state.transition(ExperimentStatus::Failed);
        }

        // The linked decision goes back to ready so it can be re-run
        self.update_decision_best_effort(options, DecisionStatus::Ready)
            .await;

        let _ = self.events.send(OrchestratorEvent::ExperimentFailed {
            experiment_id,
            message: error.to_string(),
        });
    }
}

/// The compute service reports execution phases as free-text status
/// messages; the switch to the running state is detected by substring.
/// TODO: replace with an explicit phase field once the compute service
/// emits one.
fn signals_running(message: &str) -> bool {
    message.to_lowercase().contains("running")
}
