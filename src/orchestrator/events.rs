//! Notifications emitted by the orchestrator.
//!
//! Consumers (CLI output, UI layers) receive these over an unbounded
//! channel. Exactly one terminal notification — completed or failed — is
//! emitted per execution.

use tokio::sync::mpsc;

use crate::client::events::{ExperimentMetrics, PersonaResponse};

/// Progress and terminal notifications for one experiment execution.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    /// One persona finished responding
    PersonaCompleted {
        experiment_id: String,
        response: PersonaResponse,
        completed: u32,
        total: u32,
    },

    /// The experiment finished; terminal
    ExperimentCompleted {
        experiment_id: String,
        artifact_path: Option<String>,
        metrics: Option<ExperimentMetrics>,
    },

    /// The experiment failed; terminal. `experiment_id` is "unknown" when
    /// the failure happened before a record was created.
    ExperimentFailed {
        experiment_id: String,
        message: String,
    },
}

pub type EventSender = mpsc::UnboundedSender<OrchestratorEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<OrchestratorEvent>;

/// Build a notification channel pair
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
