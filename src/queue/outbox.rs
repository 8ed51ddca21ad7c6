//! Deferred system-of-record updates.
//!
//! When the record store is unreachable, best-effort updates are parked in
//! the offline queue and drained later instead of being lost. Only
//! retryable failures are deferred; a rejected update will never succeed,
//! so it is dropped with a warning.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::queue::{OfflineMessageQueue, QueuedMessage};
use crate::store::{DecisionStatus, RecordStore, StoreError};

/// A record-store operation that can be serialized into the offline queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum DeferredUpdate {
    DecisionStatus {
        decision_id: String,
        status: DecisionStatus,
    },
    ExperimentProgress {
        experiment_id: String,
        completed: u32,
        total: u32,
    },
    ExperimentFailed {
        experiment_id: String,
        message: String,
    },
}

impl DeferredUpdate {
    fn describe(&self) -> String {
        match self {
            DeferredUpdate::DecisionStatus {
                decision_id,
                status,
            } => format!("decision {decision_id} -> {}", status.as_str()),
            DeferredUpdate::ExperimentProgress {
                experiment_id,
                completed,
                total,
            } => format!("experiment {experiment_id} progress {completed}/{total}"),
            DeferredUpdate::ExperimentFailed { experiment_id, .. } => {
                format!("experiment {experiment_id} failed")
            }
        }
    }
}

/// Send-or-defer front for the record store.
pub struct Outbox {
    queue: OfflineMessageQueue,
    store: Arc<dyn RecordStore>,
}

impl Outbox {
    pub fn new(queue: OfflineMessageQueue, store: Arc<dyn RecordStore>) -> Self {
        Self { queue, store }
    }

    /// Attempt the update now; on a retryable failure, park it in the
    /// queue for a later flush. Permanent failures are dropped.
    pub async fn send_or_enqueue(&self, update: DeferredUpdate) {
        match self.apply(&update).await {
            Ok(()) => {}
            Err(err) if err.is_retryable() => {
                tracing::info!("Deferring update ({}): {err}", update.describe());
                let payload = match serde_json::to_value(&update) {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::error!("Failed to serialize deferred update: {e}");
                        return;
                    }
                };
                self.queue.enqueue(payload);
            }
            Err(err) => {
                tracing::warn!(
                    "Dropping non-retryable update ({}): {err}",
                    update.describe()
                );
            }
        }
    }

    /// Drain queued updates in FIFO order. Stops at the first retryable
    /// failure (the head keeps its place and its retry count grows);
    /// corrupt or permanently rejected entries are dropped. Returns the
    /// number of updates delivered.
    pub async fn flush(&self) -> usize {
        let mut delivered = 0;

        while let Some(entry) = self.queue.peek() {
            match serde_json::from_value::<DeferredUpdate>(entry.message.clone()) {
                Ok(update) => match self.apply(&update).await {
                    Ok(()) => {
                        self.queue.dequeue(entry.id);
                        delivered += 1;
                    }
                    Err(err) if err.is_retryable() => {
                        self.queue.mark_failed(entry.id, &err.to_string());
                        tracing::info!(
                            "Flush paused, store still unavailable: {err} ({} delivered)",
                            delivered
                        );
                        break;
                    }
                    Err(err) => {
                        tracing::warn!("Dropping rejected queued update: {err}");
                        self.queue.dequeue(entry.id);
                    }
                },
                Err(e) => {
                    tracing::warn!("Dropping unreadable queued update: {e}");
                    self.queue.dequeue(entry.id);
                }
            }
        }

        delivered
    }

    /// Live queue contents, for `queue status`
    pub fn pending(&self) -> Vec<QueuedMessage> {
        self.queue.messages()
    }

    async fn apply(&self, update: &DeferredUpdate) -> Result<(), StoreError> {
        match update {
            DeferredUpdate::DecisionStatus {
                decision_id,
                status,
            } => self.store.update_decision(decision_id, *status).await,
            DeferredUpdate::ExperimentProgress {
                experiment_id,
                completed,
                total,
            } => {
                self.store
                    .record_progress(experiment_id, *completed, *total)
                    .await
            }
            DeferredUpdate::ExperimentFailed {
                experiment_id,
                message,
            } => self.store.fail_experiment(experiment_id, message).await,
        }
    }
}
