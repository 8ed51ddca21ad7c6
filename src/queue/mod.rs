//! Durable offline message queue.
//!
//! A capacity- and age-bounded FIFO for operations that could not be sent
//! while offline. State is written back to storage immediately after every
//! mutation so it survives a crash or restart.

pub mod outbox;
pub mod storage;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use outbox::{DeferredUpdate, Outbox};
pub use storage::{JsonFileStorage, MemoryStorage, QueueStorage};

/// Default maximum number of queued messages
pub const DEFAULT_CAPACITY: usize = 50;

/// Default message time-to-live in days
pub const DEFAULT_TTL_DAYS: i64 = 7;

/// One deferred operation awaiting delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedMessage {
    pub id: Uuid,
    /// Opaque operation payload
    pub message: serde_json::Value,
    /// Enqueue time, used for TTL expiry
    pub timestamp: DateTime<Utc>,
    /// Delivery attempts that have failed so far
    #[serde(default)]
    pub retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Durable FIFO with capacity eviction and TTL pruning.
pub struct OfflineMessageQueue {
    storage: Box<dyn QueueStorage>,
    capacity: usize,
    ttl: Duration,
    entries: Mutex<Vec<QueuedMessage>>,
}

impl OfflineMessageQueue {
    pub fn new(storage: Box<dyn QueueStorage>, capacity: usize, ttl: Duration) -> Self {
        let entries = storage.load();
        Self {
            storage,
            capacity: capacity.max(1),
            ttl,
            entries: Mutex::new(entries),
        }
    }

    /// Queue with default capacity and TTL
    pub fn with_defaults(storage: Box<dyn QueueStorage>) -> Self {
        Self::new(storage, DEFAULT_CAPACITY, Duration::days(DEFAULT_TTL_DAYS))
    }

    /// Append a message, evicting the oldest entry first when full.
    /// Returns the new message's id.
    pub fn enqueue(&self, message: serde_json::Value) -> Uuid {
        let mut entries = self.entries.lock();
        Self::prune_expired(&mut entries, self.ttl);

        while entries.len() >= self.capacity {
            let evicted = entries.remove(0);
            tracing::warn!(
                id = %evicted.id,
                "Offline queue at capacity, evicting oldest message"
            );
        }

        let entry = QueuedMessage {
            id: Uuid::new_v4(),
            message,
            timestamp: Utc::now(),
            retries: 0,
            last_error: None,
        };
        let id = entry.id;
        entries.push(entry);
        self.persist(&entries);
        id
    }

    /// Head of the queue without removing it. Expired entries are pruned
    /// (and the pruned state persisted) before the head is taken.
    pub fn peek(&self) -> Option<QueuedMessage> {
        let mut entries = self.entries.lock();
        if Self::prune_expired(&mut entries, self.ttl) {
            self.persist(&entries);
        }
        entries.first().cloned()
    }

    /// Remove a message by id. Returns the removed message; None (a no-op)
    /// when the id is not queued.
    pub fn dequeue(&self, id: Uuid) -> Option<QueuedMessage> {
        let mut entries = self.entries.lock();
        let position = entries.iter().position(|entry| entry.id == id)?;
        let removed = entries.remove(position);
        self.persist(&entries);
        Some(removed)
    }

    /// Record a failed delivery attempt; the message stays queued.
    pub fn mark_failed(&self, id: Uuid, error: &str) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.iter_mut().find(|entry| entry.id == id) {
            entry.retries += 1;
            entry.last_error = Some(error.to_string());
            self.persist(&entries);
        }
    }

    /// Number of live (pruned) entries
    pub fn len(&self) -> usize {
        let mut entries = self.entries.lock();
        if Self::prune_expired(&mut entries, self.ttl) {
            self.persist(&entries);
        }
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all live entries, oldest first
    pub fn messages(&self) -> Vec<QueuedMessage> {
        let mut entries = self.entries.lock();
        if Self::prune_expired(&mut entries, self.ttl) {
            self.persist(&entries);
        }
        entries.clone()
    }

    fn prune_expired(entries: &mut Vec<QueuedMessage>, ttl: Duration) -> bool {
        let cutoff = Utc::now() - ttl;
        let before = entries.len();
        entries.retain(|entry| entry.timestamp > cutoff);
        let pruned = before - entries.len();
        if pruned > 0 {
            tracing::debug!(pruned, "Dropped expired offline messages");
        }
        pruned > 0
    }

    fn persist(&self, entries: &[QueuedMessage]) {
        // The queue itself never throws; a failed write costs durability,
        // not correctness of the in-memory state.
        if let Err(e) = self.storage.save(entries) {
            tracing::error!("Failed to persist offline queue: {e}");
        }
    }
}
