//! Offline queue durability and outbox drain across "process restarts"
//! (separate queue instances over the same storage file).

use std::sync::Arc;

use chrono::Duration;
use tempfile::TempDir;

use panelist::queue::{DeferredUpdate, JsonFileStorage, OfflineMessageQueue, Outbox};
use panelist::store::{DecisionStatus, InMemoryRecordStore};

fn file_queue(dir: &TempDir) -> OfflineMessageQueue {
    OfflineMessageQueue::new(
        Box::new(JsonFileStorage::new(dir.path().join("queue.json"))),
        50,
        Duration::days(7),
    )
}

#[tokio::test]
async fn test_deferred_updates_survive_restart_and_flush() {
    let dir = TempDir::new().unwrap();

    // First "process": the store is unreachable, so updates queue up.
    // An InMemoryRecordStore is always reachable, so enqueue directly to
    // simulate the deferred path.
    {
        let queue = file_queue(&dir);
        queue.enqueue(
            serde_json::to_value(DeferredUpdate::DecisionStatus {
                decision_id: "dec-1".into(),
                status: DecisionStatus::Ready,
            })
            .unwrap(),
        );
        queue.enqueue(
            serde_json::to_value(DeferredUpdate::DecisionStatus {
                decision_id: "dec-2".into(),
                status: DecisionStatus::Completed,
            })
            .unwrap(),
        );
    }

    // Second "process": drain against a reachable store
    let store = Arc::new(InMemoryRecordStore::new());
    let outbox = Outbox::new(file_queue(&dir), store.clone());

    assert_eq!(outbox.pending().len(), 2);
    let delivered = outbox.flush().await;

    assert_eq!(delivered, 2);
    assert!(outbox.pending().is_empty());
    assert_eq!(store.decision_status("dec-1"), Some(DecisionStatus::Ready));
    assert_eq!(
        store.decision_status("dec-2"),
        Some(DecisionStatus::Completed)
    );

    // Third "process": the flushed queue stays empty
    let reloaded = file_queue(&dir);
    assert!(reloaded.is_empty());
}

#[tokio::test]
async fn test_unreadable_entries_are_dropped_on_flush() {
    let dir = TempDir::new().unwrap();

    {
        let queue = file_queue(&dir);
        queue.enqueue(serde_json::json!({"op": "archive_project"}));
        queue.enqueue(
            serde_json::to_value(DeferredUpdate::DecisionStatus {
                decision_id: "dec-1".into(),
                status: DecisionStatus::Ready,
            })
            .unwrap(),
        );
    }

    let store = Arc::new(InMemoryRecordStore::new());
    let outbox = Outbox::new(file_queue(&dir), store.clone());

    // The unknown operation is dropped; the valid one still delivers
    let delivered = outbox.flush().await;
    assert_eq!(delivered, 1);
    assert!(outbox.pending().is_empty());
    assert_eq!(store.decision_status("dec-1"), Some(DecisionStatus::Ready));
}
