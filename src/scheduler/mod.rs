//! Bounded-concurrency scheduler for long-running uploads.
//!
//! Admits at most N operations at once; excess submissions queue FIFO and
//! drain as slots free up. `submit` never blocks the caller, and a failing
//! (even panicking) operation always releases its slot.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;

type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

struct SchedulerState {
    running: usize,
    queued: VecDeque<BoxedTask>,
}

struct Inner {
    max_concurrent: usize,
    state: Mutex<SchedulerState>,
}

/// Process-wide upload scheduler. Cheap to clone; clones share slots.
#[derive(Clone)]
pub struct UploadScheduler {
    inner: Arc<Inner>,
}

impl UploadScheduler {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                max_concurrent: max_concurrent.max(1),
                state: Mutex::new(SchedulerState {
                    running: 0,
                    queued: VecDeque::new(),
                }),
            }),
        }
    }

    /// Submit an operation. Runs immediately when a slot is free, otherwise
    /// queues behind earlier submissions. Never blocks.
    pub fn submit<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task: BoxedTask = Box::pin(task);
        let mut state = self.inner.state.lock();
        if state.running < self.inner.max_concurrent {
            state.running += 1;
            drop(state);
            Self::spawn(self.inner.clone(), task);
        } else {
            tracing::debug!(
                queued = state.queued.len() + 1,
                "Upload slots full, queueing submission"
            );
            state.queued.push_back(task);
        }
    }

    /// Submit an operation and receive its result when it completes.
    /// The receiver errors if the operation panicked.
    pub fn submit_with_result<T, F>(&self, task: F) -> oneshot::Receiver<T>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.submit(async move {
            let _ = tx.send(task.await);
        });
        rx
    }

    fn spawn(inner: Arc<Inner>, task: BoxedTask) {
        tokio::spawn(async move {
            // A panicking upload must still free its slot
            if std::panic::AssertUnwindSafe(task)
                .catch_unwind()
                .await
                .is_err()
            {
                tracing::error!("Scheduled upload panicked");
            }
            Self::on_slot_free(inner);
        });
    }

    /// Hand the freed slot to the next queued task, or shrink the running
    /// count when the queue is empty.
    fn on_slot_free(inner: Arc<Inner>) {
        let next = {
            let mut state = inner.state.lock();
            match state.queued.pop_front() {
                Some(task) => Some(task),
                None => {
                    state.running -= 1;
                    None
                }
            }
        };
        if let Some(task) = next {
            Self::spawn(inner, task);
        }
    }

    /// Number of operations currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().running
    }

    /// Number of submissions waiting for a slot
    pub fn queued(&self) -> usize {
        self.inner.state.lock().queued.len()
    }
}
