//! Mock experiment client for deterministic testing
//!
//! Implements the ExperimentClient trait to emit pre-configured stream
//! events without real HTTP. Use this for orchestrator tests that need to
//! verify full execution flows, including mid-stream failures.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::client::events::{ExperimentRequest, StreamEvent};
use crate::client::experiment::{ClientError, ExperimentClient};

/// Failure to simulate at a scripted point in the stream
#[derive(Clone, Debug)]
pub enum MockFailure {
    Api { status: u16, body: String },
    RateLimited { retry_after_secs: Option<u64> },
    NoBody,
    Timeout(u64),
    Cancelled,
    Network(String),
}

impl MockFailure {
    fn into_client_error(self) -> ClientError {
        match self {
            MockFailure::Api { status, body } => ClientError::Api { status, body },
            MockFailure::RateLimited { retry_after_secs } => ClientError::RateLimited {
                retry_after: retry_after_secs.map(Duration::from_secs),
            },
            MockFailure::NoBody => ClientError::NoBody,
            MockFailure::Timeout(secs) => ClientError::Timeout(Duration::from_secs(secs)),
            MockFailure::Cancelled => ClientError::Cancelled,
            MockFailure::Network(msg) => ClientError::Network(msg),
        }
    }
}

/// Configuration for mock client behavior
#[derive(Clone, Default)]
pub struct MockClientConfig {
    /// Events to emit, in order
    pub events: Vec<StreamEvent>,
    /// Delay between events (simulates streaming)
    pub event_delay: Duration,
    /// Fail before emitting any event
    pub fail_before_events: Option<MockFailure>,
    /// Fail after all events were emitted
    pub fail_after_events: Option<MockFailure>,
}

impl MockClientConfig {
    pub fn with_events(mut self, events: Vec<StreamEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.event_delay = delay;
        self
    }

    pub fn failing_before_events(mut self, failure: MockFailure) -> Self {
        self.fail_before_events = Some(failure);
        self
    }

    pub fn failing_after_events(mut self, failure: MockFailure) -> Self {
        self.fail_after_events = Some(failure);
        self
    }
}

/// Scripted ExperimentClient
#[derive(Default)]
pub struct MockExperimentClient {
    config: MockClientConfig,
    /// Requests captured from run() calls, for assertions
    requests: Mutex<Vec<ExperimentRequest>>,
}

impl MockExperimentClient {
    pub fn new(config: MockClientConfig) -> Self {
        Self {
            config,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far
    pub fn captured_requests(&self) -> Vec<ExperimentRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ExperimentClient for MockExperimentClient {
    async fn run(
        &self,
        request: ExperimentRequest,
        events: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ClientError> {
        self.requests.lock().push(request);

        if let Some(failure) = self.config.fail_before_events.clone() {
            return Err(failure.into_client_error());
        }

        for event in self.config.events.clone() {
            if !self.config.event_delay.is_zero() {
                tokio::time::sleep(self.config.event_delay).await;
            }
            if events.send(event).await.is_err() {
                // Receiver dropped, exit gracefully
                return Ok(());
            }
        }

        if let Some(failure) = self.config.fail_after_events.clone() {
            return Err(failure.into_client_error());
        }

        Ok(())
    }
}
