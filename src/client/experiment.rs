//! Streaming client for the persona-experiment compute service.
//!
//! Sends one [`ExperimentRequest`] as a POST body and incrementally decodes
//! the NDJSON response stream, delivering events over a channel strictly in
//! wire order. A malformed line is logged and skipped; it never aborts the
//! stream or drops the events that follow it.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::events::{ExperimentRequest, StreamEvent};
use crate::client::ndjson::NdjsonDecoder;

/// Default hard timeout for a full experiment stream
pub const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(600);

/// Errors thrown by the streaming client. Per-line parse failures are not
/// errors; they are recovered locally inside the read loop.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("Compute service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Compute service rate limited the request")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Response contained no body")]
    NoBody,

    #[error("Experiment stream timed out after {0:?}")]
    Timeout(Duration),

    #[error("Experiment stream cancelled")]
    Cancelled,

    #[error("Network error: {0}")]
    Network(String),
}

/// Seam for the orchestrator: anything that can run an experiment and push
/// its events, in order, into a channel.
#[async_trait]
pub trait ExperimentClient: Send + Sync {
    /// Run one experiment to completion. Every decoded event is sent
    /// (awaited) before the next line is read, so receivers observe exact
    /// wire order. Returns once the stream ends or fails.
    async fn run(
        &self,
        request: ExperimentRequest,
        events: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ClientError>;
}

/// HTTP NDJSON streaming client.
pub struct StreamingExperimentClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    cancel: CancellationToken,
}

impl StreamingExperimentClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            timeout: DEFAULT_STREAM_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    /// Override the hard stream timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attach an external cancellation token. Cancelling it closes the
    /// stream cleanly; cancelling after the stream completed is a no-op.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    async fn stream_events(
        &self,
        request: &ExperimentRequest,
        events: &mpsc::Sender<StreamEvent>,
    ) -> Result<(), ClientError> {
        tracing::info!(
            experiment_id = %request.experiment_id,
            endpoint = %self.endpoint,
            "Starting experiment stream"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);

            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(ClientError::RateLimited { retry_after });
            }
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let mut stream = response.bytes_stream();
        let mut decoder = NdjsonDecoder::new();
        let mut saw_bytes = false;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ClientError::Network(e.to_string()))?;
            saw_bytes = saw_bytes || !chunk.is_empty();

            for line in decoder.feed(&chunk) {
                if !dispatch_line(&line, events).await {
                    tracing::debug!("Event receiver dropped, closing stream");
                    return Ok(());
                }
            }
        }

        if !saw_bytes {
            return Err(ClientError::NoBody);
        }

        // Stream ended; flush any buffered trailing line
        if let Some(line) = decoder.finish() {
            dispatch_line(&line, events).await;
        }

        Ok(())
    }
}

/// Parse one NDJSON line and deliver it. Returns false when the receiver
/// has been dropped and reading should stop.
async fn dispatch_line(line: &str, events: &mpsc::Sender<StreamEvent>) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return true;
    }

    tracing::trace!("NDJSON raw line: {trimmed}");

    match serde_json::from_str::<StreamEvent>(trimmed) {
        Ok(event) => {
            tracing::debug!(event = event.event_type_name(), "Stream event received");
            events.send(event).await.is_ok()
        }
        Err(e) => {
            tracing::warn!("Failed to parse NDJSON line: {e}. Line: {trimmed}");
            // Continue processing - don't fail on single parse error
            true
        }
    }
}

#[async_trait]
impl ExperimentClient for StreamingExperimentClient {
    async fn run(
        &self,
        request: ExperimentRequest,
        events: mpsc::Sender<StreamEvent>,
    ) -> Result<(), ClientError> {
        // Dropping the stream future on timeout or cancellation aborts the
        // in-flight request and releases the connection.
        tokio::select! {
            result = self.stream_events(&request, &events) => result,
            _ = self.cancel.cancelled() => {
                tracing::info!(experiment_id = %request.experiment_id, "Experiment stream cancelled");
                Err(ClientError::Cancelled)
            }
            _ = tokio::time::sleep(self.timeout) => {
                tracing::warn!(
                    experiment_id = %request.experiment_id,
                    timeout_s = self.timeout.as_secs(),
                    "Experiment stream timed out"
                );
                Err(ClientError::Timeout(self.timeout))
            }
        }
    }
}
