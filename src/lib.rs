pub mod artifact;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod git;
pub mod orchestrator;
pub mod queue;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod util;

pub use client::{
    ClientError, ExperimentClient, ExperimentMetrics, ExperimentRequest, NdjsonDecoder,
    PersonaResponse, StreamEvent, StreamingExperimentClient,
};
pub use config::{ConfigError, ConfigLoader, ExperimentConfig, FileConfigLoader, Settings};
pub use error::{classify, ErrorAdvice, ErrorKind, ExperimentError};
pub use orchestrator::{
    event_channel, ExecuteOptions, ExperimentOrchestrator, ExperimentRunState, ExperimentStatus,
    OrchestratorEvent,
};
pub use queue::{DeferredUpdate, OfflineMessageQueue, Outbox, QueuedMessage};
pub use retry::{with_retry, with_retry_classified, with_retry_observed, RetryOptions};
pub use scheduler::UploadScheduler;
pub use store::{
    DecisionStatus, ExperimentOutcome, InMemoryRecordStore, NewExperimentRecord, RecordStore,
    StoreError,
};
