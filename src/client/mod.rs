pub mod events;
pub mod experiment;
pub mod mock;
pub mod ndjson;

pub use events::{
    Archetype, ExecutionConfig, ExperimentMetrics, ExperimentRequest, PersonaGenerationConfig,
    PersonaResponse, StimulusConfig, StreamEvent, TokenUsage,
};
pub use experiment::{ClientError, ExperimentClient, StreamingExperimentClient};
pub use ndjson::NdjsonDecoder;
