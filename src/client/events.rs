//! Wire types for the persona-experiment compute service.
//!
//! The service accepts one [`ExperimentRequest`] as a POST body and answers
//! with a chunked NDJSON stream, one [`StreamEvent`] per line.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ============================================================================
// Request
// ============================================================================

/// Immutable experiment specification sent to the compute service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentRequest {
    /// Unique experiment identifier echoed back in every stream event
    #[serde(default)]
    pub experiment_id: String,
    /// Archetype definitions and persona generation settings
    pub personas: PersonaGenerationConfig,
    /// The resolved stimulus prompt
    pub stimulus: StimulusConfig,
    /// Model and execution settings
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Uploaded context file references, when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

/// Persona generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaGenerationConfig {
    pub archetypes: Vec<Archetype>,
    /// Total persona count across all archetypes
    pub count: u32,
    #[serde(rename = "generationType", default = "default_generation_type")]
    pub generation_type: String,
}

fn default_generation_type() -> String {
    "standard".to_string()
}

/// A persona archetype definition. The compute service interprets the
/// free-form attributes; the client passes them through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Archetype {
    pub id: String,
    pub name: String,
    pub count: u32,
    #[serde(flatten)]
    pub attributes: serde_json::Value,
}

/// Stimulus prompt configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StimulusConfig {
    /// Fully resolved stimulus text
    pub template: String,
}

/// Model and execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionConfig {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Per-response timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5-20250929".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            timeout: None,
        }
    }
}

// ============================================================================
// Stream events
// ============================================================================

/// One NDJSON line from the compute service.
///
/// Closed set: a line whose `type` discriminator is not one of these four
/// variants fails to decode and is skipped by the stream reader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Free-text progress update
    Status {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        experiment_id: Option<String>,
    },

    /// A persona was generated from an archetype
    PersonaGenerated {
        persona_id: String,
        name: String,
        #[serde(default)]
        role: Option<String>,
        #[serde(default)]
        archetype_id: String,
        #[serde(default)]
        archetype_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        experiment_id: Option<String>,
    },

    /// One persona finished responding to the stimulus
    ResponseComplete(PersonaResponse),

    /// All personas finished; payload carries the authoritative result set
    ExperimentComplete {
        #[serde(default)]
        experiment_id: String,
        results: Vec<PersonaResponse>,
        metrics: ExperimentMetrics,
    },
}

impl StreamEvent {
    /// Human-readable event type name for logging
    pub fn event_type_name(&self) -> &'static str {
        match self {
            StreamEvent::Status { .. } => "status",
            StreamEvent::PersonaGenerated { .. } => "persona_generated",
            StreamEvent::ResponseComplete(_) => "response_complete",
            StreamEvent::ExperimentComplete { .. } => "experiment_complete",
        }
    }
}

/// A single persona's response to the stimulus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaResponse {
    pub persona_id: String,
    pub persona_name: String,
    #[serde(default)]
    pub archetype_id: String,
    #[serde(default)]
    pub archetype_name: String,
    /// Response text; None when the persona's execution failed
    #[serde(default)]
    pub response: Option<String>,
    /// Sentiment score in [-1.0, 1.0]
    pub sentiment: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Token usage for a single response or a whole experiment.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: i64,
    pub output: i64,
}

/// Aggregate metrics reported by the `experiment_complete` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentMetrics {
    pub total_personas: u32,
    pub successful_responses: u32,
    pub failed_responses: u32,
    pub avg_sentiment: f64,
    #[serde(default)]
    pub archetype_sentiments: HashMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<TokenUsage>,
    #[serde(default)]
    pub elapsed_seconds: f64,
}
