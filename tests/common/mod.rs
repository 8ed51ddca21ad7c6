//! Shared test utilities for Panelist
//!
//! This module provides common helpers for integration tests:
//! - An NDJSON streaming server fixture
//! - Git repository fixtures
//! - Canned stream event payloads

pub mod git_fixtures;
pub mod stream_server;

/// A realistic happy-path NDJSON document: status, persona_generated,
/// running status, response_complete, experiment_complete.
pub fn happy_path_ndjson() -> String {
    [
        r#"{"type":"status","message":"Generating personas...","experiment_id":"exp-1"}"#,
        r#"{"type":"persona_generated","experiment_id":"exp-1","persona_id":"p-001","name":"Dana Whitfield","role":"VP Engineering","archetype_id":"arch-skeptic","archetype_name":"Skeptical Buyer"}"#,
        r#"{"type":"status","message":"Running 1 persona responses in parallel...","experiment_id":"exp-1"}"#,
        r#"{"type":"response_complete","experiment_id":"exp-1","persona_id":"p-001","persona_name":"Dana Whitfield","archetype_id":"arch-skeptic","archetype_name":"Skeptical Buyer","response":"Show me the audit trail.","sentiment":0.9,"tokens":{"input":412,"output":96},"error":null}"#,
        r#"{"type":"experiment_complete","experiment_id":"exp-1","results":[{"persona_id":"p-001","persona_name":"Dana Whitfield","archetype_id":"arch-skeptic","archetype_name":"Skeptical Buyer","response":"Show me the audit trail.","sentiment":0.9,"tokens":{"input":412,"output":96},"error":null}],"metrics":{"total_personas":1,"successful_responses":1,"failed_responses":0,"avg_sentiment":0.9,"archetype_sentiments":{"Skeptical Buyer":0.9},"total_tokens":{"input":412,"output":96},"elapsed_seconds":4.2}}"#,
    ]
    .map(|line| format!("{line}\n"))
    .concat()
}
