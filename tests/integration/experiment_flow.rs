//! End-to-end orchestration: real HTTP stream, file config loader,
//! in-memory record store, artifact on disk, git auto-commit.

use std::fs;
use std::sync::Arc;

use panelist::orchestrator::event_channel;
use panelist::{
    ExecuteOptions, ExperimentOrchestrator, ExperimentStatus, FileConfigLoader,
    InMemoryRecordStore, OrchestratorEvent, RetryOptions, StreamingExperimentClient,
};

use super::common::git_fixtures::TestRepo;
use super::common::happy_path_ndjson;
use super::common::stream_server::{ServerScript, StreamServer};

const CONFIG_TEMPLATE: &str = r#"{
    "name": "Pipeline Test",
    "results_dir": "results",
    "auto_commit": AUTO_COMMIT,
    "request": {
        "experiment_id": "exp-1",
        "personas": {
            "archetypes": [{"id": "arch-skeptic", "name": "Skeptical Buyer", "count": 1}],
            "count": 1
        },
        "stimulus": {"template": "Would you buy this?"},
        "execution": {"model": "claude-sonnet-4-5-20250929", "temperature": 0.7, "maxTokens": 500}
    }
}"#;

fn write_config(project_root: &std::path::Path, auto_commit: bool) {
    let experiments_dir = project_root.join("experiments");
    fs::create_dir_all(&experiments_dir).unwrap();
    fs::write(
        experiments_dir.join("pipeline.json"),
        CONFIG_TEMPLATE.replace("AUTO_COMMIT", if auto_commit { "true" } else { "false" }),
    )
    .unwrap();
}

#[tokio::test]
async fn test_full_pipeline_streams_persists_and_commits() {
    let repo = TestRepo::new();
    write_config(&repo.path, true);

    let server = StreamServer::start(ServerScript::Stream {
        body: happy_path_ndjson(),
        chunk_size: 13,
    })
    .await;

    let store = Arc::new(InMemoryRecordStore::new());
    let (events_tx, mut events_rx) = event_channel();
    let orchestrator = ExperimentOrchestrator::new(
        Arc::new(StreamingExperimentClient::new(server.endpoint())),
        store.clone(),
        Arc::new(FileConfigLoader::new(repo.path.join("experiments"))),
        events_tx,
    )
    .with_retry_options(RetryOptions::default().with_max_retries(0));

    let state = orchestrator
        .execute(ExecuteOptions {
            config_ref: "pipeline".into(),
            project_id: "proj-1".into(),
            project_root: repo.path.clone(),
            decision_id: None,
        })
        .await
        .expect("pipeline should complete");

    // State machine ran to completion
    assert_eq!(state.status, ExperimentStatus::Completed);
    assert_eq!(state.completed_personas, 1);

    // Record store agrees and carries the outcome
    let record = store.experiment(&state.experiment_id).unwrap();
    assert_eq!(record.status, ExperimentStatus::Completed);
    let outcome = record.outcome.unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].persona_name, "Dana Whitfield");

    // Artifact exists and matches the authoritative payload
    let artifact_path = outcome.artifact_path.unwrap();
    assert_eq!(artifact_path, "results/pipeline-test.json");
    let contents = fs::read_to_string(repo.path.join(&artifact_path)).unwrap();
    assert!(contents.contains("Show me the audit trail."));

    // Artifact was committed
    assert!(outcome.commit_id.is_some());
    assert_eq!(
        repo.head_message(),
        format!("Add experiment results: {artifact_path}")
    );

    // One persona notification, then exactly one terminal notification
    drop(orchestrator);
    let mut names = Vec::new();
    while let Some(event) = events_rx.recv().await {
        names.push(match event {
            OrchestratorEvent::PersonaCompleted { .. } => "persona",
            OrchestratorEvent::ExperimentCompleted { .. } => "completed",
            OrchestratorEvent::ExperimentFailed { .. } => "failed",
        });
    }
    assert_eq!(names, vec!["persona", "completed"]);
}

#[tokio::test]
async fn test_pipeline_failure_marks_record_failed() {
    let repo = TestRepo::new();
    write_config(&repo.path, false);

    let server = StreamServer::start(ServerScript::Error {
        status: 503,
        body: "runner rebooting".into(),
    })
    .await;

    let store = Arc::new(InMemoryRecordStore::new());
    let (events_tx, _events_rx) = event_channel();
    let orchestrator = ExperimentOrchestrator::new(
        Arc::new(StreamingExperimentClient::new(server.endpoint())),
        store.clone(),
        Arc::new(FileConfigLoader::new(repo.path.join("experiments"))),
        events_tx,
    )
    .with_retry_options(RetryOptions::default().with_max_retries(0));

    let error = orchestrator
        .execute(ExecuteOptions {
            config_ref: "pipeline".into(),
            project_id: "proj-1".into(),
            project_root: repo.path.clone(),
            decision_id: None,
        })
        .await
        .expect_err("503 must fail the run");

    // The record exists and is marked failed with the propagated message
    let records = store.experiments();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, ExperimentStatus::Failed);
    assert_eq!(
        records[0].failure_message.as_deref(),
        Some(error.to_string().as_str())
    );

    // No artifact was written
    assert!(!repo.path.join("results").exists());
}
