//! Integration tests for the streaming experiment client against a real
//! HTTP server streaming chunked NDJSON.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use panelist::client::{
    ClientError, ExperimentClient, ExperimentRequest, StreamEvent, StreamingExperimentClient,
};

use super::common::stream_server::{ServerScript, StreamServer};
use super::common::happy_path_ndjson;

fn sample_request() -> ExperimentRequest {
    serde_json::from_value(serde_json::json!({
        "experiment_id": "exp-1",
        "personas": {
            "archetypes": [{"id": "arch-skeptic", "name": "Skeptical Buyer", "count": 1}],
            "count": 1
        },
        "stimulus": {"template": "Would you buy this?"},
        "execution": {"model": "claude-sonnet-4-5-20250929", "temperature": 0.7, "maxTokens": 500}
    }))
    .expect("valid request")
}

async fn collect_events(
    client: &StreamingExperimentClient,
) -> (Vec<StreamEvent>, Result<(), ClientError>) {
    let (tx, mut rx) = mpsc::channel(8);
    let run = client.run(sample_request(), tx);
    let collector = async {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    };
    let (result, events) = tokio::join!(run, collector);
    (events, result)
}

#[tokio::test]
async fn test_events_delivered_in_wire_order() {
    let server = StreamServer::start(ServerScript::Stream {
        body: happy_path_ndjson(),
        chunk_size: 4096,
    })
    .await;

    let client = StreamingExperimentClient::new(server.endpoint());
    let (events, result) = collect_events(&client).await;

    result.expect("stream should succeed");
    let names: Vec<_> = events.iter().map(|e| e.event_type_name()).collect();
    assert_eq!(
        names,
        vec![
            "status",
            "persona_generated",
            "status",
            "response_complete",
            "experiment_complete"
        ]
    );
}

#[tokio::test]
async fn test_tiny_chunks_produce_identical_events() {
    // 7-byte chunks cut lines and multi-byte sequences arbitrarily
    let server = StreamServer::start(ServerScript::Stream {
        body: happy_path_ndjson(),
        chunk_size: 7,
    })
    .await;

    let client = StreamingExperimentClient::new(server.endpoint());
    let (events, result) = collect_events(&client).await;

    result.expect("stream should succeed");
    assert_eq!(events.len(), 5);
    match &events[4] {
        StreamEvent::ExperimentComplete { results, metrics, .. } => {
            assert_eq!(results.len(), 1);
            assert_eq!(metrics.successful_responses, 1);
        }
        other => panic!("Expected ExperimentComplete, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_line_does_not_drop_later_events() {
    let body = concat!(
        r#"{"type":"status","message":"Generating personas..."}"#,
        "\n",
        "{this is not json}\n",
        r#"{"type":"status","message":"Running 2 persona responses in parallel..."}"#,
        "\n",
    )
    .to_string();
    let server = StreamServer::start(ServerScript::Stream {
        body,
        chunk_size: 11,
    })
    .await;

    let client = StreamingExperimentClient::new(server.endpoint());
    let (events, result) = collect_events(&client).await;

    result.expect("one bad line must not abort the stream");
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[1], StreamEvent::Status { message, .. }
        if message.contains("Running")));
}

#[tokio::test]
async fn test_final_line_without_newline_is_flushed() {
    let body = r#"{"type":"status","message":"Generating personas..."}"#.to_string();
    let server = StreamServer::start(ServerScript::Stream {
        body,
        chunk_size: 9,
    })
    .await;

    let client = StreamingExperimentClient::new(server.endpoint());
    let (events, result) = collect_events(&client).await;

    result.expect("stream should succeed");
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn test_error_status_carries_body_text() {
    let server = StreamServer::start(ServerScript::Error {
        status: 500,
        body: "Experiment runner crashed".into(),
    })
    .await;

    let client = StreamingExperimentClient::new(server.endpoint());
    let (events, result) = collect_events(&client).await;

    assert!(events.is_empty());
    match result {
        Err(ClientError::Api { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "Experiment runner crashed");
        }
        other => panic!("Expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limit_is_distinct() {
    let server = StreamServer::start(ServerScript::Error {
        status: 429,
        body: "slow down".into(),
    })
    .await;

    let client = StreamingExperimentClient::new(server.endpoint());
    let (_, result) = collect_events(&client).await;

    assert!(matches!(result, Err(ClientError::RateLimited { .. })));
}

#[tokio::test]
async fn test_empty_body_is_no_body_error() {
    let server = StreamServer::start(ServerScript::Empty).await;

    let client = StreamingExperimentClient::new(server.endpoint());
    let (events, result) = collect_events(&client).await;

    assert!(events.is_empty());
    assert!(matches!(result, Err(ClientError::NoBody)));
}

#[tokio::test]
async fn test_timeout_is_distinct_from_network_errors() {
    let server = StreamServer::start(ServerScript::Stall).await;

    let client = StreamingExperimentClient::new(server.endpoint())
        .with_timeout(Duration::from_millis(200));
    let (_, result) = collect_events(&client).await;

    assert!(matches!(result, Err(ClientError::Timeout(_))));
}

#[tokio::test]
async fn test_cancellation_closes_stream_cleanly() {
    let server = StreamServer::start(ServerScript::Stall).await;

    let cancel = CancellationToken::new();
    let client =
        StreamingExperimentClient::new(server.endpoint()).with_cancellation(cancel.clone());

    let handle = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    });

    let (_, result) = collect_events(&client).await;
    assert!(matches!(result, Err(ClientError::Cancelled)));

    // Cancelling again after completion is a no-op
    cancel.cancel();
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Nothing is listening on this port
    let client = StreamingExperimentClient::new("http://127.0.0.1:1/run-experiment");
    let (_, result) = collect_events(&client).await;

    assert!(matches!(result, Err(ClientError::Network(_))));
}
