//! NDJSON streaming server fixture.
//!
//! Serves a scripted response body as a chunked stream so client tests
//! exercise real HTTP framing, including chunk boundaries that fall
//! mid-line and mid-codepoint.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use futures::stream;
use futures::StreamExt;

/// How the fixture server answers the experiment request.
#[derive(Clone)]
pub enum ServerScript {
    /// Stream the body split into chunks of `chunk_size` bytes, with a
    /// short pause between chunks
    Stream { body: String, chunk_size: usize },
    /// Answer with a plain-text error status
    Error { status: u16, body: String },
    /// Accept the request and then stall longer than any client timeout
    Stall,
    /// 200 with a completely empty body
    Empty,
}

/// Running fixture server; the bound address lives as long as the task.
pub struct StreamServer {
    pub addr: SocketAddr,
}

impl StreamServer {
    /// Spawn the server on an ephemeral port.
    pub async fn start(script: ServerScript) -> Self {
        let app = Router::new().route(
            "/run-experiment",
            post(move || respond(script.clone())),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fixture server");
        let addr = listener.local_addr().expect("Missing local addr");

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr }
    }

    /// Endpoint URL for the experiment route
    pub fn endpoint(&self) -> String {
        format!("http://{}/run-experiment", self.addr)
    }
}

async fn respond(script: ServerScript) -> Response {
    match script {
        ServerScript::Stream { body, chunk_size } => {
            let chunks: Vec<Result<Vec<u8>, Infallible>> = body
                .as_bytes()
                .chunks(chunk_size.max(1))
                .map(|chunk| Ok(chunk.to_vec()))
                .collect();

            let stream = stream::iter(chunks).then(|chunk| async move {
                // Force distinct write boundaries
                tokio::time::sleep(Duration::from_millis(2)).await;
                chunk
            });
            Body::from_stream(stream).into_response()
        }
        ServerScript::Error { status, body } => (
            StatusCode::from_u16(status).expect("valid status"),
            body,
        )
            .into_response(),
        ServerScript::Stall => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            StatusCode::OK.into_response()
        }
        ServerScript::Empty => Body::empty().into_response(),
    }
}
