//! Test utilities for integration tests
#![allow(dead_code)]

use std::sync::Arc;

use axum::{Router, body::Body};

use chatrelay::api::AppState;
use chatrelay::api::app;
use chatrelay::core::AppConfig;

/// Config pointing the relay at a fake upstream. The API base gets a
/// `/v1` suffix so mocks match on `/v1/chat/completions` the same way
/// a real OpenAI URL would.
pub fn test_config(upstream_url: &str, api_key: Option<&str>) -> AppConfig {
    AppConfig {
        openai_api_hostname: format!("{}/v1", upstream_url),
        openai_api_key: api_key.map(String::from),
        openai_model: String::from("gpt-4o"),
        system_message: String::from("You are a helpful assistant."),
        storage_path: String::from("./"),
        static_dir: String::from("./web-ui"),
        mount_prefix: String::from("/api"),
    }
}

/// Creates a test application router
pub fn test_app(config: AppConfig) -> Router {
    app(Arc::new(AppState::new(config).unwrap()))
}

/// Serve the app on a random local port and return its base URL
pub async fn spawn_app(config: AppConfig) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = test_app(config);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Build an upstream SSE body out of content deltas followed by the
/// `[DONE]` sentinel.
pub fn sse_body(deltas: &[&str]) -> String {
    let mut body = String::new();
    for delta in deltas {
        let chunk = serde_json::json!({
            "id": "chatcmpl-123",
            "object": "chat.completion.chunk",
            "created": 1694268190,
            "model": "gpt-4o",
            "choices": [{"index": 0, "delta": {"content": delta}, "finish_reason": null}]
        });
        body.push_str(&format!("data: {}\n\n", chunk));
    }
    body.push_str("data: [DONE]\n\n");
    body
}
