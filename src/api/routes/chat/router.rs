//! Router for the chat relay API

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, Bytes},
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::post,
};

use super::public;
use crate::api::public::ApiError;
use crate::api::state::AppState;
use crate::core::DEFAULT_TEMPERATURE;
use crate::openai::{completion_stream, error_body, relay_stream};

type SharedState = Arc<AppState>;

/// Pick the API base to call. A `baseUrl` from the client is used as
/// an external endpoint unless it points back under our own mount
/// prefix, in which case the configured default wins.
fn resolve_api_hostname<'a>(
    base_url: Option<&'a str>,
    mount_prefix: &str,
    default_hostname: &'a str,
) -> &'a str {
    match base_url.map(str::trim) {
        Some(url) if !url.is_empty() && !url.starts_with(mount_prefix) => url,
        _ => default_hostname,
    }
}

fn resolve_api_key(api_key: Option<&str>, default_api_key: Option<&str>) -> Option<String> {
    api_key
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .or(default_api_key)
        .map(String::from)
}

/// Relay a conversation to the upstream and stream back the
/// assistant's text as it arrives.
async fn relay_handler(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload: public::RelayRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))?;

    let config = &state.config;
    let api_key = resolve_api_key(payload.api_key.as_deref(), config.openai_api_key.as_deref())
        .ok_or_else(|| ApiError::bad_request("Missing API key"))?;
    let api_hostname = resolve_api_hostname(
        payload.base_url.as_deref(),
        &config.mount_prefix,
        &config.openai_api_hostname,
    );
    let temperature = payload.temperature.unwrap_or(DEFAULT_TEMPERATURE);

    tracing::info!(
        "Relaying {} messages to {} using model {}",
        payload.messages.len(),
        api_hostname,
        payload.model
    );

    let response = completion_stream(
        &state.http,
        &payload.messages,
        api_hostname,
        &api_key,
        &payload.model,
        temperature,
    )
    .await?;

    let status = response.status();
    if !status.is_success() {
        let text = error_body(response).await;
        return Err(ApiError::upstream(status, &text));
    }

    let body = Body::from_stream(relay_stream(response.bytes_stream()));

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}

/// Create the chat router
pub fn router() -> Router<SharedState> {
    Router::new().route("/", post(relay_handler))
}
