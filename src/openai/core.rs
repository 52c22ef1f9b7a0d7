use std::time::Duration;

use anyhow::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

/// A message as it goes over the wire to an OpenAI compatible API.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: content.to_string(),
        }
    }
}

/// Full URL of the chat completions endpoint for an API base such as
/// `https://api.openai.com/v1`.
pub fn chat_completions_url(api_hostname: &str) -> String {
    format!("{}/chat/completions", api_hostname.trim_end_matches('/'))
}

/// Longest the upstream may go quiet, while connecting or between two
/// chunks of a streamed reply, before the request fails.
pub const UPSTREAM_READ_TIMEOUT: Duration = Duration::from_secs(60 * 5);

/// Client for talking to completion APIs. Only the gaps are bounded,
/// a streamed reply may run as long as the model keeps producing tokens.
pub fn upstream_client(read_timeout: Duration) -> Result<reqwest::Client, Error> {
    let client = reqwest::Client::builder()
        .connect_timeout(read_timeout)
        .read_timeout(read_timeout)
        .build()?;
    Ok(client)
}

fn completion_request(
    client: &reqwest::Client,
    messages: &[Message],
    api_hostname: &str,
    api_key: &str,
    model: &str,
    temperature: f64,
) -> reqwest::RequestBuilder {
    let payload = json!({
        "model": model,
        "temperature": temperature,
        "stream": true,
        "messages": messages,
    });
    let url = chat_completions_url(api_hostname);
    tracing::debug!("Requesting streaming completion from {}", url);

    client
        .post(url)
        .bearer_auth(api_key)
        .header("Content-Type", "application/json")
        .json(&payload)
}

/// Start a streaming chat completion and return the raw response
/// without checking the status. The body is an SSE stream when the
/// upstream accepted the request and diagnostic text otherwise.
pub async fn completion_stream(
    client: &reqwest::Client,
    messages: &[Message],
    api_hostname: &str,
    api_key: &str,
    model: &str,
    temperature: f64,
) -> Result<reqwest::Response, Error> {
    let response = completion_request(client, messages, api_hostname, api_key, model, temperature)
        .send()
        .await?;

    Ok(response)
}

/// Body of a failed response for use in a diagnostic. An unreadable
/// body is logged and reported as empty so the status still gets out.
pub async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Failed to read body of {} response: {}", status, e);
            String::new()
        }
    }
}
