//! Public types for the chat API
use serde::{Deserialize, Serialize};

use crate::openai::Message;

/// Body of a relay request. Field names follow the browser client so
/// they're camelCase on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub messages: Vec<Message>,
}
