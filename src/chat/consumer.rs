//! Drives one request/response cycle against the relay and streams
//! the reply into the transcript.

use std::sync::Arc;

use anyhow::{Error, Result, anyhow, bail};
use bytes::Bytes;
use futures::{Stream, StreamExt};

use super::ChatError;
use super::settings::Settings;
use super::transcript::{ChatMessage, TranscriptState};
use crate::api::public::chat::RelayRequest;
use crate::openai::{Message, Role, error_body};

/// Decodes UTF-8 across chunk boundaries. Bytes of a character that
/// hasn't fully arrived yet are held back until the next chunk.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, chunk: &[u8]) -> Result<String, Error> {
        self.pending.extend_from_slice(chunk);
        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                let text = text.to_string();
                self.pending.clear();
                Ok(text)
            }
            // Incomplete sequence at the end of the buffer
            Err(e) if e.error_len().is_none() => {
                let valid = e.valid_up_to();
                let text = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
                self.pending.drain(..valid);
                Ok(text)
            }
            Err(e) => Err(anyhow!("Invalid UTF-8 in response: {}", e)),
        }
    }

    fn finish(self) -> Result<(), Error> {
        if !self.pending.is_empty() {
            bail!("Response ended in the middle of a UTF-8 character");
        }
        Ok(())
    }
}

/// Read a relay body to the end, replacing the draft's content with
/// everything received so far after each chunk.
pub(crate) async fn consume_body<S, E>(
    transcript: &TranscriptState,
    draft_id: &str,
    body: S,
) -> Result<String, Error>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut body = Box::pin(body);
    let mut decoder = Utf8Decoder::default();
    let mut accumulated = String::new();

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        let text = decoder.decode(&chunk)?;
        if text.is_empty() {
            continue;
        }
        accumulated.push_str(&text);
        transcript.update_draft(draft_id, &accumulated);
    }
    decoder.finish()?;

    Ok(accumulated)
}

/// Sends the user's messages to the relay and keeps the transcript up
/// to date while the reply streams in. Only one turn can be in flight
/// at a time.
pub struct StreamConsumer {
    relay_url: String,
    settings: Settings,
    transcript: Arc<TranscriptState>,
    http: reqwest::Client,
}

impl StreamConsumer {
    pub fn new(relay_url: &str, settings: Settings, transcript: Arc<TranscriptState>) -> Self {
        Self {
            relay_url: relay_url.to_string(),
            settings,
            transcript,
            http: reqwest::Client::new(),
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.transcript.is_streaming()
    }

    /// The system prompt is generated fresh for every request and is
    /// never stored in the transcript.
    fn build_request(&self, history: &[ChatMessage], user_msg: &ChatMessage) -> RelayRequest {
        let mut messages = vec![Message::new(Role::System, &self.settings.system_prompt)];
        messages.extend(history.iter().map(ChatMessage::to_wire));
        messages.push(user_msg.to_wire());

        RelayRequest {
            api_key: self.settings.api_key.clone(),
            base_url: self.settings.base_url.clone(),
            model: self.settings.model.clone(),
            temperature: Some(self.settings.temperature),
            messages,
        }
    }

    async fn stream_reply(&self, draft_id: &str, request: &RelayRequest) -> Result<String, Error> {
        let response = self.http.post(&self.relay_url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = error_body(response).await;
            bail!("{} {}", status.as_u16(), text);
        }

        consume_body(&self.transcript, draft_id, response.bytes_stream()).await
    }

    /// Send a message and stream the reply into the transcript.
    ///
    /// Failures while talking to the relay don't return an error, they
    /// end up in the assistant's message as `Error: ...` so the turn
    /// is visible and the user can try again.
    pub async fn send(&self, input: &str) -> Result<(), ChatError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ChatError::EmptyInput);
        }

        let user_msg = ChatMessage::new(Role::User, input);
        let (draft_id, history) = self.transcript.begin_turn(user_msg.clone())?;
        let request = self.build_request(&history, &user_msg);

        match self.stream_reply(&draft_id, &request).await {
            Ok(reply) => {
                tracing::debug!("Received reply of {} bytes", reply.len());
                self.transcript.finish_draft(&draft_id, None);
            }
            Err(e) => {
                tracing::warn!("Chat request failed: {}", e);
                self.transcript
                    .finish_draft(&draft_id, Some(&format!("Error: {}", e)));
            }
        }

        Ok(())
    }
}
