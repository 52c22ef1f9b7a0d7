//! The conversation as the UI sees it.
//!
//! `TranscriptState` is the only owner of the messages. Renderers
//! subscribe and receive a full `Snapshot` after every change. At most
//! one assistant message, the draft, can change at a time and only
//! through the id handed out when its turn began.
//!
//! A transcript bound to a store saves the messages after every
//! change, including each draft update, so an interrupted turn is
//! still there on restore.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::ChatError;
use super::store::{KvStore, TRANSCRIPT_KEY};
use crate::openai::{Message, Role};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    /// The message without its local bookkeeping, ready to send
    /// upstream.
    pub fn to_wire(&self) -> Message {
        Message::new(self.role.clone(), &self.content)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub messages: Vec<ChatMessage>,
    pub is_streaming: bool,
}

#[derive(Default)]
struct Inner {
    messages: Vec<ChatMessage>,
    draft_id: Option<String>,
    subscribers: Vec<mpsc::UnboundedSender<Snapshot>>,
    store: Option<Arc<dyn KvStore>>,
}

impl Inner {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            messages: self.messages.clone(),
            is_streaming: self.draft_id.is_some(),
        }
    }

    // Best effort, a failed write never interrupts the chat
    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        match serde_json::to_value(&self.messages) {
            Ok(value) => store.set(TRANSCRIPT_KEY, &value),
            Err(e) => tracing::debug!("Failed to serialize transcript: {}", e),
        }
    }

    fn notify(&mut self) {
        self.persist();
        let snapshot = self.snapshot();
        // Receivers that were dropped are unsubscribed here
        self.subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
    }

    fn draft_mut(&mut self, id: &str) -> Option<&mut ChatMessage> {
        if self.draft_id.as_deref() != Some(id) {
            return None;
        }
        self.messages.iter_mut().rev().find(|m| m.id == id)
    }
}

#[derive(Default)]
pub struct TranscriptState(Mutex<Inner>);

impl TranscriptState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the last saved transcript and keep saving to `store` on
    /// every change. A missing or unreadable snapshot starts an empty
    /// conversation.
    pub fn restore(store: Arc<dyn KvStore>) -> Self {
        let messages = store
            .get(TRANSCRIPT_KEY)
            .and_then(|value| {
                serde_json::from_value::<Vec<ChatMessage>>(value)
                    .inspect_err(|e| tracing::debug!("Ignoring saved transcript: {}", e))
                    .ok()
            })
            .unwrap_or_default();
        Self(Mutex::new(Inner {
            messages,
            store: Some(store),
            ..Inner::default()
        }))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.0.lock().expect("Unable to lock transcript")
    }

    /// Receive a snapshot after every change from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Snapshot> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        rx
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock().messages.clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.lock().draft_id.is_some()
    }

    /// Append a finished message.
    pub fn append(&self, msg: ChatMessage) -> Result<(), ChatError> {
        let mut inner = self.lock();
        if inner.draft_id.is_some() {
            return Err(ChatError::Busy);
        }
        inner.messages.push(msg);
        inner.notify();
        Ok(())
    }

    /// Start a turn: append the user's message and an empty assistant
    /// draft as a single change. Returns the draft id along with the
    /// messages that came before this turn.
    pub fn begin_turn(
        &self,
        user_msg: ChatMessage,
    ) -> Result<(String, Vec<ChatMessage>), ChatError> {
        let mut inner = self.lock();
        if inner.draft_id.is_some() {
            return Err(ChatError::Busy);
        }

        let history = inner.messages.clone();
        let draft = ChatMessage::new(Role::Assistant, "");
        let draft_id = draft.id.clone();

        inner.messages.push(user_msg);
        inner.messages.push(draft);
        inner.draft_id = Some(draft_id.clone());
        inner.notify();

        Ok((draft_id, history))
    }

    /// Replace the draft's content. Returns false when `id` is not the
    /// active draft, in which case nothing changes.
    pub fn update_draft(&self, id: &str, content: &str) -> bool {
        let mut inner = self.lock();
        let Some(draft) = inner.draft_mut(id) else {
            return false;
        };
        if draft.content == content {
            return true;
        }
        draft.content = content.to_string();
        inner.notify();
        true
    }

    /// End the turn. The draft becomes immutable, optionally after
    /// its content is overwritten (used for error diagnostics).
    pub fn finish_draft(&self, id: &str, content: Option<&str>) -> bool {
        let mut inner = self.lock();
        let Some(draft) = inner.draft_mut(id) else {
            return false;
        };
        if let Some(content) = content {
            draft.content = content.to_string();
        }
        inner.draft_id = None;
        inner.notify();
        true
    }

    pub fn clear(&self) -> Result<(), ChatError> {
        let mut inner = self.lock();
        if inner.draft_id.is_some() {
            return Err(ChatError::Busy);
        }
        inner.messages.clear();
        inner.notify();
        Ok(())
    }
}
