//! Client side of the relay: the transcript a UI renders and the
//! consumer that fills it in from a streaming relay response.

pub mod consumer;
pub mod settings;
pub mod store;
pub mod transcript;

use std::error::Error as StdError;
use std::fmt::{self, Display};

pub use consumer::StreamConsumer;
pub use settings::Settings;
pub use store::{FileStore, KvStore, MemoryStore};
pub use transcript::{ChatMessage, Snapshot, TranscriptState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// A response is still streaming into the transcript
    Busy,
    /// Nothing to send
    EmptyInput,
}

impl Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::Busy => write!(f, "A response is still streaming"),
            ChatError::EmptyInput => write!(f, "Message is empty"),
        }
    }
}

impl StdError for ChatError {}
