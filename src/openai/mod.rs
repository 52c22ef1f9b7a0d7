mod core;
pub mod relay;
pub mod sse;

pub use self::core::*;
pub use relay::relay_stream;
pub use sse::{LineDecoder, SseEvent, interpret_line};
