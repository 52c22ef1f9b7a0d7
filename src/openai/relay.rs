//! Rewrites an upstream SSE body into a plain stream of text deltas.

use async_stream::try_stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};

use super::sse::{LineDecoder, SseEvent, interpret_line};

/// Wrap an upstream SSE byte stream and yield only the decoded text
/// fragments, UTF-8 encoded, as soon as each one is parsed.
///
/// The returned stream only pulls from `upstream` when it is polled
/// itself so a slow consumer holds back the upstream read. It ends as
/// soon as `[DONE]` is seen and the upstream is dropped without
/// reading the rest of it. Running out of upstream data without a
/// `[DONE]` is a normal end. Upstream read errors are passed through
/// and end the stream.
pub fn relay_stream<S, E>(upstream: S) -> impl Stream<Item = Result<Bytes, E>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Send + 'static,
{
    try_stream! {
        let mut upstream = Box::pin(upstream);
        let mut decoder = LineDecoder::new();
        let mut completed = false;

        'upstream: while let Some(chunk) = upstream.next().await {
            let chunk = chunk?;
            for line in decoder.feed(&chunk) {
                match interpret_line(&line) {
                    Some(SseEvent::Delta(text)) => {
                        yield Bytes::from(text);
                    }
                    Some(SseEvent::Done) => {
                        completed = true;
                        break 'upstream;
                    }
                    None => {}
                }
            }
        }

        if completed {
            tracing::debug!("Upstream signaled completion");
        } else {
            decoder.finish();
        }
    }
}
