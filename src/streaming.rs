//! Incremental decoding of Server-Sent-Events bodies and the fragment stream
//! combinators built on top of them.

use futures::future;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::fmt::Display;
use std::pin::Pin;
use tracing::{debug, warn};

use crate::error::StreamError;

/// Provider output before failures are folded into text
pub type ChunkStream = BoxStream<'static, Result<String, StreamError>>;

/// Uniform reply stream: text fragments in arrival order
pub type FragmentStream = BoxStream<'static, String>;

/// End-of-stream sentinel carried in a `data:` record
pub const DONE_SENTINEL: &str = "[DONE]";

/// Splits a byte stream into trimmed lines.
///
/// Bytes are buffered until a newline arrives, so multi-byte characters split
/// across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete line, without its terminator
    pub fn next_line(&mut self) -> Option<String> {
        let newline_pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line = String::from_utf8_lossy(&self.buffer[..newline_pos])
            .trim()
            .to_string();
        self.buffer.drain(..=newline_pos);
        Some(line)
    }

    /// Whatever is left once the body ends without a trailing newline
    pub fn finish(&mut self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.buffer).trim().to_string();
        self.buffer.clear();
        (!rest.is_empty()).then_some(rest)
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Meaningful content of one SSE line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsePayload<'a> {
    Data(&'a str),
    Done,
}

/// Classify a line. Anything other than a non-empty `data:` record is `None`.
pub fn sse_payload(line: &str) -> Option<SsePayload<'_>> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() {
        None
    } else if data == DONE_SENTINEL {
        Some(SsePayload::Done)
    } else {
        Some(SsePayload::Data(data))
    }
}

struct SseState<S, F> {
    body: Pin<Box<S>>,
    lines: LineBuffer,
    decode: F,
    ended: bool,
}

/// Decode an SSE body into items.
///
/// `decode` receives each `data:` payload and returns `Ok(None)` for frames
/// that carry nothing of interest. The stream stops at `[DONE]`, at the end
/// of the body, or right after yielding the first error.
pub fn sse_stream<S, B, E, T, F>(body: S, decode: F) -> BoxStream<'static, Result<T, StreamError>>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
    T: Send + 'static,
    F: FnMut(&str) -> Result<Option<T>, StreamError> + Send + 'static,
{
    let state = SseState {
        body: Box::pin(body),
        lines: LineBuffer::new(),
        decode,
        ended: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            let line = match st.lines.next_line() {
                Some(line) => line,
                None if st.ended => return None,
                None => match st.body.next().await {
                    Some(Ok(bytes)) => {
                        st.lines.push(bytes.as_ref());
                        continue;
                    }
                    Some(Err(err)) => {
                        st.ended = true;
                        st.lines.clear();
                        return Some((Err(StreamError::Body(err.to_string())), st));
                    }
                    None => {
                        st.ended = true;
                        match st.lines.finish() {
                            Some(line) => line,
                            None => return None,
                        }
                    }
                },
            };

            match sse_payload(&line) {
                None => continue,
                Some(SsePayload::Done) => {
                    debug!("stream reached done sentinel");
                    return None;
                }
                Some(SsePayload::Data(data)) => match (st.decode)(data) {
                    Ok(Some(item)) => return Some((Ok(item), st)),
                    Ok(None) => continue,
                    Err(err) => {
                        st.ended = true;
                        st.lines.clear();
                        return Some((Err(err), st));
                    }
                },
            }
        }
    })
    .boxed()
}

/// Fold failures into text: text chunks pass through, the first error becomes
/// the final fragment and ends the stream.
pub fn into_fragments(chunks: ChunkStream) -> FragmentStream {
    chunks
        .scan(false, |failed, item| {
            if *failed {
                return future::ready(None);
            }
            future::ready(Some(match item {
                Ok(text) => text,
                Err(err) => {
                    warn!(error = %err, "reply stream failed");
                    *failed = true;
                    err.to_string()
                }
            }))
        })
        .boxed()
}

/// A stream holding exactly one fragment
pub fn single_fragment(text: impl Into<String>) -> FragmentStream {
    stream::once(future::ready(text.into())).boxed()
}

/// Mirror a fragment stream, calling `on_update` with the text so far after each fragment.
pub fn echo_cumulative<F>(fragments: FragmentStream, mut on_update: F) -> FragmentStream
where
    F: FnMut(&str) + Send + 'static,
{
    let mut so_far = String::new();
    fragments
        .inspect(move |fragment| {
            so_far.push_str(fragment);
            on_update(&so_far);
        })
        .boxed()
}

/// Drain a fragment stream into the full reply text
pub async fn collect_text(fragments: FragmentStream) -> String {
    fragments
        .fold(String::new(), |mut text, fragment| async move {
            text.push_str(&fragment);
            text
        })
        .await
}
