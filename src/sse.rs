//! Server-Sent Events (SSE) framing for chat completion streams.
//!
//! SSE format:
//! ```text
//! data: {"key": "value"}
//!
//! data: {"another": "event"}
//!
//! data: [DONE]
//! ```
//!
//! Only line boundaries matter. Blank lines, comments and other SSE fields
//! (`event:`, `id:`, `retry:`) are skipped.

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::client::ClientError;
use crate::stream::{ChatCompletionStream, StreamHandlers};

/// Literal prefix of a data line.
pub const DATA_PREFIX: &str = "data: ";

/// The terminal frame, compared against a whole trimmed line.
pub const DONE_LINE: &str = "data: [DONE]";

/// A complete line that carries meaning for the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// Payload of a `data: ` line, prefix stripped.
    Data(String),
    /// The `data: [DONE]` sentinel.
    Done,
}

/// Incremental line splitter with a carry-over buffer.
///
/// Bytes are buffered undecoded until a `\n` arrives, so a multi-byte
/// character split across two segments is decoded only once it is whole.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    max_buffer_len: Option<usize>,
}

impl SseDecoder {
    /// A decoder with an unbounded carry-over buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail once an unterminated line grows past `limit` bytes.
    pub fn with_max_buffer_len(mut self, limit: usize) -> Self {
        self.max_buffer_len = Some(limit);
        self
    }

    /// Bytes waiting for a line terminator.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Feed one delivered segment and return the frames of every line it
    /// completed, in order.
    ///
    /// Frames stop at [`SseFrame::Done`]; whatever follows the sentinel is
    /// discarded. The buffer limit is not enforced here, so lines completed
    /// by this segment are never lost; call [`SseDecoder::check_limit`]
    /// once they have been consumed.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let frame = classify_line(&String::from_utf8_lossy(&self.buffer[start..start + pos]));
            start += pos + 1;

            match frame {
                Some(SseFrame::Done) => {
                    self.buffer.clear();
                    frames.push(SseFrame::Done);
                    return frames;
                }
                Some(frame) => frames.push(frame),
                None => {}
            }
        }
        self.buffer.drain(..start);

        frames
    }

    /// Fail if the unterminated line has grown past the configured limit.
    pub fn check_limit(&self) -> Result<(), ClientError> {
        match self.max_buffer_len {
            Some(limit) if self.buffer.len() > limit => Err(ClientError::BufferOverflow { limit }),
            _ => Ok(()),
        }
    }
}

/// Classify one complete line.
///
/// Returns `None` for lines the decoder ignores.
pub fn classify_line(line: &str) -> Option<SseFrame> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if line == DONE_LINE {
        return Some(SseFrame::Done);
    }
    parse_sse_line(line).map(|data| SseFrame::Data(data.to_string()))
}

/// Parse an SSE line to extract the data portion.
///
/// SSE lines are in the format: `data: <content>`
///
/// # Example
/// ```
/// use oai_compat::sse::parse_sse_line;
///
/// let line = "data: {\"key\": \"value\"}";
/// assert_eq!(parse_sse_line(line), Some("{\"key\": \"value\"}"));
///
/// let line = "invalid";
/// assert_eq!(parse_sse_line(line), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix(DATA_PREFIX).map(|s| s.trim())
}

/// Check if a trimmed line is the stream terminator.
///
/// # Example
/// ```
/// use oai_compat::sse::is_done_marker;
///
/// assert!(is_done_marker("data: [DONE]"));
/// assert!(!is_done_marker("[DONE]"));
/// assert!(!is_done_marker("data: {\"data\": \"value\"}"));
/// ```
pub fn is_done_marker(line: &str) -> bool {
    line.trim() == DONE_LINE
}

/// Extension trait for `reqwest::Response` to decode chat completion chunks.
///
/// # Example
/// ```ignore
/// use oai_compat::sse::SseResponseExt;
///
/// let response = http.post(url).json(&request).send().await?;
/// let mut chunks = response.chat_chunks(StreamHandlers::new(), CancellationToken::new());
/// while let Some(chunk) = chunks.next().await {
///     println!("{:?}", chunk?.delta_content());
/// }
/// ```
pub trait SseResponseExt {
    /// Convert the response body into a stream of chat completion chunks.
    fn chat_chunks(self, handlers: StreamHandlers, cancel: CancellationToken) -> ChatCompletionStream
    where
        Self: Sized,
    {
        self.chat_chunks_with(SseDecoder::new(), handlers, cancel)
    }

    /// Like [`SseResponseExt::chat_chunks`], framing with `decoder`.
    fn chat_chunks_with(
        self,
        decoder: SseDecoder,
        handlers: StreamHandlers,
        cancel: CancellationToken,
    ) -> ChatCompletionStream;
}

impl SseResponseExt for reqwest::Response {
    fn chat_chunks_with(
        self,
        decoder: SseDecoder,
        handlers: StreamHandlers,
        cancel: CancellationToken,
    ) -> ChatCompletionStream {
        let bytes = self.bytes_stream().map(|segment| segment.map_err(ClientError::from));
        ChatCompletionStream::new(bytes, decoder, handlers, cancel)
    }
}
