//! Streaming chat completions.
//!
//! [`ChatCompletionStream`] pulls byte segments from a response body only
//! when the consumer asks for the next chunk, so a slow consumer applies
//! back-pressure to the network read.

use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{self, BoxStream, FusedStream, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::ClientError;
use crate::model::ChatCompletionChunk;
use crate::sse::{SseDecoder, SseFrame};

type ChunkCallback = Box<dyn FnMut(&ChatCompletionChunk) + Send>;
type CompleteCallback = Box<dyn FnMut() + Send>;
type ErrorCallback = Box<dyn FnMut(&ClientError) + Send>;
type WarningCallback = Box<dyn FnMut(&serde_json::Error, &str) + Send>;

/// Optional observers of a stream.
///
/// Fatal errors reach `on_error` and are also returned to the consumer.
///
/// # Example
/// ```
/// use oai_compat::stream::StreamHandlers;
///
/// let handlers = StreamHandlers::new()
///     .on_chunk(|chunk| print!("{}", chunk.delta_content().unwrap_or_default()))
///     .on_complete(|| println!())
///     .on_error(|e| eprintln!("stream failed: {e}"));
/// ```
#[derive(Default)]
pub struct StreamHandlers {
    on_chunk: Option<ChunkCallback>,
    on_complete: Option<CompleteCallback>,
    on_error: Option<ErrorCallback>,
    on_warning: Option<WarningCallback>,
}

impl StreamHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with every decoded chunk, before it is yielded.
    pub fn on_chunk(mut self, f: impl FnMut(&ChatCompletionChunk) + Send + 'static) -> Self {
        self.on_chunk = Some(Box::new(f));
        self
    }

    /// Called once when the stream ends normally.
    pub fn on_complete(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Called with a fatal error before it is returned.
    pub fn on_error(mut self, f: impl FnMut(&ClientError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Called with the parse error and raw payload of a skipped frame.
    pub fn on_warning(mut self, f: impl FnMut(&serde_json::Error, &str) + Send + 'static) -> Self {
        self.on_warning = Some(Box::new(f));
        self
    }

    pub(crate) fn chunk(&mut self, chunk: &ChatCompletionChunk) {
        if let Some(f) = self.on_chunk.as_mut() {
            f(chunk);
        }
    }

    pub(crate) fn complete(&mut self) {
        if let Some(f) = self.on_complete.as_mut() {
            f();
        }
    }

    pub(crate) fn error(&mut self, error: &ClientError) {
        if let Some(f) = self.on_error.as_mut() {
            f(error);
        }
    }

    pub(crate) fn warning(&mut self, error: &serde_json::Error, payload: &str) {
        if let Some(f) = self.on_warning.as_mut() {
            f(error, payload);
        }
    }
}

impl fmt::Debug for StreamHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandlers")
            .field("on_chunk", &self.on_chunk.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_warning", &self.on_warning.is_some())
            .finish()
    }
}

/// State owned by one stream for its whole life.
///
/// The byte stream is dropped as soon as the session finishes, whichever
/// way it finishes, which releases the response body.
struct StreamSession {
    bytes: Option<BoxStream<'static, Result<Bytes, ClientError>>>,
    decoder: SseDecoder,
    pending: VecDeque<SseFrame>,
    overflow: Option<ClientError>,
    handlers: StreamHandlers,
    cancel: CancellationToken,
    chunks: usize,
    bytes_received: usize,
}

impl StreamSession {
    async fn next_chunk(&mut self) -> Option<Result<ChatCompletionChunk, ClientError>> {
        if self.bytes.is_none() {
            return None;
        }
        if self.cancel.is_cancelled() {
            return Some(Err(self.fail(ClientError::Aborted)));
        }

        loop {
            while let Some(frame) = self.pending.pop_front() {
                match frame {
                    SseFrame::Done => {
                        self.finish();
                        return None;
                    }
                    SseFrame::Data(data) => match serde_json::from_str::<ChatCompletionChunk>(&data) {
                        Ok(chunk) => {
                            self.chunks += 1;
                            self.handlers.chunk(&chunk);
                            return Some(Ok(chunk));
                        }
                        Err(e) => {
                            warn!(error = %e, payload = %data, "Skipping malformed SSE frame");
                            self.handlers.warning(&e, &data);
                        }
                    },
                }
            }

            if let Some(e) = self.overflow.take() {
                return Some(Err(self.fail(e)));
            }

            let bytes = self.bytes.as_mut()?;
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Some(Err(ClientError::Aborted)),
                segment = bytes.next() => segment,
            };

            match next {
                Some(Ok(segment)) => {
                    self.bytes_received += segment.len();
                    self.pending.extend(self.decoder.push(&segment));
                    // Frames already completed are yielded before the overflow.
                    self.overflow = self.decoder.check_limit().err();
                }
                Some(Err(e)) => return Some(Err(self.fail(e))),
                None => {
                    self.finish();
                    return None;
                }
            }
        }
    }

    fn finish(&mut self) {
        self.release();
        debug!(
            chunks = self.chunks,
            bytes = self.bytes_received,
            "Chat completion stream finished"
        );
        self.handlers.complete();
    }

    fn fail(&mut self, error: ClientError) -> ClientError {
        self.release();
        debug!(error = %error, chunks = self.chunks, "Chat completion stream failed");
        self.handlers.error(&error);
        error
    }

    fn release(&mut self) {
        self.bytes = None;
        self.pending.clear();
        self.overflow = None;
    }
}

/// A stream of [`ChatCompletionChunk`]s decoded from an SSE response body.
///
/// Ends after `data: [DONE]` or when the body ends. A transport error or a
/// cancellation is yielded once as the last item. Polling after the end
/// keeps returning `None`.
pub struct ChatCompletionStream {
    inner: Pin<Box<dyn FusedStream<Item = Result<ChatCompletionChunk, ClientError>> + Send>>,
}

impl ChatCompletionStream {
    /// Decode chunks from any source of body segments.
    pub fn new<S>(
        bytes: S,
        decoder: SseDecoder,
        handlers: StreamHandlers,
        cancel: CancellationToken,
    ) -> Self
    where
        S: Stream<Item = Result<Bytes, ClientError>> + Send + 'static,
    {
        let session = StreamSession {
            bytes: Some(bytes.boxed()),
            decoder,
            pending: VecDeque::new(),
            overflow: None,
            handlers,
            cancel,
            chunks: 0,
            bytes_received: 0,
        };

        let inner = stream::unfold(session, |mut session| async move {
            session.next_chunk().await.map(|item| (item, session))
        })
        .fuse();

        Self {
            inner: Box::pin(inner),
        }
    }

    /// Drain the stream, concatenating the content of the first choice.
    pub async fn collect_text(mut self) -> Result<String, ClientError> {
        let mut text = String::new();
        while let Some(chunk) = self.next().await {
            if let Some(content) = chunk?.delta_content() {
                text.push_str(content);
            }
        }
        Ok(text)
    }
}

impl Stream for ChatCompletionStream {
    type Item = Result<ChatCompletionChunk, ClientError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl FusedStream for ChatCompletionStream {
    fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }
}

impl fmt::Debug for ChatCompletionStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatCompletionStream").finish_non_exhaustive()
    }
}
