//! Client core: the error type and the request executors.

use std::sync::atomic::{AtomicBool, Ordering};

use itertools::Itertools;
use reqwest::header::ACCEPT;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::http::{build_http_client, build_stream_client};
use crate::model::{ChatCompletionRequest, ChatCompletionResponse};
use crate::options::{ClientConfig, ClientOptions};
use crate::resources::{Chat, Images, Models, Moderations};
use crate::retry::{with_retry, RetryConfig};
use crate::sse::{SseDecoder, SseResponseExt};
use crate::stream::{ChatCompletionStream, StreamHandlers};

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Non-2xx response; the body text is kept for diagnostics.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Max retries exceeded after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<ClientError>,
    },

    #[error("Response has no body")]
    MissingBody,

    #[error("This operation was aborted")]
    Aborted,

    #[error("SSE line exceeds buffer limit of {limit} bytes")]
    BufferOverflow { limit: usize },

    #[error("File \"{file_name}\" exceeds maximum size of {max_size} bytes")]
    FileTooLarge { file_name: String, max_size: usize },

    #[error(
        "File \"{file_name}\" has an unsupported extension. Allowed extensions: {}",
        .allowed.iter().join(", ")
    )]
    UnsupportedExtension { file_name: String, allowed: Vec<String> },
}

impl ClientError {
    /// Whether a buffered request failing with this error may be resent.
    ///
    /// Server errors (5xx), timeouts and connection failures qualify.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Http { status, .. } => *status >= 500,
            ClientError::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// HTTP status carried by the error, looking through retry wrapping.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            ClientError::RetriesExhausted { source, .. } => source.status(),
            _ => None,
        }
    }
}

/// Client for an OpenAI-compatible API.
///
/// Configuration is fixed at construction, apart from the web search
/// toggle. The client can be shared between tasks; concurrent streams do
/// not share any per-request state.
///
/// # Example
/// ```no_run
/// use oai_compat::{ChatCompletionRequest, ChatMessage, Client, ClientOptions};
///
/// # async fn run() -> Result<(), oai_compat::ClientError> {
/// let client = Client::new(ClientOptions::new("sk-..."))?;
/// let request = ChatCompletionRequest::new("gpt-4o", vec![ChatMessage::user("Hello!")]);
/// let response = client.chat().completions().create(request).await?;
/// println!("{:?}", response.text());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    http: reqwest::Client,
    stream_http: reqwest::Client,
    web_search_enabled: AtomicBool,
}

impl Client {
    /// Resolve `options` and build the client.
    pub fn new(options: ClientOptions) -> Result<Self, ClientError> {
        Self::from_config(ClientConfig::resolve(options))
    }

    /// Build a client from options read from the environment.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientOptions::from_env()?)
    }

    /// Build a client from an already resolved configuration.
    pub fn from_config(config: ClientConfig) -> Result<Self, ClientError> {
        Ok(Self {
            http: build_http_client(&config)?,
            stream_http: build_stream_client(&config)?,
            web_search_enabled: AtomicBool::new(config.web_search.enabled),
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current value of the web search toggle.
    pub fn web_search_enabled(&self) -> bool {
        self.web_search_enabled.load(Ordering::Relaxed)
    }

    /// Turn web search on or off for requests that do not set it.
    pub fn set_web_search_enabled(&self, enabled: bool) {
        self.web_search_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn chat(&self) -> Chat<'_> {
        Chat::new(self)
    }

    pub fn models(&self) -> Models<'_> {
        Models::new(self)
    }

    pub fn images(&self) -> Images<'_> {
        Images::new(self)
    }

    pub fn moderations(&self) -> Moderations<'_> {
        Moderations::new(self)
    }

    /// Send a buffered request and decode the JSON response.
    ///
    /// Server errors and retryable transport failures are retried with
    /// exponential backoff; 4xx responses are returned at once.
    pub async fn execute<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.config.endpoint(path);
        let retry = RetryConfig::from(&self.config);

        with_retry(&retry, || self.send_once(method.clone(), &url, body)).await
    }

    async fn send_once<B, T>(&self, method: Method, url: &str, body: Option<&B>) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(%method, url = %url, "Sending request");

        let mut req = self.http.request(method, url);
        if let Some(body) = body {
            req = req.json(body);
        }

        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(http_error(status, response).await);
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// `GET` helper for [`Client::execute`].
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.execute::<(), T>(Method::GET, path, None).await
    }

    /// `POST` helper for [`Client::execute`].
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(Method::POST, path, Some(body)).await
    }

    /// Non-streaming chat completion.
    ///
    /// A request with `stream: Some(true)` is rejected before any I/O.
    pub async fn create_chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ClientError> {
        if request.is_stream() {
            return Err(ClientError::InvalidRequest(
                "stream is set to true; use the streaming entry point (stream) instead of create"
                    .to_string(),
            ));
        }
        self.post("chat/completions", request).await
    }

    /// Streaming chat completion.
    ///
    /// Failures before the body starts (cancellation, transport errors,
    /// non-2xx status, missing body) go to `on_error` and are returned.
    /// Later failures are yielded by the stream. Never retried.
    pub async fn stream_chat_completion(
        &self,
        mut request: ChatCompletionRequest,
        mut handlers: StreamHandlers,
        cancel: CancellationToken,
    ) -> Result<ChatCompletionStream, ClientError> {
        request.stream = Some(true);

        match self.open_stream(&request, &cancel).await {
            Ok(response) => Ok(response.chat_chunks_with(self.stream_decoder(), handlers, cancel)),
            Err(e) => {
                handlers.error(&e);
                Err(e)
            }
        }
    }

    fn stream_decoder(&self) -> SseDecoder {
        match self.config.max_stream_buffer {
            Some(limit) => SseDecoder::new().with_max_buffer_len(limit),
            None => SseDecoder::new(),
        }
    }

    async fn open_stream(
        &self,
        request: &ChatCompletionRequest,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, ClientError> {
        if cancel.is_cancelled() {
            return Err(ClientError::Aborted);
        }

        let url = self.config.endpoint("chat/completions");
        debug!(url = %url, model = %request.model, "Opening chat completion stream");

        let send = self
            .stream_http
            .post(&url)
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Aborted),
            response = send => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(http_error(status, response).await);
        }

        if status == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
            return Err(ClientError::MissingBody);
        }

        Ok(response)
    }
}

/// Turn a non-2xx response into [`ClientError::Http`].
///
/// A body that cannot be read is logged and reported as empty.
async fn http_error(status: StatusCode, response: reqwest::Response) -> ClientError {
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            debug!(status = status.as_u16(), error = %e, "Failed to read error response body");
            String::new()
        }
    };
    ClientError::Http {
        status: status.as_u16(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChatMessage;

    #[test]
    fn test_http_error_message() {
        let err = ClientError::Http {
            status: 503,
            body: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 503: overloaded");
        assert!(err.is_retryable());
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn test_client_errors_not_retryable() {
        let err = ClientError::Http {
            status: 429,
            body: String::new(),
        };
        assert!(!err.is_retryable());
        assert!(!ClientError::Aborted.is_retryable());
    }

    #[test]
    fn test_exhausted_message_names_cause() {
        let err = ClientError::RetriesExhausted {
            attempts: 4,
            source: Box::new(ClientError::Http {
                status: 500,
                body: "boom".to_string(),
            }),
        };
        assert_eq!(err.to_string(), "Max retries exceeded after 4 attempts: HTTP 500: boom");
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_unsupported_extension_lists_allowed() {
        let err = ClientError::UnsupportedExtension {
            file_name: "a.exe".to_string(),
            allowed: vec!["txt".to_string(), "md".to_string()],
        };
        assert!(err.to_string().ends_with("Allowed extensions: txt, md"));
    }

    #[test]
    fn test_web_search_toggle() {
        let client = Client::new(ClientOptions::new("key")).unwrap();
        assert!(!client.web_search_enabled());
        client.set_web_search_enabled(true);
        assert!(client.web_search_enabled());
    }

    #[tokio::test]
    async fn test_stream_flag_rejected_before_io() {
        // Nothing listens on this port; a network attempt would fail differently.
        let client = Client::new(
            ClientOptions::new("key")
                .with_provider(crate::providers::Provider::Custom)
                .with_base_url("http://127.0.0.1:9"),
        )
        .unwrap();
        let request = ChatCompletionRequest::new("m", vec![ChatMessage::user("hi")]).with_stream(true);

        let err = client.create_chat_completion(&request).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
        assert!(err.to_string().contains("stream"));
    }

    #[tokio::test]
    async fn test_cancelled_token_prevents_send() {
        let client = Client::new(
            ClientOptions::new("key")
                .with_provider(crate::providers::Provider::Custom)
                .with_base_url("http://127.0.0.1:9"),
        )
        .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let errors = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen = errors.clone();
        let handlers = StreamHandlers::new().on_error(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let request = ChatCompletionRequest::new("m", vec![ChatMessage::user("hi")]);
        let err = client
            .stream_chat_completion(request, handlers, cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Aborted));
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreadable_error_body_reported_empty() {
        let body = reqwest::Body::wrap_stream(futures::stream::iter(vec![Err::<bytes::Bytes, _>(
            std::io::Error::other("connection reset"),
        )]));
        let response = reqwest::Response::from(::http::Response::builder().status(502).body(body).unwrap());

        let err = http_error(StatusCode::BAD_GATEWAY, response).await;
        assert!(matches!(&err, ClientError::Http { status: 502, body } if body.is_empty()));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_error_body_kept() {
        let response = reqwest::Response::from(
            ::http::Response::builder()
                .status(404)
                .body("model not found")
                .unwrap(),
        );

        let err = http_error(StatusCode::NOT_FOUND, response).await;
        assert_eq!(err.to_string(), "HTTP 404: model not found");
    }
}
