//! Namespaced convenience surface: `client.chat().completions()`,
//! `client.models()`, `client.images()`, `client.moderations()`.
//!
//! Request augmentation (web search flag, file messages) happens here;
//! the executors on [`Client`] send requests as given.

use tokio_util::sync::CancellationToken;

use crate::client::{Client, ClientError};
use crate::files::{prepend_file_messages, FileAttachment, FileOptions};
use crate::model::{
    ChatCompletionRequest, ChatCompletionResponse, ImageGenerationRequest, ImagesResponse, ModelInfo,
    ModelList, ModerationRequest, ModerationResponse, WebSearchParams,
};
use crate::stream::{ChatCompletionStream, StreamHandlers};

/// `client.chat()`
#[derive(Debug, Clone, Copy)]
pub struct Chat<'a> {
    client: &'a Client,
}

impl<'a> Chat<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub fn completions(&self) -> Completions<'a> {
        Completions {
            client: self.client,
        }
    }
}

/// Result of [`Completions::send`], shaped by the request's `stream` flag.
#[derive(Debug)]
pub enum CompletionOutput {
    Response(ChatCompletionResponse),
    Stream(ChatCompletionStream),
}

/// `client.chat().completions()`
#[derive(Debug, Clone, Copy)]
pub struct Completions<'a> {
    client: &'a Client,
}

impl Completions<'_> {
    /// Buffered completion. Rejects requests with `stream: true`.
    pub async fn create(&self, request: ChatCompletionRequest) -> Result<ChatCompletionResponse, ClientError> {
        let request = self.with_web_search_default(request);
        self.client.create_chat_completion(&request).await
    }

    /// Streamed completion without observers or cancellation.
    pub async fn stream(&self, request: ChatCompletionRequest) -> Result<ChatCompletionStream, ClientError> {
        self.stream_with(request, StreamHandlers::new(), CancellationToken::new())
            .await
    }

    /// Streamed completion with observers and a cancellation token.
    pub async fn stream_with(
        &self,
        request: ChatCompletionRequest,
        handlers: StreamHandlers,
        cancel: CancellationToken,
    ) -> Result<ChatCompletionStream, ClientError> {
        let request = self.with_web_search_default(request);
        self.client
            .stream_chat_completion(request, handlers, cancel)
            .await
    }

    /// Dispatch on `request.stream`: streamed when `Some(true)`, buffered otherwise.
    pub async fn send(&self, request: ChatCompletionRequest) -> Result<CompletionOutput, ClientError> {
        if request.is_stream() {
            self.stream(request).await.map(CompletionOutput::Stream)
        } else {
            self.create(request).await.map(CompletionOutput::Response)
        }
    }

    /// Buffered completion with web search forced on.
    pub async fn create_with_web_search(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ClientError> {
        self.create(self.force_web_search(request)).await
    }

    /// Streamed completion with web search forced on.
    pub async fn stream_with_web_search(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<ChatCompletionStream, ClientError> {
        self.stream(self.force_web_search(request)).await
    }

    /// [`Completions::stream_with_web_search`] with observers and a cancellation token.
    pub async fn stream_with_web_search_and(
        &self,
        request: ChatCompletionRequest,
        handlers: StreamHandlers,
        cancel: CancellationToken,
    ) -> Result<ChatCompletionStream, ClientError> {
        self.stream_with(self.force_web_search(request), handlers, cancel)
            .await
    }

    /// Buffered completion with `files` prepended as `file` messages.
    ///
    /// File validation fails before anything is sent.
    pub async fn create_with_files(
        &self,
        mut request: ChatCompletionRequest,
        files: &[FileAttachment],
        options: &FileOptions,
    ) -> Result<ChatCompletionResponse, ClientError> {
        request.messages = prepend_file_messages(request.messages, files, options)?;
        self.create(request).await
    }

    /// Streamed completion with `files` prepended as `file` messages.
    pub async fn stream_with_files(
        &self,
        request: ChatCompletionRequest,
        files: &[FileAttachment],
        options: &FileOptions,
    ) -> Result<ChatCompletionStream, ClientError> {
        self.stream_with_files_and(request, files, options, StreamHandlers::new(), CancellationToken::new())
            .await
    }

    /// [`Completions::stream_with_files`] with observers and a cancellation token.
    ///
    /// A file validation error is reported to `on_error` like any other
    /// failure before the stream starts.
    pub async fn stream_with_files_and(
        &self,
        mut request: ChatCompletionRequest,
        files: &[FileAttachment],
        options: &FileOptions,
        mut handlers: StreamHandlers,
        cancel: CancellationToken,
    ) -> Result<ChatCompletionStream, ClientError> {
        request.messages = match prepend_file_messages(request.messages, files, options) {
            Ok(messages) => messages,
            Err(e) => {
                handlers.error(&e);
                return Err(e);
            }
        };
        self.stream_with(request, handlers, cancel).await
    }

    /// Apply the client's web search toggle to a request that does not
    /// set `web_search` itself.
    pub fn with_web_search_default(&self, mut request: ChatCompletionRequest) -> ChatCompletionRequest {
        if request.web_search.is_none() && self.client.web_search_enabled() {
            request.web_search = Some(true);
            request.web_search_options.get_or_insert_with(|| self.web_search_params());
        }
        request
    }

    fn force_web_search(&self, mut request: ChatCompletionRequest) -> ChatCompletionRequest {
        request.web_search = Some(true);
        request.web_search_options.get_or_insert_with(|| self.web_search_params());
        request
    }

    fn web_search_params(&self) -> WebSearchParams {
        self.client.config().web_search.into()
    }
}

/// `client.models()`
#[derive(Debug, Clone, Copy)]
pub struct Models<'a> {
    client: &'a Client,
}

impl<'a> Models<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// `GET /models`
    pub async fn list(&self) -> Result<ModelList, ClientError> {
        self.client.get("models").await
    }

    /// `GET /models/{id}`
    pub async fn retrieve(&self, id: &str) -> Result<ModelInfo, ClientError> {
        self.client.get(&format!("models/{id}")).await
    }
}

/// `client.images()`
#[derive(Debug, Clone, Copy)]
pub struct Images<'a> {
    client: &'a Client,
}

impl<'a> Images<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// `POST /images/generations`
    pub async fn generate(&self, request: &ImageGenerationRequest) -> Result<ImagesResponse, ClientError> {
        self.client.post("images/generations", request).await
    }
}

/// `client.moderations()`
#[derive(Debug, Clone, Copy)]
pub struct Moderations<'a> {
    client: &'a Client,
}

impl<'a> Moderations<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// `POST /moderations`
    pub async fn create(&self, request: &ModerationRequest) -> Result<ModerationResponse, ClientError> {
        self.client.post("moderations", request).await
    }
}
