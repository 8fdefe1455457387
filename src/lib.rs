//! # oai-compat - client for OpenAI-compatible APIs
//!
//! Chat completions (buffered and streamed), image generation, moderation
//! and model listing against OpenAI, a default hosted provider, or any
//! custom OpenAI-compatible endpoint.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Incremental SSE decoding of streamed chat completions
//! - Exponential backoff on server errors for buffered requests
//! - Cancellation of streams through a `CancellationToken`
//! - Web search flag and file attachments as request augmentation
//!
//! ## Architecture
//!
//! - **`options`**: caller options merged over defaults into a `ClientConfig`
//! - **`client`**: the `Client`, its executors and `ClientError`
//! - **`sse`** / **`stream`**: line framing and the chunk stream
//! - **`resources`**: `chat().completions()`, `models()`, `images()`, `moderations()`
//!
//! ## Example
//! ```no_run
//! use futures::StreamExt;
//! use oai_compat::{ChatCompletionRequest, ChatMessage, Client, ClientOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::new(ClientOptions::new("your-api-key"))?;
//!
//!     let request = ChatCompletionRequest::new(
//!         "gpt-4o",
//!         vec![ChatMessage::user("Hello!")],
//!     );
//!
//!     let mut stream = client.chat().completions().stream(request).await?;
//!     while let Some(chunk) = stream.next().await {
//!         print!("{}", chunk?.delta_content().unwrap_or_default());
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod files;
pub mod http;
pub mod model;
pub mod options;
pub mod providers;
pub mod resources;
pub mod retry;
pub mod sse;
pub mod stream;

// Re-exports for convenience
pub use client::{Client, ClientError};
pub use files::{create_file_messages, FileAttachment, FileOptions};
pub use model::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Role, Tool, ToolCall,
};
pub use options::{ClientConfig, ClientOptions, SecretString, WebSearchOptions};
pub use providers::Provider;
pub use stream::{ChatCompletionStream, StreamHandlers};
pub use tokio_util::sync::CancellationToken;
