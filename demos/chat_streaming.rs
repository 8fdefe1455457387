//! Streaming chat completion with callbacks and Ctrl-C cancellation.
//!
//! Run with:
//! ```bash
//! export OAI_COMPAT_API_KEY="your-api-key"
//! export OAI_COMPAT_PROVIDER="openai"
//! cargo run --example chat_streaming
//! ```

use std::io::Write;

use futures::StreamExt;
use oai_compat::{CancellationToken, ChatCompletionRequest, ChatMessage, Client, StreamHandlers};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = Client::from_env()?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let handlers = StreamHandlers::new()
        .on_complete(|| println!("\n[stream complete]"))
        .on_warning(|e, payload| eprintln!("\n[skipped frame: {e}] {payload}"))
        .on_error(|e| eprintln!("\n[stream error] {e}"));

    let request = ChatCompletionRequest::new(
        "gpt-4o-mini",
        vec![ChatMessage::user("Write a haiku about Rust programming.")],
    )
    .with_temperature(0.9);

    println!("Streaming response...\n");

    let mut stream = client
        .chat()
        .completions()
        .stream_with(request, handlers, cancel)
        .await?;

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => {
                print!("{}", chunk.delta_content().unwrap_or_default());
                std::io::stdout().flush()?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
