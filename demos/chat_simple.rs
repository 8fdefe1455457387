//! Simple chat completion against any OpenAI-compatible endpoint.
//!
//! Run with:
//! ```bash
//! export OAI_COMPAT_API_KEY="your-api-key"
//! export OAI_COMPAT_PROVIDER="openai"
//! cargo run --example chat_simple
//! ```

use oai_compat::{ChatCompletionRequest, ChatMessage, Client};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = Client::from_env()?;
    println!("Using {} ({})", client.config().provider, client.config().base_url);

    let models = client.models().list().await?;
    println!("{} models available", models.data.len());

    let request = ChatCompletionRequest::new(
        "gpt-4o-mini",
        vec![
            ChatMessage::system("Answer in one word."),
            ChatMessage::user("What is the capital of France?"),
        ],
    )
    .with_temperature(0.2)
    .with_max_tokens(16);

    match client.chat().completions().create(request).await {
        Ok(response) => {
            println!("\n=== Response ===");
            println!("{}", response.text().unwrap_or_default());

            if let Some(usage) = &response.usage {
                println!("Prompt tokens: {}", usage.prompt_tokens);
                println!("Completion tokens: {}", usage.completion_tokens);
            }
            if let Some(choice) = response.choices.first() {
                println!("Finish reason: {:?}", choice.finish_reason);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
