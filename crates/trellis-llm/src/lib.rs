pub mod openai;
pub mod retry;
pub mod streaming;
pub mod worker;

use std::sync::Arc;

use trellis_core::config::ModelConfig;
use trellis_core::error::{Result, TrellisError};
use trellis_core::traits::LlmClient;

pub use openai::OpenAiClient;
pub use retry::RetryingClient;
pub use worker::LlmWorker;

/// Create an LLM client for `config.provider`, wrapped in retries when
/// `[model.retry]` is set.
///
/// Every supported provider speaks the OpenAI chat-completions protocol;
/// point `base_url` at Ollama, vLLM, Groq, OpenRouter and the like.
pub fn create_client(config: &ModelConfig) -> Result<Arc<dyn LlmClient>> {
    let client: Box<dyn LlmClient> = match config.provider.as_str() {
        "openai" | "ollama" | "vllm" | "groq" | "openrouter" | "openai-compatible" => {
            Box::new(OpenAiClient::new())
        }
        other => {
            return Err(TrellisError::Config(format!(
                "unsupported model provider '{other}'"
            )))
        }
    };

    Ok(match &config.retry {
        Some(retry) => Arc::new(RetryingClient::new(client, retry.clone())),
        None => Arc::from(client),
    })
}
