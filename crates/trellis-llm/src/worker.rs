use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::StreamExt;
use tracing::debug;

use trellis_core::config::ModelConfig;
use trellis_core::error::Result;
use trellis_core::traits::{FragmentStream, LlmClient, Worker};
use trellis_core::types::{ChatMessage, MergedInput, StreamDelta};

/// Graph worker backed by a chat model.
///
/// The node's persona is the system prompt and the rendered merged input is
/// the user message. Every text delta becomes one fragment.
pub struct LlmWorker {
    client: Arc<dyn LlmClient>,
    model: ModelConfig,
    system_prompt: Option<String>,
}

impl LlmWorker {
    pub fn new(client: Arc<dyn LlmClient>, model: ModelConfig) -> Self {
        Self {
            client,
            model,
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    fn messages(&self, input: &MergedInput) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2);
        if let Some(prompt) = &self.system_prompt {
            messages.push(ChatMessage::system(prompt.clone()));
        }
        messages.push(ChatMessage::user(input.render()));
        messages
    }
}

impl Worker for LlmWorker {
    fn kind(&self) -> &str {
        "llm"
    }

    fn invoke(&self, input: MergedInput) -> BoxFuture<'_, Result<FragmentStream<'_>>> {
        let messages = self.messages(&input);

        Box::pin(async move {
            let deltas = self.client.chat_stream(&self.model, messages).await?;
            let model = self.model.model_id.clone();

            let fragments = deltas.filter_map(move |delta| {
                let fragment = match delta {
                    Ok(StreamDelta::TextDelta(text)) => Some(Ok(text)),
                    Ok(StreamDelta::Usage {
                        input_tokens,
                        output_tokens,
                    }) => {
                        debug!(model = %model, input_tokens, output_tokens, "Token usage");
                        None
                    }
                    Ok(StreamDelta::Stop(reason)) => {
                        debug!(model = %model, ?reason, "Model stopped");
                        None
                    }
                    Err(e) => Some(Err(e)),
                };
                futures::future::ready(fragment)
            });

            Ok(fragments.boxed())
        })
    }
}
