use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};

use trellis_core::error::{Result, TrellisError};
use trellis_core::traits::{FragmentStream, Worker};
use trellis_core::types::MergedInput;

/// Offline worker: streams its rendered input back, word by word, prefixed
/// with the node's persona. Used by `trellis run --offline` and in tests.
pub struct EchoWorker {
    persona: String,
    delay: Duration,
}

impl EchoWorker {
    pub fn new(persona: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
            delay: Duration::ZERO,
        }
    }

    /// Pause between fragments, to make interleaving visible.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn words(&self, input: &MergedInput) -> Vec<String> {
        let text = format!("[{}] {}", self.persona, input.render());
        text.split_inclusive(' ').map(str::to_string).collect()
    }
}

impl Worker for EchoWorker {
    fn kind(&self) -> &str {
        "echo"
    }

    fn invoke(&self, input: MergedInput) -> BoxFuture<'_, Result<FragmentStream<'_>>> {
        let words = self.words(&input);
        let delay = self.delay;

        Box::pin(async move {
            let fragments = stream::iter(words).then(move |word| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok::<_, TrellisError>(word)
            });
            Ok(fragments.boxed())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn test_echo_streams_words() {
        let worker = EchoWorker::new("tech");
        let stream = worker.invoke(MergedInput::seed("hello big world")).await.unwrap();
        let fragments: Vec<String> = stream.try_collect().await.unwrap();

        assert_eq!(fragments, vec!["[tech] ", "hello ", "big ", "world"]);
        assert_eq!(fragments.concat(), "[tech] hello big world");
    }

    #[tokio::test]
    async fn test_echo_renders_join_input() {
        let worker = EchoWorker::new("writer");
        let input = MergedInput::seed("X").with_part("a", "alpha");
        let stream = worker.invoke(input.clone()).await.unwrap();
        let output: String = stream.try_collect::<Vec<_>>().await.unwrap().concat();
        assert_eq!(output, format!("[writer] {}", input.render()));
    }
}
