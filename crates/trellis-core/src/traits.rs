use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::config::ModelConfig;
use crate::error::Result;
use crate::types::{ChatMessage, MergedInput, StreamDelta};

/// Lazy, finite sequence of output fragments produced by one worker invocation.
/// An `Err` item ends the sequence.
pub type FragmentStream<'a> = BoxStream<'a, Result<String>>;

/// The opaque computation bound to a graph node.
///
/// The scheduler never inspects concrete worker types; it only invokes them
/// and consumes the fragment stream. A node's final output is the
/// concatenation of every fragment it yielded.
pub trait Worker: Send + Sync + 'static {
    /// Short label used in logs (e.g. "llm", "echo").
    fn kind(&self) -> &str;

    /// Start one invocation. The returned stream is not restartable.
    fn invoke(&self, input: MergedInput) -> BoxFuture<'_, Result<FragmentStream<'_>>>;
}

/// Pluggable provider backend for model-backed workers.
pub trait LlmClient: Send + Sync + 'static {
    /// Send a chat request and receive a stream of deltas.
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>>;
}
