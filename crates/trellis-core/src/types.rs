use std::borrow::Borrow;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one graph invocation.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node identity: a name unique within one graph.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Lifecycle state of one node within a run.
///
/// `Blocked -> Ready -> Running -> Completed | Failed`, or `Blocked -> Skipped`
/// when the failure policy prunes the node before it ever becomes ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Blocked,
    Ready,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl NodeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the scheduler does with the descendants of a failed node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Never run descendants of a failed node; they end `Skipped`.
    #[default]
    SkipDescendants,
    /// Run descendants anyway, with an empty contribution from the failed node.
    BestEffort,
}

/// Terminal status of a whole graph run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphRunStatus {
    Success,
    PartialFailure,
    Failure,
}

impl GraphRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialFailure => "partial_failure",
            Self::Failure => "failure",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for GraphRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a node was skipped without running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SkipCause {
    /// An ancestor failed under the skip-descendants policy.
    UpstreamFailed { node: NodeId },
    /// The run was cancelled before the node became ready.
    Cancelled,
}

impl std::fmt::Display for SkipCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UpstreamFailed { node } => write!(f, "upstream node {} failed", node),
            Self::Cancelled => f.write_str("run cancelled"),
        }
    }
}

/// One predecessor's contribution to a join node's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPart {
    pub from: NodeId,
    pub content: String,
}

/// The input handed to a worker: the invocation payload plus the outputs of
/// the node's predecessors, in declared edge order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedInput {
    pub task: String,
    #[serde(default)]
    pub parts: Vec<InputPart>,
}

impl MergedInput {
    /// Input for an entry node: the invocation payload alone.
    pub fn seed(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            parts: vec![],
        }
    }

    pub fn with_part(mut self, from: impl Into<NodeId>, content: impl Into<String>) -> Self {
        self.parts.push(InputPart {
            from: from.into(),
            content: content.into(),
        });
        self
    }

    pub fn is_seed(&self) -> bool {
        self.parts.is_empty()
    }

    /// Render as a single prompt.
    ///
    /// Entry nodes see the task verbatim. Join nodes see the task followed by
    /// one `From <node>:` section per predecessor.
    pub fn render(&self) -> String {
        if self.parts.is_empty() {
            return self.task.clone();
        }

        let mut prompt = format!("Original task: {}\n\nInputs from previous nodes:\n", self.task);
        for part in &self.parts {
            prompt.push_str(&format!("\nFrom {}:\n{}\n", part.from, part.content));
        }
        prompt
    }
}

/// Role in a chat exchange with a model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
}

/// One element of a streaming chat completion.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamDelta {
    /// A chunk of text content.
    TextDelta(String),
    Stop(StopReason),
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },
}
