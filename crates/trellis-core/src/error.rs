use thiserror::Error;

use crate::types::NodeId;

/// Structural problems found while building a graph. Fatal: the run never starts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphValidationError {
    #[error("Duplicate node: {0}")]
    DuplicateNode(NodeId),

    #[error("Edge {from} -> {to} references undeclared node {missing}")]
    UnknownNode {
        from: NodeId,
        to: NodeId,
        missing: NodeId,
    },

    #[error("Cycle detected through node {0}")]
    CycleDetected(NodeId),

    #[error("Graph has nodes but none without predecessors")]
    NoEntryPoint,

    #[error("Declared entry points {declared:?} do not match nodes without predecessors {inferred:?}")]
    EntryPointMismatch {
        declared: Vec<NodeId>,
        inferred: Vec<NodeId>,
    },
}

/// Why a single node run failed. Contained by the node executor and never
/// propagated out of the scheduler.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NodeExecutionError {
    #[error("Worker failed: {0}")]
    Worker(String),

    #[error("Node timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Node cancelled")]
    Cancelled,
}

impl NodeExecutionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[derive(Debug, Error)]
pub enum TrellisError {
    // Graph errors
    #[error("Graph validation failed: {0}")]
    Validation(#[from] GraphValidationError),

    #[error("Event stream closed by consumer")]
    StreamClosed,

    #[error("Run task failed: {0}")]
    RunTask(String),

    // Worker errors
    #[error("Worker error: {0}")]
    Worker(String),

    // LLM errors
    #[error("LLM request failed: {0}")]
    LlmRequest(String),

    #[error("LLM streaming error: {0}")]
    LlmStream(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TrellisError>;
