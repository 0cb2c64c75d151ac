use crate::error::NodeExecutionError;
use crate::types::{GraphRunStatus, NodeId, SkipCause};

/// One event of a graph run, as delivered to the external consumer.
///
/// Per node the order is always `NodeStarted`, any number of `NodeFragment`,
/// then exactly one of `NodeFinished` / `NodeFailed`. Skipped nodes emit a
/// single `NodeSkipped` instead. `GraphCompleted` is the last event of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    NodeStarted {
        node: NodeId,
    },
    NodeFragment {
        node: NodeId,
        fragment: String,
    },
    NodeFinished {
        node: NodeId,
        output: String,
    },
    NodeFailed {
        node: NodeId,
        output: String,
        error: NodeExecutionError,
    },
    NodeSkipped {
        node: NodeId,
        cause: SkipCause,
    },
    GraphCompleted {
        status: GraphRunStatus,
    },
}

impl StreamEvent {
    /// The node this event belongs to, `None` for `GraphCompleted`.
    pub fn node(&self) -> Option<&NodeId> {
        match self {
            Self::NodeStarted { node }
            | Self::NodeFragment { node, .. }
            | Self::NodeFinished { node, .. }
            | Self::NodeFailed { node, .. }
            | Self::NodeSkipped { node, .. } => Some(node),
            Self::GraphCompleted { .. } => None,
        }
    }

    /// Whether this event closes its node's sub-stream.
    pub fn is_node_terminal(&self) -> bool {
        matches!(
            self,
            Self::NodeFinished { .. } | Self::NodeFailed { .. } | Self::NodeSkipped { .. }
        )
    }
}
