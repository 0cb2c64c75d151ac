use trellis_core::error::NodeExecutionError;
use trellis_core::types::{GraphRunStatus, NodeId, NodeState, RunId, SkipCause};

/// Per-invocation record of one node.
#[derive(Debug, Clone)]
pub struct NodeRun {
    pub node: NodeId,
    pub state: NodeState,
    /// Concatenation of every fragment the node emitted.
    pub output: String,
    pub error: Option<NodeExecutionError>,
    pub skip_cause: Option<SkipCause>,
    /// Every state the run has been in, oldest first.
    pub history: Vec<NodeState>,
    pub elapsed_ms: u64,
}

impl NodeRun {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            state: NodeState::Blocked,
            output: String::new(),
            error: None,
            skip_cause: None,
            history: vec![NodeState::Blocked],
            elapsed_ms: 0,
        }
    }

    pub(crate) fn transition(&mut self, next: NodeState) {
        debug_assert!(
            is_valid_transition(self.state, next),
            "invalid transition for {}: {} -> {}",
            self.node,
            self.state,
            next
        );
        self.state = next;
        self.history.push(next);
    }

    pub fn succeeded(&self) -> bool {
        self.state == NodeState::Completed
    }
}

fn is_valid_transition(from: NodeState, to: NodeState) -> bool {
    use NodeState::*;
    matches!(
        (from, to),
        (Blocked, Ready)
            | (Blocked, Skipped)
            | (Ready, Running)
            | (Ready, Skipped)
            | (Running, Completed)
            | (Running, Failed)
    )
}

/// Final record of a graph run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: RunId,
    pub status: GraphRunStatus,
    /// One record per node, in declaration order.
    pub nodes: Vec<NodeRun>,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn node(&self, id: &str) -> Option<&NodeRun> {
        self.nodes.iter().find(|r| r.node.as_str() == id)
    }
}
