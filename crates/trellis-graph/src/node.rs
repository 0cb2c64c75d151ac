use std::sync::Arc;
use std::time::Duration;

use trellis_core::traits::Worker;
use trellis_core::types::NodeId;

/// A node in a validated graph.
///
/// Predecessors are kept in edge declaration order; that order fixes the
/// layout of the node's merged input regardless of completion timing.
#[derive(Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) worker: Arc<dyn Worker>,
    pub(crate) predecessors: Vec<NodeId>,
    pub(crate) successors: Vec<NodeId>,
    pub(crate) timeout: Option<Duration>,
}

impl Node {
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn worker(&self) -> &Arc<dyn Worker> {
        &self.worker
    }

    pub fn predecessors(&self) -> &[NodeId] {
        &self.predecessors
    }

    pub fn successors(&self) -> &[NodeId] {
        &self.successors
    }

    /// Per-node deadline, overriding the scheduler-wide one.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_entry(&self) -> bool {
        self.predecessors.is_empty()
    }

    /// Slot of `pred` in this node's merged input.
    pub fn input_slot(&self, pred: &NodeId) -> Option<usize> {
        self.predecessors.iter().position(|p| p == pred)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("worker", &self.worker.kind())
            .field("predecessors", &self.predecessors)
            .field("successors", &self.successors)
            .field("timeout", &self.timeout)
            .finish()
    }
}
