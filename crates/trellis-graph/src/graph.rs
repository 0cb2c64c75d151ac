use std::collections::{HashMap, VecDeque};

use trellis_core::types::NodeId;

use crate::node::Node;

/// An immutable, validated DAG. Produced only by `GraphBuilder::build`.
#[derive(Debug, Clone)]
pub struct Graph {
    pub(crate) nodes: Vec<Node>,
    pub(crate) index: HashMap<NodeId, usize>,
    pub(crate) entry_points: Vec<NodeId>,
}

impl Graph {
    /// Nodes in declaration order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn entry_points(&self) -> &[NodeId] {
        &self.entry_points
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// All nodes reachable from `id` through successor edges, excluding `id`
    /// itself, in breadth-first order.
    pub fn descendants(&self, id: &str) -> Vec<NodeId> {
        let Some(start) = self.index_of(id) else {
            return vec![];
        };

        let mut seen = vec![false; self.nodes.len()];
        seen[start] = true;
        let mut queue = VecDeque::from([start]);
        let mut out = Vec::new();

        while let Some(i) = queue.pop_front() {
            for succ in &self.nodes[i].successors {
                if let Some(j) = self.index_of(succ.as_str()) {
                    if !seen[j] {
                        seen[j] = true;
                        out.push(succ.clone());
                        queue.push_back(j);
                    }
                }
            }
        }
        out
    }
}
