use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use trellis_core::config::{GraphConfig, NodeConfig};
use trellis_core::error::GraphValidationError;
use trellis_core::traits::Worker;
use trellis_core::types::NodeId;

use crate::edge::Edge;
use crate::graph::Graph;
use crate::node::Node;

struct NodeDecl {
    id: NodeId,
    worker: Arc<dyn Worker>,
    timeout: Option<Duration>,
}

/// Collects node, edge, and entry-point declarations and turns them into a
/// validated, immutable `Graph`.
///
/// All mutation happens here; nothing survives past `build()` except the
/// resulting graph.
#[derive(Default)]
pub struct GraphBuilder {
    nodes: Vec<NodeDecl>,
    edges: Vec<Edge>,
    entry_points: Vec<NodeId>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a node bound to a worker.
    pub fn add_node(self, name: impl Into<NodeId>, worker: Arc<dyn Worker>) -> Self {
        self.add_node_with_timeout(name, worker, None)
    }

    /// Declare a node with its own deadline.
    pub fn add_node_with_timeout(
        mut self,
        name: impl Into<NodeId>,
        worker: Arc<dyn Worker>,
        timeout: Option<Duration>,
    ) -> Self {
        self.nodes.push(NodeDecl {
            id: name.into(),
            worker,
            timeout,
        });
        self
    }

    /// Declare a dependency: `destination` waits for `source`.
    pub fn add_edge(mut self, source: impl Into<NodeId>, destination: impl Into<NodeId>) -> Self {
        self.edges.push(Edge::new(source, destination));
        self
    }

    /// Declare an entry point explicitly. When any are declared they must
    /// match the nodes without predecessors exactly.
    pub fn set_entry_point(mut self, name: impl Into<NodeId>) -> Self {
        let id = name.into();
        if !self.entry_points.contains(&id) {
            self.entry_points.push(id);
        }
        self
    }

    /// Declare everything in a `[graph]` config section, asking `make_worker`
    /// for each node's worker.
    pub fn from_config<F>(config: &GraphConfig, mut make_worker: F) -> trellis_core::Result<Self>
    where
        F: FnMut(&NodeConfig) -> trellis_core::Result<Arc<dyn Worker>>,
    {
        let mut builder = Self::new();
        for node in &config.nodes {
            let worker = make_worker(node)?;
            let timeout = node.timeout_secs.map(Duration::from_secs);
            builder = builder.add_node_with_timeout(node.name.as_str(), worker, timeout);
        }
        for edge in &config.edges {
            builder = builder.add_edge(edge.from.as_str(), edge.to.as_str());
        }
        for entry in &config.entry_points {
            builder = builder.set_entry_point(entry.as_str());
        }
        Ok(builder)
    }

    /// Check the declarations without consuming the builder.
    pub fn validate(&self) -> Result<(), GraphValidationError> {
        self.resolve().map(|_| ())
    }

    /// Validate and produce the executable graph.
    pub fn build(self) -> Result<Graph, GraphValidationError> {
        let (preds, succs, entry_points) = self.resolve()?;

        let index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id.clone(), i))
            .collect();

        let nodes = self
            .nodes
            .into_iter()
            .zip(preds.into_iter().zip(succs))
            .map(|(decl, (predecessors, successors))| Node {
                id: decl.id,
                worker: decl.worker,
                predecessors,
                successors,
                timeout: decl.timeout,
            })
            .collect();

        Ok(Graph {
            nodes,
            index,
            entry_points,
        })
    }

    /// Runs every check and returns per-node predecessor and successor lists
    /// (declaration-indexed, edge order) plus the effective entry points.
    #[allow(clippy::type_complexity)]
    fn resolve(
        &self,
    ) -> Result<(Vec<Vec<NodeId>>, Vec<Vec<NodeId>>, Vec<NodeId>), GraphValidationError> {
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(self.nodes.len());
        for (i, decl) in self.nodes.iter().enumerate() {
            if index.insert(decl.id.as_str(), i).is_some() {
                return Err(GraphValidationError::DuplicateNode(decl.id.clone()));
            }
        }

        let mut preds: Vec<Vec<NodeId>> = vec![Vec::new(); self.nodes.len()];
        let mut succs: Vec<Vec<NodeId>> = vec![Vec::new(); self.nodes.len()];
        let mut seen_edges: HashSet<&Edge> = HashSet::new();

        for edge in &self.edges {
            let lookup = |id: &NodeId| {
                index
                    .get(id.as_str())
                    .copied()
                    .ok_or_else(|| GraphValidationError::UnknownNode {
                        from: edge.from.clone(),
                        to: edge.to.clone(),
                        missing: id.clone(),
                    })
            };
            let from = lookup(&edge.from)?;
            let to = lookup(&edge.to)?;

            if edge.is_self_loop() {
                return Err(GraphValidationError::CycleDetected(edge.from.clone()));
            }
            // A repeated edge adds no new dependency.
            if !seen_edges.insert(edge) {
                continue;
            }
            succs[from].push(edge.to.clone());
            preds[to].push(edge.from.clone());
        }

        if let Some(node) = find_cycle(&succs, &index) {
            return Err(GraphValidationError::CycleDetected(self.nodes[node].id.clone()));
        }

        let inferred: Vec<NodeId> = self
            .nodes
            .iter()
            .zip(&preds)
            .filter(|(_, p)| p.is_empty())
            .map(|(d, _)| d.id.clone())
            .collect();

        if !self.nodes.is_empty() && inferred.is_empty() {
            return Err(GraphValidationError::NoEntryPoint);
        }

        let entry_points = if self.entry_points.is_empty() {
            inferred
        } else {
            let declared: HashSet<&NodeId> = self.entry_points.iter().collect();
            let expected: HashSet<&NodeId> = inferred.iter().collect();
            if declared != expected {
                return Err(GraphValidationError::EntryPointMismatch {
                    declared: self.entry_points.clone(),
                    inferred,
                });
            }
            self.entry_points.clone()
        };

        Ok((preds, succs, entry_points))
    }
}

/// Depth-first search for a back edge. Returns a node on the cycle.
fn find_cycle(succs: &[Vec<NodeId>], index: &HashMap<&str, usize>) -> Option<usize> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Done,
    }

    let mut marks = vec![Mark::New; succs.len()];

    for root in 0..succs.len() {
        if marks[root] != Mark::New {
            continue;
        }
        // (node, next successor to visit)
        let mut stack = vec![(root, 0usize)];
        marks[root] = Mark::Active;

        while let Some(top) = stack.last_mut() {
            let node = top.0;
            if let Some(succ) = succs[node].get(top.1) {
                top.1 += 1;
                let j = index[succ.as_str()];
                match marks[j] {
                    Mark::Active => return Some(j),
                    Mark::New => {
                        marks[j] = Mark::Active;
                        stack.push((j, 0));
                    }
                    Mark::Done => {}
                }
            } else {
                marks[node] = Mark::Done;
                stack.pop();
            }
        }
    }
    None
}
