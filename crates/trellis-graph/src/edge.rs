use trellis_core::types::NodeId;

/// A dependency between two nodes: `to` cannot start until `from` has finished.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    /// Source node id.
    pub from: NodeId,
    /// Target node id.
    pub to: NodeId,
}

impl Edge {
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_new() {
        let e = Edge::new("tech", "writer");
        assert_eq!(e.from.as_str(), "tech");
        assert_eq!(e.to.as_str(), "writer");
        assert!(!e.is_self_loop());
        assert!(Edge::new("a", "a").is_self_loop());
    }
}
