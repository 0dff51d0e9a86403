use crate::types::NodeId;

/// Common surface of geometric and contracted edges.
pub trait GraphEdge {
    fn start_node(&self) -> NodeId;
    fn end_node(&self) -> NodeId;

    /// The endpoint opposite to `node`.
    fn adj_node(&self, node: NodeId) -> NodeId {
        if self.start_node() == node {
            self.end_node()
        } else {
            self.start_node()
        }
    }
}
