pub(crate) mod bidirectional;
pub(crate) mod ch_search;
pub(crate) mod dijkstra;

use std::cmp::Ordering;

use crate::{
    edge_direction::EdgeDirection,
    profile::Weight,
    types::{EdgeId, NodeId},
};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub(crate) enum SearchDirection {
    Forward,
    Backward,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct HeapItem {
    pub node_id: NodeId,
    pub weight: Weight,
}

impl Eq for HeapItem {}
impl PartialEq for HeapItem {
    fn eq(&self, other: &HeapItem) -> bool {
        self.weight == other.weight && self.node_id == other.node_id
    }
}

impl PartialOrd for HeapItem {
    fn partial_cmp(&self, other: &HeapItem) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Flip weight to make this a min-heap; break ties by node id so
        // settlement order is reproducible.
        other
            .weight
            .total_cmp(&self.weight)
            .then_with(|| other.node_id.cmp(&self.node_id))
    }
}

/// A search result mapped back to the geometric graph: the original
/// edges between the vertex the route leaves the source edge through
/// and the vertex it enters the target edge through.
#[derive(Debug)]
pub(crate) struct EdgePath {
    pub edges: Vec<(EdgeId, EdgeDirection)>,
    pub source_node: NodeId,
    pub target_node: NodeId,
    pub weight: Weight,
}
