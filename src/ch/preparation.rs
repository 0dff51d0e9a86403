use crate::{
    constants::INVALID_EDGE,
    edge_direction::{EdgeDirection, TravelDirection},
    graph::GraphEdge,
    profile::{Weight, Weighting},
    road_graph::RoadGraph,
    types::{EdgeId, NodeId},
};

/// A directed-capable edge of the contraction working graph: either
/// derived from a geometric edge (carrying its id) or a shortcut added
/// while contracting.
#[derive(Debug, Clone)]
pub(crate) struct PrepEdge {
    pub start_node: NodeId,
    pub end_node: NodeId,
    pub weight: Weight,
    pub direction: TravelDirection,
    pub contracted: Option<NodeId>,
    pub origin: EdgeId,
}

impl GraphEdge for PrepEdge {
    fn start_node(&self) -> NodeId {
        self.start_node
    }

    fn end_node(&self) -> NodeId {
        self.end_node
    }
}

impl PrepEdge {
    pub fn allows_from(&self, node: NodeId) -> bool {
        let orientation = if self.start_node == node {
            EdgeDirection::Forward
        } else {
            EdgeDirection::Backward
        };
        self.direction.allows(orientation)
    }
}

/// The mutable graph the contraction works on. Contracted vertices stay
/// in the adjacency lists and are skipped by the accessors, so removal
/// never reindexes anything.
pub(crate) struct PreparationGraph {
    edges: Vec<PrepEdge>,
    adjacency: Vec<Vec<EdgeId>>,
    contracted: Vec<bool>,
}

impl PreparationGraph {
    /// Projects the geometric graph through a weighting: traversable
    /// edges keep their weight and allowed directions, the rest are
    /// dropped.
    pub fn from_graph<W: Weighting>(graph: &RoadGraph, weighting: &W) -> Self {
        let mut prep = PreparationGraph {
            edges: Vec::with_capacity(graph.edge_count()),
            adjacency: vec![Vec::new(); graph.vertex_count()],
            contracted: vec![false; graph.vertex_count()],
        };

        for edge in graph.edges() {
            let forward = weighting.edge_weight(edge, EdgeDirection::Forward);
            let backward = weighting.edge_weight(edge, EdgeDirection::Backward);

            let (weight, direction) = match (forward, backward) {
                (Some(weight), Some(_)) => (weight, TravelDirection::Both),
                (Some(weight), None) => (weight, TravelDirection::Forward),
                (None, Some(weight)) => (weight, TravelDirection::Backward),
                (None, None) => continue,
            };

            prep.push_edge(PrepEdge {
                start_node: edge.start_node(),
                end_node: edge.end_node(),
                weight,
                direction,
                contracted: None,
                origin: edge.id(),
            });
        }

        prep
    }

    fn push_edge(&mut self, edge: PrepEdge) -> EdgeId {
        let id = self.edges.len();
        self.adjacency[edge.start_node].push(id);
        if edge.start_node != edge.end_node {
            self.adjacency[edge.end_node].push(id);
        }
        self.edges.push(edge);
        id
    }

    pub fn add_shortcut(&mut self, from: NodeId, to: NodeId, weight: Weight, via: NodeId) {
        self.push_edge(PrepEdge {
            start_node: from,
            end_node: to,
            weight,
            direction: TravelDirection::Forward,
            contracted: Some(via),
            origin: INVALID_EDGE,
        });
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn edge(&self, edge: EdgeId) -> &PrepEdge {
        &self.edges[edge]
    }

    pub fn edges(&self) -> &[PrepEdge] {
        &self.edges
    }

    pub fn node_edges(&self, node: NodeId) -> &[EdgeId] {
        &self.adjacency[node]
    }

    pub fn is_contracted(&self, node: NodeId) -> bool {
        self.contracted[node]
    }

    pub fn set_contracted(&mut self, node: NodeId) {
        self.contracted[node] = true;
    }

    /// Uncontracted neighbours that can reach `node`, with the cheapest
    /// weight over their parallel edges. Sorted by id for determinism.
    pub fn incoming_neighbors(&self, node: NodeId) -> Vec<(NodeId, Weight)> {
        self.neighbors(node, |edge, adj| edge.allows_from(adj))
    }

    /// Uncontracted neighbours reachable from `node`, cheapest first.
    pub fn outgoing_neighbors(&self, node: NodeId) -> Vec<(NodeId, Weight)> {
        self.neighbors(node, |edge, _| edge.allows_from(node))
    }

    fn neighbors(
        &self,
        node: NodeId,
        allowed: impl Fn(&PrepEdge, NodeId) -> bool,
    ) -> Vec<(NodeId, Weight)> {
        let mut best: Vec<(NodeId, Weight)> = Vec::new();
        for &edge_id in &self.adjacency[node] {
            let edge = &self.edges[edge_id];
            let adj = edge.adj_node(node);
            if adj == node || self.contracted[adj] || !allowed(edge, adj) {
                continue;
            }
            match best.iter_mut().find(|(n, _)| *n == adj) {
                Some((_, weight)) => *weight = weight.min(edge.weight),
                None => best.push((adj, edge.weight)),
            }
        }
        best.sort_by_key(|&(n, _)| n);
        best
    }
}
