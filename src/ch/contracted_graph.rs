use crate::{
    constants::INVALID_EDGE,
    edge_direction::{EdgeDirection, TravelDirection},
    error::RoutingError,
    graph::GraphEdge,
    profile::Weight,
    types::{EdgeId, NodeId},
};

const CONTRACTED_BITS: u32 = 30;

/// Largest vertex id a shortcut can reference.
pub const MAX_CONTRACTED_NODE: NodeId = ((1u32 << CONTRACTED_BITS) - 2) as NodeId;

/// Relative slack allowed between a shortcut's weight and the sum of
/// its two constituents, to absorb float accumulation.
const WEIGHT_TOLERANCE: f32 = 1e-3;

/// The payload of a contracted-graph edge, packed into two 32-bit
/// words: the weight's IEEE-754 bits, and `(contracted_id + 1) << 2 |
/// direction` with zero in the high bits meaning "not a shortcut".
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChEdgeData {
    words: [u32; 2],
}

impl ChEdgeData {
    pub fn new(weight: Weight, direction: TravelDirection, contracted: Option<NodeId>) -> Self {
        debug_assert!(weight >= 0.0, "contracted edge weights are nonnegative");
        let via = match contracted {
            Some(node) => {
                debug_assert!(node <= MAX_CONTRACTED_NODE);
                node as u32 + 1
            }
            None => 0,
        };

        ChEdgeData {
            words: [weight.to_bits(), (via << 2) | direction.to_bits()],
        }
    }

    pub fn weight(&self) -> Weight {
        Weight::from_bits(self.words[0])
    }

    pub fn direction(&self) -> TravelDirection {
        TravelDirection::from_bits(self.words[1])
    }

    /// The vertex this edge bypasses; `None` for an original edge.
    pub fn contracted(&self) -> Option<NodeId> {
        match self.words[1] >> 2 {
            0 => None,
            via => Some((via - 1) as NodeId),
        }
    }

    pub fn is_shortcut(&self) -> bool {
        self.words[1] >> 2 != 0
    }

    pub fn words(&self) -> [u32; 2] {
        self.words
    }

    pub fn from_words(words: [u32; 2]) -> Self {
        ChEdgeData { words }
    }
}

/// A directed edge of the contracted meta-graph.
#[derive(Debug, Clone)]
pub struct ContractedEdge {
    start_node: NodeId,
    end_node: NodeId,
    data: ChEdgeData,
}

impl GraphEdge for ContractedEdge {
    fn start_node(&self) -> NodeId {
        self.start_node
    }

    fn end_node(&self) -> NodeId {
        self.end_node
    }
}

impl ContractedEdge {
    pub fn weight(&self) -> Weight {
        self.data.weight()
    }

    pub fn direction(&self) -> TravelDirection {
        self.data.direction()
    }

    pub fn contracted(&self) -> Option<NodeId> {
        self.data.contracted()
    }

    pub fn data(&self) -> ChEdgeData {
        self.data
    }

    /// Whether travel starting at `node` over this edge is allowed.
    pub fn allows_from(&self, node: NodeId) -> bool {
        let orientation = if self.start_node == node {
            EdgeDirection::Forward
        } else {
            EdgeDirection::Backward
        };
        self.data.direction().allows(orientation)
    }
}

/// A contraction hierarchy for one profile: every vertex of the
/// geometric graph with a level imposed by the contraction order,
/// directed edges (original-derived and shortcuts), and a meta table
/// mapping original-derived edges back to geometric edge ids.
pub struct ContractedGraph {
    levels: Vec<usize>,
    edges: Vec<ContractedEdge>,
    adjacency: Vec<Vec<EdgeId>>,
    meta: Vec<EdgeId>,
}

impl ContractedGraph {
    pub(crate) fn new(levels: Vec<usize>) -> Self {
        let nodes = levels.len();
        ContractedGraph {
            levels,
            edges: Vec::new(),
            adjacency: vec![Vec::new(); nodes],
            meta: Vec::new(),
        }
    }

    pub(crate) fn add_edge(
        &mut self,
        start_node: NodeId,
        end_node: NodeId,
        data: ChEdgeData,
        origin: EdgeId,
    ) -> EdgeId {
        let id = self.edges.len();
        self.edges.push(ContractedEdge {
            start_node,
            end_node,
            data,
        });
        self.meta.push(origin);
        self.adjacency[start_node].push(id);
        if start_node != end_node {
            self.adjacency[end_node].push(id);
        }
        id
    }

    pub fn node_count(&self) -> usize {
        self.levels.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn shortcut_count(&self) -> usize {
        self.edges.iter().filter(|e| e.data.is_shortcut()).count()
    }

    pub fn level(&self, node: NodeId) -> usize {
        self.levels[node]
    }

    pub fn edge(&self, edge: EdgeId) -> &ContractedEdge {
        &self.edges[edge]
    }

    pub fn node_edges(&self, node: NodeId) -> &[EdgeId] {
        &self.adjacency[node]
    }

    /// The geometric edge an original-derived edge stands for; `None`
    /// for shortcuts.
    pub fn original_edge(&self, edge: EdgeId) -> Option<EdgeId> {
        match self.meta[edge] {
            INVALID_EDGE => None,
            origin => Some(origin),
        }
    }

    /// The cheapest edge allowing travel `from -> to`, ties broken by
    /// edge id.
    fn find_travel_edge(&self, from: NodeId, to: NodeId) -> Option<(EdgeId, Weight)> {
        let mut best: Option<(EdgeId, Weight)> = None;
        for &edge_id in &self.adjacency[from] {
            let edge = &self.edges[edge_id];
            if edge.adj_node(from) != to || !edge.allows_from(from) {
                continue;
            }
            let weight = edge.weight();
            let better = match best {
                None => true,
                Some((_, best_weight)) => weight < best_weight,
            };
            if better {
                best = Some((edge_id, weight));
            }
        }
        best
    }

    /// Recursively expands a contracted edge into the geometric edge
    /// ids it stands for, in travel order from the edge's start node.
    ///
    /// A shortcut must decompose into two edges through its contracted
    /// vertex, both at strictly lower level; anything else is a corrupt
    /// graph.
    pub(crate) fn unpack_edge(
        &self,
        edge_id: EdgeId,
        out: &mut Vec<EdgeId>,
    ) -> Result<(), RoutingError> {
        let edge = &self.edges[edge_id];

        let Some(via) = edge.contracted() else {
            return match self.original_edge(edge_id) {
                Some(origin) => {
                    out.push(origin);
                    Ok(())
                }
                None => Err(RoutingError::InvariantViolation(format!(
                    "contracted edge {} has neither a contracted vertex nor an original edge",
                    edge_id
                ))),
            };
        };

        let start = edge.start_node();
        let end = edge.end_node();

        if self.levels[via] >= self.levels[start] || self.levels[via] >= self.levels[end] {
            return Err(RoutingError::InvariantViolation(format!(
                "shortcut {} bypasses vertex {} whose level is not below both endpoints",
                edge_id, via
            )));
        }

        let (first, first_weight) = self.find_travel_edge(start, via).ok_or_else(|| {
            RoutingError::InvariantViolation(format!(
                "shortcut {} has no constituent edge {} -> {}",
                edge_id, start, via
            ))
        })?;
        let (second, second_weight) = self.find_travel_edge(via, end).ok_or_else(|| {
            RoutingError::InvariantViolation(format!(
                "shortcut {} has no constituent edge {} -> {}",
                edge_id, via, end
            ))
        })?;

        let sum = first_weight + second_weight;
        let slack = WEIGHT_TOLERANCE * edge.weight().max(1.0);
        if (sum - edge.weight()).abs() > slack {
            return Err(RoutingError::InvariantViolation(format!(
                "shortcut {} weighs {} but its constituents sum to {}",
                edge_id,
                edge.weight(),
                sum
            )));
        }

        self.unpack_edge(first, out)?;
        self.unpack_edge(second, out)
    }

    /// Verifies that every edge carries a sane weight and that every
    /// shortcut expands down to original edges.
    pub(crate) fn validate(&self) -> Result<(), RoutingError> {
        let mut scratch = Vec::new();
        for edge_id in 0..self.edges.len() {
            let edge = &self.edges[edge_id];
            if !edge.weight().is_finite() || edge.weight() < 0.0 {
                return Err(RoutingError::InvariantViolation(format!(
                    "contracted edge {} has weight {}",
                    edge_id,
                    edge.weight()
                )));
            }
            if edge.data.is_shortcut() {
                scratch.clear();
                self.unpack_edge(edge_id, &mut scratch)?;
            }
        }
        Ok(())
    }
}
