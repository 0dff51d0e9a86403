use std::collections::BinaryHeap;

use fxhash::FxHashMap;

use crate::{
    cancel::CancelToken,
    ch::contracted_graph::ContractedGraph,
    constants::{INVALID_EDGE, INVALID_NODE},
    edge_direction::EdgeDirection,
    error::RoutingError,
    graph::GraphEdge,
    profile::Weight,
    road_graph::RoadGraph,
    types::{EdgeId, NodeId},
};

use super::{dijkstra::NodeEntry, EdgePath, HeapItem, SearchDirection};

/// One side of a hierarchy query. Both sides search "upward": only
/// edges leading to strictly higher-level vertices are relaxed, the
/// forward side along the allowed travel direction and the backward
/// side against it.
struct ChSearch<'a> {
    graph: &'a ContractedGraph,
    direction: SearchDirection,
    heap: BinaryHeap<HeapItem>,
    data: FxHashMap<NodeId, NodeEntry>,
}

impl<'a> ChSearch<'a> {
    fn new(graph: &'a ContractedGraph, direction: SearchDirection) -> Self {
        ChSearch {
            graph,
            direction,
            heap: BinaryHeap::new(),
            data: FxHashMap::default(),
        }
    }

    fn init(&mut self, node_id: NodeId, weight: Weight) {
        let entry = self
            .data
            .entry(node_id)
            .or_insert_with(|| NodeEntry::frontier(weight));
        if weight <= entry.weight {
            entry.weight = weight;
            entry.parent = INVALID_NODE;
            entry.edge = INVALID_EDGE;
            self.heap.push(HeapItem { node_id, weight });
        }
    }

    fn peek_weight(&self) -> Option<Weight> {
        self.heap.peek().map(|item| item.weight)
    }

    fn best_weight(&self, node_id: NodeId) -> Option<Weight> {
        self.data.get(&node_id).map(|entry| entry.weight)
    }

    fn settle_next(
        &mut self,
        cancel: &CancelToken,
    ) -> Result<Option<(NodeId, Weight)>, RoutingError> {
        while let Some(HeapItem { node_id, weight }) = self.heap.pop() {
            if cancel.is_canceled() {
                return Err(RoutingError::Canceled);
            }

            {
                let entry = &self.data[&node_id];
                if entry.settled || weight > entry.weight {
                    continue;
                }
            }

            for &edge_id in self.graph.node_edges(node_id) {
                let edge = self.graph.edge(edge_id);
                let adj_node = edge.adj_node(node_id);

                if self.graph.level(adj_node) <= self.graph.level(node_id) {
                    continue;
                }

                let allowed = match self.direction {
                    SearchDirection::Forward => edge.allows_from(node_id),
                    SearchDirection::Backward => edge.allows_from(adj_node),
                };
                if !allowed {
                    continue;
                }

                if self.data.get(&adj_node).is_some_and(|entry| entry.settled) {
                    continue;
                }

                let next_weight = weight + edge.weight();
                let entry = self.data.entry(adj_node).or_insert(NodeEntry {
                    weight: Weight::INFINITY,
                    parent: INVALID_NODE,
                    edge: INVALID_EDGE,
                    settled: false,
                });

                if next_weight < entry.weight {
                    entry.weight = next_weight;
                    entry.parent = node_id;
                    entry.edge = edge_id;
                    self.heap.push(HeapItem {
                        node_id: adj_node,
                        weight: next_weight,
                    });
                }
            }

            self.data.get_mut(&node_id).unwrap().settled = true;
            return Ok(Some((node_id, weight)));
        }

        Ok(None)
    }

    /// Contracted-graph edges from `node` back to this side's frontier
    /// seed. Forward chains come out in travel order (seed first),
    /// backward chains run from `node` toward the seed.
    fn chain_to_frontier(&self, node: NodeId) -> (Vec<EdgeId>, NodeId) {
        let mut edges = Vec::with_capacity(32);
        let mut current = node;

        while let Some(entry) = self.data.get(&current) {
            if entry.parent == INVALID_NODE {
                break;
            }
            edges.push(entry.edge);
            current = entry.parent;
        }

        if self.direction == SearchDirection::Forward {
            edges.reverse();
        }
        (edges, current)
    }
}

/// Bidirectional query over a contraction hierarchy, with the same
/// meeting rule and stopping test as the plain engine. Because both
/// searches only climb the hierarchy, they cover disjoint edge sets and
/// may meet at any vertex both have labeled.
pub(crate) struct ChBidirectionalDijkstra<'a> {
    forward: ChSearch<'a>,
    backward: ChSearch<'a>,
    best_weight: Weight,
    meeting_node: NodeId,
}

impl<'a> ChBidirectionalDijkstra<'a> {
    pub fn new(graph: &'a ContractedGraph) -> Self {
        ChBidirectionalDijkstra {
            forward: ChSearch::new(graph, SearchDirection::Forward),
            backward: ChSearch::new(graph, SearchDirection::Backward),
            best_weight: Weight::INFINITY,
            meeting_node: INVALID_NODE,
        }
    }

    pub fn init_source(&mut self, entries: &[(NodeId, Weight)]) {
        for &(node, weight) in entries {
            self.forward.init(node, weight);
        }
    }

    pub fn init_target(&mut self, entries: &[(NodeId, Weight)]) {
        for &(node, weight) in entries {
            self.backward.init(node, weight);
        }
    }

    pub fn run(&mut self, cancel: &CancelToken) -> Result<(), RoutingError> {
        loop {
            let min_forward = self.forward.peek_weight();
            let min_backward = self.backward.peek_weight();

            if min_forward.is_none() && min_backward.is_none() {
                return Ok(());
            }

            if self.meeting_node != INVALID_NODE
                && min_forward.unwrap_or(0.0) + min_backward.unwrap_or(0.0) >= self.best_weight
            {
                return Ok(());
            }

            let forward_turn = match (min_forward, min_backward) {
                (Some(f), Some(b)) => f <= b,
                (Some(_), None) => true,
                (None, _) => false,
            };

            let settled = if forward_turn {
                self.forward.settle_next(cancel)?
            } else {
                self.backward.settle_next(cancel)?
            };

            let Some((node, weight)) = settled else {
                continue;
            };

            let other = if forward_turn {
                &self.backward
            } else {
                &self.forward
            };

            if let Some(other_weight) = other.best_weight(node) {
                let total = weight + other_weight;
                if total < self.best_weight {
                    self.best_weight = total;
                    self.meeting_node = node;
                }
            }
        }
    }

    /// Reconstructs the original-graph path: concatenates both chains
    /// of contracted edges, expands every shortcut, and maps the result
    /// back to geometric edges with their travel orientation.
    pub fn edge_path(
        &self,
        contracted: &ContractedGraph,
        graph: &RoadGraph,
    ) -> Result<EdgePath, RoutingError> {
        if self.meeting_node == INVALID_NODE {
            return Err(RoutingError::RouteNotFound(
                "the searches never met".to_string(),
            ));
        }

        let (mut ch_edges, source_node) = self.forward.chain_to_frontier(self.meeting_node);
        let (mut backward_edges, target_node) = self.backward.chain_to_frontier(self.meeting_node);

        // A meeting vertex sitting on one chain can duplicate the edge
        // leading into it; drop the U-turn pair once.
        if let (Some(&last), Some(&first)) = (ch_edges.last(), backward_edges.first()) {
            if last == first {
                ch_edges.pop();
                backward_edges.remove(0);
            }
        }
        ch_edges.extend(backward_edges);

        let mut original = Vec::with_capacity(ch_edges.len());
        for ch_edge in ch_edges {
            contracted.unpack_edge(ch_edge, &mut original)?;
        }

        let mut edges = Vec::with_capacity(original.len());
        let mut current = source_node;
        for edge_id in original {
            let edge = graph.edge(edge_id);
            let (orientation, next) = if edge.start_node() == current {
                (EdgeDirection::Forward, edge.end_node())
            } else if edge.end_node() == current {
                (EdgeDirection::Backward, edge.start_node())
            } else {
                return Err(RoutingError::InvariantViolation(format!(
                    "unpacked edge {} does not continue the path at vertex {}",
                    edge_id, current
                )));
            };
            edges.push((edge_id, orientation));
            current = next;
        }

        if current != target_node {
            return Err(RoutingError::InvariantViolation(format!(
                "unpacked path ends at vertex {} instead of {}",
                current, target_node
            )));
        }

        Ok(EdgePath {
            edges,
            source_node,
            target_node,
            weight: self.best_weight,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ch::builder::build_with_order,
        test_graph_utils::test_graph::{line_graph, UniformWeighting},
    };

    #[test]
    fn line_query_unpacks_to_base_edges() {
        let graph = line_graph();
        let weighting = UniformWeighting;
        let contracted = build_with_order(&graph, &weighting, &[1, 2, 3, 0, 4]).unwrap();
        let cancel = CancelToken::default();

        let mut search = ChBidirectionalDijkstra::new(&contracted);
        search.init_source(&[(0, 0.0)]);
        search.init_target(&[(4, 0.0)]);
        search.run(&cancel).unwrap();

        let path = search.edge_path(&contracted, &graph).unwrap();
        assert_eq!(path.weight, 4.0);
        assert_eq!(
            path.edges
                .iter()
                .map(|&(edge, _)| edge)
                .collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
        assert!(path
            .edges
            .iter()
            .all(|&(_, orientation)| orientation == EdgeDirection::Forward));
    }

    #[test]
    fn unreachable_target_is_route_not_found() {
        let graph = line_graph();
        let weighting = UniformWeighting;
        let contracted = build_with_order(&graph, &weighting, &[1, 2, 3, 0, 4]).unwrap();
        let cancel = CancelToken::default();

        let mut search = ChBidirectionalDijkstra::new(&contracted);
        search.init_source(&[(0, 0.0)]);
        search.run(&cancel).unwrap();

        assert!(matches!(
            search.edge_path(&contracted, &graph),
            Err(RoutingError::RouteNotFound(_))
        ));
    }
}
