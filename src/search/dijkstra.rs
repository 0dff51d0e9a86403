use std::collections::BinaryHeap;

use fxhash::FxHashMap;

use crate::{
    cancel::CancelToken,
    constants::{INVALID_EDGE, INVALID_NODE},
    edge_direction::EdgeDirection,
    error::RoutingError,
    graph::GraphEdge,
    profile::{Weight, Weighting},
    road_graph::RoadGraph,
    types::{EdgeId, NodeId},
};

use super::{HeapItem, SearchDirection};

#[derive(Debug)]
pub(crate) struct NodeEntry {
    pub weight: Weight,
    pub parent: NodeId,
    pub edge: EdgeId,
    pub settled: bool,
}

impl NodeEntry {
    pub(crate) fn frontier(weight: Weight) -> Self {
        NodeEntry {
            weight,
            parent: INVALID_NODE,
            edge: INVALID_EDGE,
            settled: false,
        }
    }
}

/// Single-direction Dijkstra over the geometric graph, exposed as a
/// settlement sequence: each [`settle_next`](Dijkstra::settle_next)
/// call finalizes one vertex in nondecreasing weight order.
///
/// A forward search traverses edges in their profile-allowed direction,
/// a backward search inverts it. The search stops once the cheapest
/// unsettled weight exceeds `max_weight`, recording that the bound was
/// reached.
pub(crate) struct Dijkstra<'a, W: Weighting> {
    graph: &'a RoadGraph,
    weighting: &'a W,
    direction: SearchDirection,
    heap: BinaryHeap<HeapItem>,
    data: FxHashMap<NodeId, NodeEntry>,
    max_weight: Weight,
    max_reached: bool,
}

impl<'a, W: Weighting> Dijkstra<'a, W> {
    pub fn new(graph: &'a RoadGraph, weighting: &'a W, direction: SearchDirection) -> Self {
        Self::with_max_weight(graph, weighting, direction, Weight::INFINITY)
    }

    pub fn with_max_weight(
        graph: &'a RoadGraph,
        weighting: &'a W,
        direction: SearchDirection,
        max_weight: Weight,
    ) -> Self {
        Dijkstra {
            graph,
            weighting,
            direction,
            heap: BinaryHeap::new(),
            data: FxHashMap::default(),
            max_weight,
            max_reached: false,
        }
    }

    /// Seeds the search frontier. Multiple seeds model the two halves
    /// of a resolved point.
    pub fn init(&mut self, node_id: NodeId, weight: Weight) {
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

    /// Cheapest weight still queued, possibly of an already-settled
    /// (stale) entry; stale entries never order below the true minimum
    /// of their node, so this is a safe lower bound.
    pub fn peek_weight(&self) -> Option<Weight> {
        self.heap.peek().map(|item| item.weight)
    }

    /// The best weight recorded for a node so far, settled or tentative.
    pub fn best_weight(&self, node_id: NodeId) -> Option<Weight> {
        self.data.get(&node_id).map(|entry| entry.weight)
    }

    pub fn max_reached(&self) -> bool {
        self.max_reached
    }

    /// Settles the next vertex and relaxes its out-edges. Returns
    /// `None` once the queue is exhausted or the first popped weight
    /// exceeds the maximum.
    pub fn settle_next(
        &mut self,
        cancel: &CancelToken,
    ) -> Result<Option<(NodeId, Weight)>, RoutingError> {
        while let Some(HeapItem { node_id, weight }) = self.heap.pop() {
            if cancel.is_canceled() {
                return Err(RoutingError::Canceled);
            }

            if weight > self.max_weight {
                self.max_reached = true;
                return Ok(None);
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

                if self.data.get(&adj_node).is_some_and(|entry| entry.settled) {
                    continue;
                }

                let orientation = match self.direction {
                    SearchDirection::Forward => self.graph.edge_direction(edge_id, node_id),
                    SearchDirection::Backward => {
                        self.graph.edge_direction(edge_id, node_id).opposite()
                    }
                };

                let Some(edge_weight) = self.weighting.edge_weight(edge, orientation) else {
                    continue;
                };

                let next_weight = weight + edge_weight;
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

    /// Runs the search to exhaustion (or to the weight bound).
    pub fn run(&mut self, cancel: &CancelToken) -> Result<(), RoutingError> {
        while self.settle_next(cancel)?.is_some() {}
        Ok(())
    }

    /// Walks the predecessor chain from `node` back to its frontier
    /// seed; edges come out in travel order, and the returned node is
    /// the seed the chain started from.
    pub fn chain_to_frontier(&self, node: NodeId) -> (Vec<(EdgeId, EdgeDirection)>, NodeId) {
        let mut edges = Vec::with_capacity(32);
        let mut current = node;

        while let Some(entry) = self.data.get(&current) {
            if entry.parent == INVALID_NODE {
                break;
            }

            let orientation = match self.direction {
                // Forward search: travel runs parent -> current.
                SearchDirection::Forward => self.graph.edge_direction(entry.edge, entry.parent),
                // Backward search: travel runs current -> parent.
                SearchDirection::Backward => self.graph.edge_direction(entry.edge, current),
            };

            edges.push((entry.edge, orientation));
            current = entry.parent;
        }

        if self.direction == SearchDirection::Forward {
            edges.reverse();
        }
        (edges, current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_graph_utils::test_graph::{square_graph, UniformWeighting};

    #[test]
    fn settles_in_nondecreasing_order() {
        let graph = square_graph();
        let weighting = UniformWeighting;
        let cancel = CancelToken::default();

        let mut dijkstra = Dijkstra::new(&graph, &weighting, SearchDirection::Forward);
        dijkstra.init(0, 0.0);

        let mut last = 0.0;
        let mut settled = Vec::new();
        while let Some((node, weight)) = dijkstra.settle_next(&cancel).unwrap() {
            assert!(weight >= last);
            last = weight;
            settled.push((node, weight));
        }

        assert_eq!(settled.len(), 4);
        // The opposite corner of a unit square is two edges away.
        assert_eq!(dijkstra.best_weight(2), Some(2.0));
    }

    #[test]
    fn max_weight_bound_sets_flag() {
        let graph = square_graph();
        let weighting = UniformWeighting;
        let cancel = CancelToken::default();

        let mut bounded =
            Dijkstra::with_max_weight(&graph, &weighting, SearchDirection::Forward, 1.5);
        bounded.init(0, 0.0);
        bounded.run(&cancel).unwrap();
        assert!(bounded.max_reached());

        let mut unbounded = Dijkstra::new(&graph, &weighting, SearchDirection::Forward);
        unbounded.init(0, 0.0);
        unbounded.run(&cancel).unwrap();
        assert!(!unbounded.max_reached());
    }

    #[test]
    fn cancellation_stops_the_search() {
        let graph = square_graph();
        let weighting = UniformWeighting;
        let cancel = CancelToken::default();
        cancel.cancel();

        let mut dijkstra = Dijkstra::new(&graph, &weighting, SearchDirection::Forward);
        dijkstra.init(0, 0.0);
        assert!(matches!(
            dijkstra.run(&cancel),
            Err(RoutingError::Canceled)
        ));
    }
}
