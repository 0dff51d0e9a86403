use crate::{
    cancel::CancelToken,
    constants::INVALID_NODE,
    error::RoutingError,
    profile::{Weight, Weighting},
    road_graph::RoadGraph,
    types::NodeId,
};

use super::{dijkstra::Dijkstra, EdgePath, SearchDirection};

/// Meeting-point search over the geometric graph: a forward Dijkstra
/// from the source frontier and a backward Dijkstra from the target
/// frontier, interleaved by always settling the side with the smaller
/// current minimum.
///
/// The best known meeting weight only improves; once the sum of the two
/// sides' minima reaches it, the optimum is fixed and the search stops.
pub(crate) struct BidirectionalDijkstra<'a, W: Weighting> {
    forward: Dijkstra<'a, W>,
    backward: Dijkstra<'a, W>,
    best_weight: Weight,
    meeting_node: NodeId,
}

impl<'a, W: Weighting> BidirectionalDijkstra<'a, W> {
    pub fn new(graph: &'a RoadGraph, weighting: &'a W) -> Self {
        BidirectionalDijkstra {
            forward: Dijkstra::new(graph, weighting, SearchDirection::Forward),
            backward: Dijkstra::new(graph, weighting, SearchDirection::Backward),
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

            // An exhausted side counts as zero: its labels are final, so
            // any future meeting still costs at least the other side's
            // minimum.
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

    pub fn edge_path(&self) -> Result<EdgePath, RoutingError> {
        if self.meeting_node == INVALID_NODE {
            return Err(RoutingError::RouteNotFound(
                "the searches never met".to_string(),
            ));
        }

        let (mut edges, source_node) = self.forward.chain_to_frontier(self.meeting_node);
        let (backward_edges, target_node) = self.backward.chain_to_frontier(self.meeting_node);
        edges.extend(backward_edges);

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
    use crate::test_graph_utils::test_graph::{
        disjoint_graph, square_graph, UniformWeighting,
    };

    #[test]
    fn meets_across_a_square() {
        let graph = square_graph();
        let weighting = UniformWeighting;
        let cancel = CancelToken::default();

        let mut search = BidirectionalDijkstra::new(&graph, &weighting);
        search.init_source(&[(0, 0.0)]);
        search.init_target(&[(2, 0.0)]);
        search.run(&cancel).unwrap();

        let path = search.edge_path().unwrap();
        assert_eq!(path.weight, 2.0);
        assert_eq!(path.edges.len(), 2);
        assert_eq!(path.source_node, 0);
        assert_eq!(path.target_node, 2);
    }

    #[test]
    fn reports_route_not_found_across_components() {
        let graph = disjoint_graph();
        let weighting = UniformWeighting;
        let cancel = CancelToken::default();

        let mut search = BidirectionalDijkstra::new(&graph, &weighting);
        search.init_source(&[(0, 0.0)]);
        search.init_target(&[(2, 0.0)]);
        search.run(&cancel).unwrap();

        assert!(matches!(
            search.edge_path(),
            Err(RoutingError::RouteNotFound(_))
        ));
    }
}
