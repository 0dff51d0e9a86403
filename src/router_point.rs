use crate::{
    geopoint::GeoPoint,
    graph::GraphEdge,
    profile::{Weight, Weighting},
    road_graph::RoadGraph,
    search::SearchDirection,
    types::{EdgeId, NodeId},
};

use crate::edge_direction::EdgeDirection;

/// A coordinate resolved onto the road network: an edge, a fractional
/// position along its polyline and the projected coordinate. Plain
/// value; callers keep them as long as the graph lives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouterPoint {
    edge: EdgeId,
    offset: f32,
    point: GeoPoint,
}

impl RouterPoint {
    pub fn new(edge: EdgeId, offset: f32, point: GeoPoint) -> Self {
        debug_assert!((0.0..=1.0).contains(&offset));
        RouterPoint {
            edge,
            offset,
            point,
        }
    }

    pub fn edge(&self) -> EdgeId {
        self.edge
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn point(&self) -> GeoPoint {
        self.point
    }

    /// The search-frontier entries this point induces: one per edge
    /// endpoint reachable under the weighting, carrying the partial
    /// weight of the edge half between the point and that endpoint.
    ///
    /// A forward frontier treats the point as a route origin, a
    /// backward frontier as a destination.
    pub(crate) fn frontier<W: Weighting>(
        &self,
        graph: &RoadGraph,
        weighting: &W,
        direction: SearchDirection,
    ) -> Vec<(NodeId, Weight)> {
        let edge = graph.edge(self.edge);
        let offset = self.offset;
        let mut entries = Vec::with_capacity(2);

        match direction {
            SearchDirection::Forward => {
                if let Some(weight) = weighting.edge_weight(edge, EdgeDirection::Forward) {
                    entries.push((edge.end_node(), weight * (1.0 - offset)));
                }
                if let Some(weight) = weighting.edge_weight(edge, EdgeDirection::Backward) {
                    entries.push((edge.start_node(), weight * offset));
                }
            }
            SearchDirection::Backward => {
                if let Some(weight) = weighting.edge_weight(edge, EdgeDirection::Forward) {
                    entries.push((edge.start_node(), weight * offset));
                }
                if let Some(weight) = weighting.edge_weight(edge, EdgeDirection::Backward) {
                    entries.push((edge.end_node(), weight * (1.0 - offset)));
                }
            }
        }

        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_graph_utils::test_graph::{line_graph, UniformWeighting};

    #[test]
    fn frontier_splits_the_edge_weight() {
        let graph = line_graph();
        let point = RouterPoint::new(0, 0.25, graph.vertex(0));

        let forward = point.frontier(&graph, &UniformWeighting, SearchDirection::Forward);
        // Toward the end node costs the remaining three quarters.
        assert_eq!(forward, vec![(1, 0.75), (0, 0.25)]);

        let backward = point.frontier(&graph, &UniformWeighting, SearchDirection::Backward);
        assert_eq!(backward, vec![(0, 0.25), (1, 0.75)]);
    }
}
