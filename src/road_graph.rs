use crate::{
    attributes::{AttributeRegistry, EdgeAttributes},
    distance::{Distance, Meters},
    edge_data::EdgeData,
    edge_direction::EdgeDirection,
    geometry::polyline_length,
    geopoint::GeoPoint,
    graph::GraphEdge,
    types::{EdgeId, NodeId},
};

/// An undirected edge of the geometric graph. The payload word encodes
/// the edge length and the id of its interned attribute bag.
#[derive(Debug, Clone)]
pub struct RoadEdge {
    id: EdgeId,
    start_node: NodeId,
    end_node: NodeId,
    data: EdgeData,
}

impl GraphEdge for RoadEdge {
    fn start_node(&self) -> NodeId {
        self.start_node
    }

    fn end_node(&self) -> NodeId {
        self.end_node
    }
}

impl RoadEdge {
    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn data(&self) -> EdgeData {
        self.data
    }

    pub fn distance(&self) -> Distance<Meters> {
        self.data.distance()
    }

    pub fn edge_profile(&self) -> u16 {
        self.data.edge_profile()
    }
}

/// The geometric road network: vertex coordinates, undirected edges
/// with packed payload words, per-edge shape points strictly between
/// the endpoints, and the shared attribute dictionary.
///
/// Built once, then read concurrently by queries; vertex and edge ids
/// are stable for the lifetime of the graph.
#[derive(Debug, Default)]
pub struct RoadGraph {
    points: Vec<GeoPoint>,
    edges: Vec<RoadEdge>,
    adjacency: Vec<Vec<EdgeId>>,
    shapes: Vec<Vec<GeoPoint>>,
    attributes: AttributeRegistry,
}

impl RoadGraph {
    pub fn new() -> Self {
        RoadGraph::default()
    }

    pub fn add_vertex(&mut self, point: GeoPoint) -> NodeId {
        let id = self.points.len();
        self.points.push(point);
        self.adjacency.push(Vec::new());
        id
    }

    /// Adds an edge whose length is derived from its full polyline.
    /// `shape` holds the coordinates strictly between the endpoints.
    pub fn add_edge(
        &mut self,
        start_node: NodeId,
        end_node: NodeId,
        attributes: EdgeAttributes,
        shape: Vec<GeoPoint>,
    ) -> EdgeId {
        let mut polyline = Vec::with_capacity(shape.len() + 2);
        polyline.push(self.points[start_node]);
        polyline.extend_from_slice(&shape);
        polyline.push(self.points[end_node]);

        let distance = polyline_length(&polyline);
        self.add_edge_with_distance(start_node, end_node, distance, attributes, shape)
    }

    /// Adds an edge with an explicit length, for callers that carry
    /// precomputed lengths alongside the geometry.
    pub fn add_edge_with_distance(
        &mut self,
        start_node: NodeId,
        end_node: NodeId,
        distance: Distance<Meters>,
        attributes: EdgeAttributes,
        shape: Vec<GeoPoint>,
    ) -> EdgeId {
        assert!(start_node < self.points.len(), "unknown start vertex");
        assert!(end_node < self.points.len(), "unknown end vertex");

        let edge_profile = self.attributes.intern(attributes);
        let id = self.edges.len();
        self.edges.push(RoadEdge {
            id,
            start_node,
            end_node,
            data: EdgeData::new(distance, edge_profile),
        });
        self.shapes.push(shape);
        self.adjacency[start_node].push(id);
        self.adjacency[end_node].push(id);
        id
    }

    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn vertex(&self, node: NodeId) -> GeoPoint {
        self.points[node]
    }

    pub fn edge(&self, edge: EdgeId) -> &RoadEdge {
        &self.edges[edge]
    }

    pub fn edges(&self) -> &[RoadEdge] {
        &self.edges
    }

    pub fn node_edges(&self, node: NodeId) -> &[EdgeId] {
        &self.adjacency[node]
    }

    /// Shape coordinates strictly between the edge's endpoints.
    pub fn edge_shape(&self, edge: EdgeId) -> &[GeoPoint] {
        &self.shapes[edge]
    }

    /// The edge's full polyline: start vertex, shape, end vertex.
    pub fn edge_polyline(&self, edge: EdgeId) -> Vec<GeoPoint> {
        let e = &self.edges[edge];
        let shape = &self.shapes[edge];
        let mut polyline = Vec::with_capacity(shape.len() + 2);
        polyline.push(self.points[e.start_node]);
        polyline.extend_from_slice(shape);
        polyline.push(self.points[e.end_node]);
        polyline
    }

    pub fn edge_direction(&self, edge_id: EdgeId, start_node: NodeId) -> EdgeDirection {
        let edge = &self.edges[edge_id];

        if edge.start_node == start_node {
            return EdgeDirection::Forward;
        }

        if edge.end_node == start_node {
            return EdgeDirection::Backward;
        }

        panic!(
            "Node {} is neither the start nor the end of edge {}",
            start_node, edge_id
        )
    }

    pub fn attributes(&self) -> &AttributeRegistry {
        &self.attributes
    }

    pub fn edge_attributes(&self, edge: EdgeId) -> &EdgeAttributes {
        self.attributes.get(self.edges[edge].edge_profile())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::meters;

    #[test]
    fn derives_distance_from_polyline() {
        let mut graph = RoadGraph::new();
        let a = graph.add_vertex(GeoPoint::new(0.0, 0.0));
        let b = graph.add_vertex(GeoPoint::new(0.0, 0.002));
        let shape = vec![GeoPoint::new(0.0, 0.001)];
        let edge = graph.add_edge(a, b, EdgeAttributes::new(), shape);

        // The stored word quantizes to decimeters.
        let expected = polyline_length(&graph.edge_polyline(edge));
        let error = (graph.edge(edge).distance() - expected).value().abs();
        assert!(error <= 0.05, "quantization error {error}");
        assert!(graph.edge(edge).distance() > meters!(200.0));
    }

    #[test]
    fn adjacency_lists_both_endpoints() {
        let mut graph = RoadGraph::new();
        let a = graph.add_vertex(GeoPoint::new(0.0, 0.0));
        let b = graph.add_vertex(GeoPoint::new(0.0, 0.001));
        let edge = graph.add_edge_with_distance(a, b, meters!(1), EdgeAttributes::new(), vec![]);

        assert_eq!(graph.node_edges(a), &[edge]);
        assert_eq!(graph.node_edges(b), &[edge]);
        assert_eq!(graph.edge_direction(edge, a), EdgeDirection::Forward);
        assert_eq!(graph.edge_direction(edge, b), EdgeDirection::Backward);
    }

    #[test]
    fn interns_attribute_bags() {
        let mut graph = RoadGraph::new();
        let a = graph.add_vertex(GeoPoint::new(0.0, 0.0));
        let b = graph.add_vertex(GeoPoint::new(0.0, 0.001));
        let attrs: EdgeAttributes = [("highway", "residential")].into_iter().collect();
        let e1 = graph.add_edge_with_distance(a, b, meters!(1), attrs.clone(), vec![]);
        let e2 = graph.add_edge_with_distance(b, a, meters!(1), attrs, vec![]);

        assert_eq!(
            graph.edge(e1).edge_profile(),
            graph.edge(e2).edge_profile()
        );
        assert_eq!(graph.attributes().len(), 1);
    }
}
