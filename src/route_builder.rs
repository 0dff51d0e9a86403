use crate::{
    edge_direction::EdgeDirection,
    error::RoutingError,
    geometry::sub_polyline,
    graph::GraphEdge,
    profile::Weighting,
    road_graph::RoadGraph,
    route::{Route, RouteSegment},
    router_point::RouterPoint,
    search::EdgePath,
    types::EdgeId,
};

/// The degenerate route for a query whose source and target resolve to
/// the same position.
pub(crate) fn zero_length_route(point: &RouterPoint) -> Route {
    Route {
        shape: vec![point.point()],
        ..Route::default()
    }
}

/// A route staying on a single edge, between two offsets the weighting
/// allows travel between. Does not consult any search engine.
pub(crate) fn build_same_edge_route<W: Weighting>(
    graph: &RoadGraph,
    weighting: &W,
    source: &RouterPoint,
    target: &RouterPoint,
) -> Result<Route, RoutingError> {
    debug_assert_eq!(source.edge(), target.edge());

    let (shape, segment) =
        partial_segment(graph, weighting, source.edge(), source.offset(), target.offset())?;

    Ok(Route {
        shape,
        distance: segment.distance,
        seconds: segment.seconds,
        weight: segment.weight,
        segments: vec![segment],
    })
}

/// Assembles a [`Route`] from the engine's edge path plus the partial
/// head and tail halves of the resolved points.
///
/// The shape starts at the projected origin, follows every edge's
/// polyline in travel orientation without repeating junction vertices,
/// and ends at the projected target. Consecutive edges must chain;
/// anything else is a malformed path.
pub(crate) fn build_route<W: Weighting>(
    graph: &RoadGraph,
    weighting: &W,
    source: &RouterPoint,
    target: &RouterPoint,
    path: &EdgePath,
) -> Result<Route, RoutingError> {
    let source_edge = graph.edge(source.edge());
    let target_edge = graph.edge(target.edge());

    let head_to = if path.source_node == source_edge.end_node() {
        1.0
    } else if path.source_node == source_edge.start_node() {
        0.0
    } else {
        return Err(RoutingError::RouteBuildFailed(format!(
            "path starts at vertex {} which is not an endpoint of the origin edge",
            path.source_node
        )));
    };

    let tail_from = if path.target_node == target_edge.start_node() {
        0.0
    } else if path.target_node == target_edge.end_node() {
        1.0
    } else {
        return Err(RoutingError::RouteBuildFailed(format!(
            "path ends at vertex {} which is not an endpoint of the target edge",
            path.target_node
        )));
    };

    let mut segments = Vec::with_capacity(path.edges.len() + 2);

    let (mut shape, head) =
        partial_segment(graph, weighting, source.edge(), source.offset(), head_to)?;
    if !head.distance.is_zero() {
        segments.push(head);
    }

    let mut current = path.source_node;
    for &(edge_id, orientation) in &path.edges {
        let edge = graph.edge(edge_id);
        let entry_node = match orientation {
            EdgeDirection::Forward => edge.start_node(),
            EdgeDirection::Backward => edge.end_node(),
        };
        if entry_node != current {
            return Err(RoutingError::RouteBuildFailed(format!(
                "edge {} does not continue the path at vertex {}",
                edge_id, current
            )));
        }

        let mut polyline = graph.edge_polyline(edge_id);
        if orientation == EdgeDirection::Backward {
            polyline.reverse();
        }
        shape.extend(polyline.into_iter().skip(1));

        let weight = traversal_weight(graph, weighting, edge_id, orientation)?;
        let seconds = weighting
            .edge_seconds(edge, orientation)
            .unwrap_or_default();

        segments.push(RouteSegment {
            edge: edge_id,
            distance: edge.distance(),
            seconds,
            weight,
            attributes: graph.edge_attributes(edge_id).clone(),
        });

        current = edge.adj_node(current);
    }

    if current != path.target_node {
        return Err(RoutingError::RouteBuildFailed(format!(
            "path ends at vertex {} instead of {}",
            current, path.target_node
        )));
    }

    let (tail_shape, tail) =
        partial_segment(graph, weighting, target.edge(), tail_from, target.offset())?;
    shape.extend(tail_shape.into_iter().skip(1));
    if !tail.distance.is_zero() {
        segments.push(tail);
    }

    Ok(Route {
        shape,
        distance: segments.iter().map(|segment| segment.distance).sum(),
        seconds: segments.iter().map(|segment| segment.seconds).sum(),
        weight: segments.iter().map(|segment| segment.weight).sum(),
        segments,
    })
}

/// The shape and segment of a partial edge traversal between two
/// offsets, oriented from the first toward the second.
fn partial_segment<W: Weighting>(
    graph: &RoadGraph,
    weighting: &W,
    edge_id: EdgeId,
    from: f32,
    to: f32,
) -> Result<(Vec<crate::geopoint::GeoPoint>, RouteSegment), RoutingError> {
    let edge = graph.edge(edge_id);

    // No travel over the edge at all; do not consult the weighting,
    // the point merely sits on one of its endpoints.
    if from == to {
        let polyline = graph.edge_polyline(edge_id);
        let shape = sub_polyline(&polyline, from, to);
        let segment = RouteSegment {
            edge: edge_id,
            distance: crate::distance::Distance::zero(),
            seconds: 0.0,
            weight: 0.0,
            attributes: graph.edge_attributes(edge_id).clone(),
        };
        return Ok((shape, segment));
    }

    let orientation = if to >= from {
        EdgeDirection::Forward
    } else {
        EdgeDirection::Backward
    };

    let full_weight = traversal_weight(graph, weighting, edge_id, orientation)?;
    let full_seconds = weighting
        .edge_seconds(edge, orientation)
        .unwrap_or_default();

    let fraction = (to - from).abs() as f64;
    let polyline = graph.edge_polyline(edge_id);
    let shape = sub_polyline(&polyline, from, to);

    let segment = RouteSegment {
        edge: edge_id,
        distance: edge.distance() * fraction,
        seconds: full_seconds * fraction,
        weight: full_weight * fraction as f32,
        attributes: graph.edge_attributes(edge_id).clone(),
    };

    Ok((shape, segment))
}

fn traversal_weight<W: Weighting>(
    graph: &RoadGraph,
    weighting: &W,
    edge_id: EdgeId,
    orientation: EdgeDirection,
) -> Result<f32, RoutingError> {
    weighting
        .edge_weight(graph.edge(edge_id), orientation)
        .ok_or_else(|| {
            RoutingError::RouteBuildFailed(format!(
                "edge {} is not traversable {:?} under the profile",
                edge_id, orientation
            ))
        })
}
