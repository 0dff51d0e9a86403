use rstar::{RTree, RTreeObject, AABB};
use tracing::info;

use crate::{
    constants::{DEFAULT_MAX_RESOLVE_DISTANCE_METERS, DEFAULT_SEARCH_OFFSET_DEGREES},
    distance::{Distance, Meters},
    error::RoutingError,
    geometry::project_onto_polyline,
    geopoint::GeoPoint,
    profile::Profile,
    road_graph::RoadGraph,
    router_point::RouterPoint,
    types::EdgeId,
};

/// Tuning of the default nearest-edge search.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Half-width of the square candidate window, in degrees.
    pub search_offset_degrees: f64,
    /// Furthest a query may lie from an edge and still resolve.
    pub max_distance: Distance<Meters>,
    /// Additionally require `can_stop` from every requested profile.
    pub verify_all_stoppable: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolveOptions {
            search_offset_degrees: DEFAULT_SEARCH_OFFSET_DEGREES,
            max_distance: Distance::from(DEFAULT_MAX_RESOLVE_DISTANCE_METERS),
            verify_all_stoppable: false,
        }
    }
}

/// A caller-supplied replacement for the default nearest-edge search.
pub type CustomResolver =
    Box<dyn Fn(f64, f64) -> Result<RouterPoint, RoutingError> + Send + Sync>;

/// The resolver capability of a router, fixed at construction.
pub enum Resolver {
    Default,
    Custom(CustomResolver),
}

impl Default for Resolver {
    fn default() -> Self {
        Resolver::Default
    }
}

struct IndexedEdge {
    envelope: AABB<[f64; 2]>,
    edge_id: EdgeId,
}

impl RTreeObject for IndexedEdge {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree over edge polyline bounding boxes, answering windowed
/// nearest-traversable-edge queries.
pub struct EdgeIndex {
    tree: RTree<IndexedEdge>,
}

impl EdgeIndex {
    pub fn build(graph: &RoadGraph) -> EdgeIndex {
        let objects = (0..graph.edge_count())
            .map(|edge_id| {
                let polyline = graph.edge_polyline(edge_id);
                let mut lower = [f64::INFINITY, f64::INFINITY];
                let mut upper = [f64::NEG_INFINITY, f64::NEG_INFINITY];
                for point in &polyline {
                    lower[0] = lower[0].min(point.lon);
                    lower[1] = lower[1].min(point.lat);
                    upper[0] = upper[0].max(point.lon);
                    upper[1] = upper[1].max(point.lat);
                }
                IndexedEdge {
                    envelope: AABB::from_corners(lower, upper),
                    edge_id,
                }
            })
            .collect();

        let tree = RTree::bulk_load(objects);
        info!(edges = graph.edge_count(), "built edge index");

        EdgeIndex { tree }
    }

    /// Resolves a coordinate onto the closest edge every requested
    /// profile can traverse (and, optionally, stop on). Ties go to the
    /// smaller edge id so results are deterministic.
    pub fn resolve(
        &self,
        graph: &RoadGraph,
        profiles: &[&dyn Profile],
        lat: f64,
        lon: f64,
        options: &ResolveOptions,
    ) -> Result<RouterPoint, RoutingError> {
        let query = GeoPoint::new(lat, lon);
        let offset = options.search_offset_degrees;
        let window = AABB::from_corners([lon - offset, lat - offset], [lon + offset, lat + offset]);

        let mut best: Option<(Distance<Meters>, EdgeId, RouterPoint)> = None;

        for candidate in self.tree.locate_in_envelope_intersecting(&window) {
            let edge_id = candidate.edge_id;
            let attributes = graph.edge_attributes(edge_id);

            let acceptable = profiles.iter().all(|profile| {
                profile.factor(attributes).traversable()
                    && (!options.verify_all_stoppable || profile.can_stop(attributes))
            });
            if !acceptable {
                continue;
            }

            let polyline = graph.edge_polyline(edge_id);
            let Some(projection) = project_onto_polyline(&polyline, &query) else {
                continue;
            };
            if projection.distance > options.max_distance {
                continue;
            }

            let closer = match &best {
                None => true,
                Some((distance, best_id, _)) => {
                    projection.distance < *distance
                        || (projection.distance == *distance && edge_id < *best_id)
                }
            };
            if closer {
                best = Some((
                    projection.distance,
                    edge_id,
                    RouterPoint::new(edge_id, projection.offset, projection.point),
                ));
            }
        }

        best.map(|(_, _, point)| point).ok_or_else(|| {
            RoutingError::ResolveFailed(format!(
                "no traversable edge within {} of ({}, {})",
                options.max_distance, lat, lon
            ))
        })
    }
}
