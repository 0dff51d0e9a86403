use crate::types::{EdgeId, NodeId};

pub(crate) const INVALID_NODE: NodeId = usize::MAX;
pub(crate) const INVALID_EDGE: EdgeId = usize::MAX;

pub(crate) const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Half-width of the square search window used by the default resolver,
/// in decimal degrees.
pub(crate) const DEFAULT_SEARCH_OFFSET_DEGREES: f64 = 0.01;

/// Furthest a coordinate may lie from an edge and still resolve onto it.
pub(crate) const DEFAULT_MAX_RESOLVE_DISTANCE_METERS: f64 = 50.0;
