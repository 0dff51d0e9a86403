use crate::{
    attributes::{AttributeRegistry, EdgeAttributes},
    edge_direction::{EdgeDirection, TravelDirection},
    road_graph::RoadEdge,
};

/// Weights are dimensionless: an edge's weight is its length in meters
/// multiplied by the profile's factor value.
pub type Weight = f32;

/// The cost a profile assigns to an edge: a multiplier on distance and
/// the directions it may be traveled in. A value of zero or less marks
/// the edge as not traversable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Factor {
    pub value: f32,
    pub direction: TravelDirection,
}

impl Factor {
    pub fn traversable(&self) -> bool {
        self.value > 0.0 && self.direction != TravelDirection::None
    }
}

/// A named cost model evaluating edge attribute bags. A router may
/// cache a contraction hierarchy per profile name, so the name must
/// identify the cost function.
pub trait Profile: Send + Sync {
    fn name(&self) -> &str;

    fn factor(&self, attributes: &EdgeAttributes) -> Factor;

    /// Whether a route may start or end on an edge with these attributes.
    fn can_stop(&self, _attributes: &EdgeAttributes) -> bool {
        true
    }

    /// Travel speed in meters per second, when the profile knows one.
    /// Without it, travel time falls back to weight seconds
    /// (distance times factor value).
    fn speed(&self, _attributes: &EdgeAttributes) -> Option<f32> {
        None
    }
}

/// The seam between the search algorithms and a cost model: per-edge
/// weight and travel time for a traversal orientation, `None` when the
/// traversal is not allowed.
pub trait Weighting {
    fn edge_weight(&self, edge: &RoadEdge, orientation: EdgeDirection) -> Option<Weight>;

    fn edge_seconds(&self, edge: &RoadEdge, orientation: EdgeDirection) -> Option<f64>;

    fn can_access(&self, edge: &RoadEdge) -> bool {
        self.edge_weight(edge, EdgeDirection::Forward).is_some()
            || self.edge_weight(edge, EdgeDirection::Backward).is_some()
    }

    fn can_stop(&self, edge: &RoadEdge) -> bool;
}

/// Adapts a [`Profile`] to the [`Weighting`] seam by resolving each
/// edge's attribute bag through the graph's registry.
pub struct ProfileWeighting<'a> {
    profile: &'a dyn Profile,
    attributes: &'a AttributeRegistry,
}

impl<'a> ProfileWeighting<'a> {
    pub fn new(profile: &'a dyn Profile, attributes: &'a AttributeRegistry) -> Self {
        ProfileWeighting {
            profile,
            attributes,
        }
    }

    fn factor_for(&self, edge: &RoadEdge, orientation: EdgeDirection) -> Option<Factor> {
        let factor = self.profile.factor(self.attributes.get(edge.edge_profile()));
        if !factor.traversable() || !factor.direction.allows(orientation) {
            return None;
        }
        Some(factor)
    }
}

impl Weighting for ProfileWeighting<'_> {
    fn edge_weight(&self, edge: &RoadEdge, orientation: EdgeDirection) -> Option<Weight> {
        self.factor_for(edge, orientation)
            .map(|factor| (edge.distance().value() * factor.value as f64) as Weight)
    }

    fn edge_seconds(&self, edge: &RoadEdge, orientation: EdgeDirection) -> Option<f64> {
        let factor = self.factor_for(edge, orientation)?;
        let attributes = self.attributes.get(edge.edge_profile());
        let distance = edge.distance().value();

        match self.profile.speed(attributes) {
            Some(speed) if speed > 0.0 => Some(distance / speed as f64),
            _ => Some(distance * factor.value as f64),
        }
    }

    fn can_stop(&self, edge: &RoadEdge) -> bool {
        self.profile.can_stop(self.attributes.get(edge.edge_profile()))
    }
}
