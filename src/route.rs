use crate::{
    attributes::EdgeAttributes,
    distance::{Distance, Meters},
    geopoint::GeoPoint,
    profile::Weight,
    types::EdgeId,
};

/// One traversed (possibly partial) edge of a route, carrying the
/// attribute bag of the road segment it runs over.
#[derive(Debug, Clone)]
pub struct RouteSegment {
    pub(crate) edge: EdgeId,
    pub(crate) distance: Distance<Meters>,
    pub(crate) seconds: f64,
    pub(crate) weight: Weight,
    pub(crate) attributes: EdgeAttributes,
}

impl RouteSegment {
    pub fn edge(&self) -> EdgeId {
        self.edge
    }

    pub fn distance(&self) -> Distance<Meters> {
        self.distance
    }

    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    pub fn weight(&self) -> Weight {
        self.weight
    }

    pub fn attributes(&self) -> &EdgeAttributes {
        &self.attributes
    }
}

/// A computed route: its polyline, totals and per-segment detail.
#[derive(Debug, Clone, Default)]
pub struct Route {
    pub(crate) shape: Vec<GeoPoint>,
    pub(crate) distance: Distance<Meters>,
    pub(crate) seconds: f64,
    pub(crate) weight: Weight,
    pub(crate) segments: Vec<RouteSegment>,
}

impl Route {
    pub fn shape(&self) -> &[GeoPoint] {
        &self.shape
    }

    pub fn distance(&self) -> Distance<Meters> {
        self.distance
    }

    pub fn seconds(&self) -> f64 {
        self.seconds
    }

    pub fn weight(&self) -> Weight {
        self.weight
    }

    pub fn segments(&self) -> &[RouteSegment] {
        &self.segments
    }
}
