use serde::{Deserialize, Serialize};

use crate::{
    constants::EARTH_RADIUS_METERS,
    distance::{meters, Distance, Meters},
};

/// A WGS84 coordinate in decimal degrees.
#[derive(PartialEq, Copy, Clone, Debug, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoPoint { lat, lon }
    }

    pub fn distance(&self, other: &GeoPoint) -> Distance<Meters> {
        haversine_distance(self.lat, self.lon, other.lat, other.lon)
    }
}

impl From<&GeoPoint> for geo::Point {
    fn from(point: &GeoPoint) -> geo::Point {
        geo::Point::new(point.lon, point.lat)
    }
}

impl From<geo::Point> for GeoPoint {
    fn from(point: geo::Point) -> GeoPoint {
        GeoPoint {
            lat: point.y(),
            lon: point.x(),
        }
    }
}

pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Distance<Meters> {
    let lat1_rad = lat1.to_radians();
    let lon1_rad = lon1.to_radians();
    let lat2_rad = lat2.to_radians();
    let lon2_rad = lon2.to_radians();

    let delta_lat = lat2_rad - lat1_rad;
    let delta_lon = lon2_rad - lon1_rad;

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    meters!(EARTH_RADIUS_METERS * c)
}
