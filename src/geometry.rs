use geo::{Closest, HaversineClosestPoint};

use crate::{
    distance::{Distance, Meters},
    geopoint::GeoPoint,
};

/// Length of a polyline as the sum of its great-circle segment lengths.
pub fn polyline_length(points: &[GeoPoint]) -> Distance<Meters> {
    points
        .windows(2)
        .map(|pair| pair[0].distance(&pair[1]))
        .sum()
}

fn cumulative_lengths(points: &[GeoPoint]) -> (Vec<f64>, f64) {
    let mut cumulative = Vec::with_capacity(points.len());
    let mut total = 0.0;
    cumulative.push(0.0);
    for pair in points.windows(2) {
        total += pair[0].distance(&pair[1]).value();
        cumulative.push(total);
    }
    (cumulative, total)
}

fn segment(points: &[GeoPoint], index: usize) -> geo::Line {
    geo::Line::new(
        geo::Coord {
            x: points[index].lon,
            y: points[index].lat,
        },
        geo::Coord {
            x: points[index + 1].lon,
            y: points[index + 1].lat,
        },
    )
}

pub struct PolylineProjection {
    /// The point on the polyline closest to the query coordinate.
    pub point: GeoPoint,
    /// Great-circle distance from the query coordinate to `point`.
    pub distance: Distance<Meters>,
    /// Position of `point` along the polyline as a fraction of its length.
    pub offset: f32,
}

/// Projects `target` onto the polyline. Among equally close candidates
/// the earliest segment wins, keeping results deterministic.
pub fn project_onto_polyline(points: &[GeoPoint], target: &GeoPoint) -> Option<PolylineProjection> {
    if points.is_empty() {
        return None;
    }
    if points.len() == 1 {
        return Some(PolylineProjection {
            point: points[0],
            distance: target.distance(&points[0]),
            offset: 0.0,
        });
    }

    let (cumulative, total) = cumulative_lengths(points);
    let target_point: geo::Point = target.into();

    let mut best: Option<(Distance<Meters>, GeoPoint, f64)> = None;

    for index in 0..points.len() - 1 {
        let candidate: GeoPoint = match segment(points, index).haversine_closest_point(&target_point)
        {
            Closest::Intersection(point) | Closest::SinglePoint(point) => point.into(),
            Closest::Indeterminate => points[index],
        };

        let distance = target.distance(&candidate);
        if best.as_ref().map_or(true, |(d, _, _)| distance < *d) {
            let along = cumulative[index] + points[index].distance(&candidate).value();
            best = Some((distance, candidate, along));
        }
    }

    best.map(|(distance, point, along)| PolylineProjection {
        point,
        distance,
        offset: if total > 0.0 {
            ((along / total).clamp(0.0, 1.0)) as f32
        } else {
            0.0
        },
    })
}

/// The coordinate at a fractional offset along the polyline.
pub fn point_at_offset(points: &[GeoPoint], offset: f32) -> GeoPoint {
    let (cumulative, total) = cumulative_lengths(points);
    if total <= 0.0 {
        return points[0];
    }

    let target = (offset.clamp(0.0, 1.0) as f64) * total;
    for index in 0..points.len() - 1 {
        let segment_length = cumulative[index + 1] - cumulative[index];
        if target <= cumulative[index + 1] || index == points.len() - 2 {
            if segment_length <= 0.0 {
                return points[index];
            }
            let t = ((target - cumulative[index]) / segment_length).clamp(0.0, 1.0);
            let a = points[index];
            let b = points[index + 1];
            // Exact endpoints; interpolation would drift in the last bit.
            if t == 0.0 {
                return a;
            }
            if t == 1.0 {
                return b;
            }
            return GeoPoint {
                lat: a.lat + (b.lat - a.lat) * t,
                lon: a.lon + (b.lon - a.lon) * t,
            };
        }
    }

    points[points.len() - 1]
}

/// The part of the polyline between two fractional offsets, in travel
/// order: when `from > to` the result runs against the stored direction.
pub fn sub_polyline(points: &[GeoPoint], from: f32, to: f32) -> Vec<GeoPoint> {
    if from > to {
        let mut reversed = sub_polyline(points, to, from);
        reversed.reverse();
        return reversed;
    }

    let start = point_at_offset(points, from);
    if from == to {
        return vec![start];
    }
    let end = point_at_offset(points, to);

    let (cumulative, total) = cumulative_lengths(points);
    let mut result = vec![start];
    if total > 0.0 {
        for (index, point) in points.iter().enumerate() {
            let fraction = (cumulative[index] / total) as f32;
            if fraction > from && fraction < to {
                result.push(*point);
            }
        }
    }
    result.push(end);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::meters;

    fn straight_line() -> Vec<GeoPoint> {
        vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 0.001),
            GeoPoint::new(0.0, 0.002),
        ]
    }

    #[test]
    fn length_of_two_equal_segments() {
        let line = straight_line();
        let total = polyline_length(&line);
        let half = line[0].distance(&line[1]) + line[1].distance(&line[2]);
        assert_eq!(total, half);
    }

    #[test]
    fn projection_lands_between_vertices() {
        let line = straight_line();
        let query = GeoPoint::new(0.0001, 0.0005);
        let projection = project_onto_polyline(&line, &query).unwrap();

        assert!((projection.offset - 0.25).abs() < 0.01);
        assert!((projection.point.lon - 0.0005).abs() < 1e-6);
        assert!(projection.distance < meters!(12.0));
    }

    #[test]
    fn projection_clamps_to_endpoint() {
        let line = straight_line();
        let query = GeoPoint::new(0.0, -0.001);
        let projection = project_onto_polyline(&line, &query).unwrap();
        assert_eq!(projection.offset, 0.0);
        assert_eq!(projection.point, line[0]);
    }

    #[test]
    fn sub_polyline_full_range_is_identity() {
        let line = straight_line();
        let full = sub_polyline(&line, 0.0, 1.0);
        assert_eq!(full, line);
    }

    #[test]
    fn sub_polyline_reverses_when_from_exceeds_to() {
        let line = straight_line();
        let reversed = sub_polyline(&line, 1.0, 0.0);
        let mut expected = line.clone();
        expected.reverse();
        assert_eq!(reversed, expected);
    }

    #[test]
    fn sub_polyline_interior_span() {
        let line = straight_line();
        let span = sub_polyline(&line, 0.25, 0.75);
        assert_eq!(span.len(), 3);
        assert!((span[0].lon - 0.0005).abs() < 1e-6);
        assert!((span[1].lon - 0.001).abs() < 1e-6);
        assert!((span[2].lon - 0.0015).abs() < 1e-6);
    }
}
