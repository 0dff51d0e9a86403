use crate::distance::{Distance, Meters};

const PROFILE_BITS: u32 = 16;
const PROFILE_MASK: u32 = (1 << PROFILE_BITS) - 1;

/// Stored distance resolution: one decimeter per step.
const DISTANCE_STEPS_PER_METER: f64 = 10.0;

/// Largest encodable length. Longer edges clamp to this value, losing
/// precision beyond the 0.1 m quantization that applies to every edge.
pub const MAX_ENCODED_DISTANCE_METERS: f64 = (u16::MAX as f64) / DISTANCE_STEPS_PER_METER;

/// The per-edge payload word of the geometric graph: the edge length in
/// decimeters in the high 16 bits and the edge-profile id in the low 16.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EdgeData(u32);

impl EdgeData {
    pub fn new(distance: Distance<Meters>, edge_profile: u16) -> Self {
        let steps = (distance.value().max(0.0) * DISTANCE_STEPS_PER_METER).round();
        let steps = (steps as u64).min(u16::MAX as u64) as u32;
        EdgeData((steps << PROFILE_BITS) | edge_profile as u32)
    }

    pub fn distance(&self) -> Distance<Meters> {
        Distance::from((self.0 >> PROFILE_BITS) as f64 / DISTANCE_STEPS_PER_METER)
    }

    pub fn edge_profile(&self) -> u16 {
        (self.0 & PROFILE_MASK) as u16
    }

    pub fn word(&self) -> u32 {
        self.0
    }

    pub fn from_word(word: u32) -> Self {
        EdgeData(word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::meters;

    #[test]
    fn round_trips_representable_pairs() {
        for (distance, profile) in [
            (0.0, 0u16),
            (0.1, 1),
            (1.0, 42),
            (1234.5, u16::MAX),
            (MAX_ENCODED_DISTANCE_METERS, 7),
        ] {
            let data = EdgeData::new(meters!(distance), profile);
            assert_eq!(data.distance(), meters!(distance));
            assert_eq!(data.edge_profile(), profile);
            assert_eq!(EdgeData::from_word(data.word()), data);
        }
    }

    #[test]
    fn quantizes_to_decimeters() {
        let data = EdgeData::new(meters!(1.26), 0);
        assert_eq!(data.distance(), meters!(1.3));
    }

    #[test]
    fn clamps_overlong_distances() {
        let data = EdgeData::new(meters!(100_000.0), 9);
        assert_eq!(data.distance(), meters!(MAX_ENCODED_DISTANCE_METERS));
        assert_eq!(data.edge_profile(), 9);
    }
}
