//! Data association between map-frame points and landmarks.
//!
//! Association and sensor-range gating are kept as two separate steps: a [`RangeGate`]
//! narrows the eligible landmarks, and a [`LandmarkAssociator`] picks the match among
//! them. A spatial-index associator can replace [`NearestNeighbor`] without touching the
//! weighting code.

use nalgebra::{Point2, distance_squared};

use crate::error::Result;
use crate::map::{Landmark, LandmarkMap};
use crate::observation::LandmarkObservation;

/// Chooses the landmark a map-frame point corresponds to.
pub trait LandmarkAssociator: Send + Sync {
    /// Return the matched landmark among `candidates`, or `None` when there is none.
    fn associate<'m>(&self, point: &Point2<f64>, candidates: &[&'m Landmark])
    -> Option<&'m Landmark>;
}

/// Brute-force nearest neighbor by squared Euclidean distance.
///
/// Ties keep the first candidate that reached the minimum, so the result is deterministic
/// for a fixed candidate order. Cost is linear in the number of candidates.
#[derive(Clone, Copy, Debug, Default)]
pub struct NearestNeighbor;

impl LandmarkAssociator for NearestNeighbor {
    fn associate<'m>(
        &self,
        point: &Point2<f64>,
        candidates: &[&'m Landmark],
    ) -> Option<&'m Landmark> {
        let (first, rest) = candidates.split_first()?;
        let mut best = *first;
        let mut best_dist = distance_squared(point, &best.position());
        for &landmark in rest {
            let dist = distance_squared(point, &landmark.position());
            if dist < best_dist {
                best_dist = dist;
                best = landmark;
            }
        }
        Some(best)
    }
}

/// Restricts association candidates to landmarks within sensor range of a pose.
#[derive(Clone, Copy, Debug)]
pub struct RangeGate {
    range: Option<f64>,
}

impl RangeGate {
    /// Every landmark is eligible.
    pub fn disabled() -> Self {
        RangeGate { range: None }
    }

    /// Only landmarks within `sensor_range` (inclusive) of the pose are eligible.
    pub fn within(sensor_range: f64) -> Result<Self> {
        crate::error::ensure_positive(sensor_range, "sensor_range")?;
        Ok(RangeGate {
            range: Some(sensor_range),
        })
    }

    /// Fill `out` with the eligible landmarks of `map` for a sensor at `origin`,
    /// preserving map order.
    pub fn candidates<'m>(
        &self,
        origin: &Point2<f64>,
        map: &'m LandmarkMap,
        out: &mut Vec<&'m Landmark>,
    ) {
        out.clear();
        match self.range {
            None => out.extend(map.iter()),
            Some(range) => {
                let range_sq = range * range;
                out.extend(
                    map.iter()
                        .filter(|l| distance_squared(origin, &l.position()) <= range_sq),
                );
            }
        }
    }
}

/// Give each observation the id of its nearest predicted measurement.
///
/// Both slices are expected in the same frame. Observations keep their id when
/// `predicted` is empty.
pub fn assign_nearest_ids(
    predicted: &[LandmarkObservation],
    observations: &mut [LandmarkObservation],
) {
    for observation in observations.iter_mut() {
        let mut best_dist = f64::INFINITY;
        for candidate in predicted {
            let dist = distance_squared(&observation.point(), &candidate.point());
            if dist < best_dist {
                best_dist = dist;
                observation.id = candidate.id;
            }
        }
    }
}
