//! Landmark observations and the local-to-map frame transform.

use nalgebra::{Isometry2, Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::particle::Pose;

/// An observed landmark position in the agent's local frame (x forward, y left).
///
/// The `id` is assigned by the caller and is not used for matching.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandmarkObservation {
    pub id: i32,
    pub x: f64,
    pub y: f64,
}

impl LandmarkObservation {
    pub fn new(id: i32, x: f64, y: f64) -> Self {
        LandmarkObservation { id, x, y }
    }

    pub fn point(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

/// Rigid transform between an agent's local frame and the map frame for one pose.
///
/// A point is rotated by the pose heading, then translated by the pose position:
///
/// ```text
/// mx = x + cos(theta) * ox - sin(theta) * oy
/// my = y + sin(theta) * ox + cos(theta) * oy
/// ```
///
/// Build it once per particle and reuse it for every observation of the cycle.
#[derive(Clone, Copy, Debug)]
pub struct ObservationTransform {
    isometry: Isometry2<f64>,
}

impl ObservationTransform {
    pub fn new(pose: &Pose) -> Self {
        ObservationTransform {
            isometry: Isometry2::new(Vector2::new(pose.x, pose.y), pose.theta),
        }
    }

    /// Express a local-frame point in the map frame.
    pub fn to_map(&self, local: &Point2<f64>) -> Point2<f64> {
        self.isometry.transform_point(local)
    }

    /// Express a map-frame point in the local frame of the pose.
    pub fn to_local(&self, map: &Point2<f64>) -> Point2<f64> {
        self.isometry.inverse_transform_point(map)
    }
}
