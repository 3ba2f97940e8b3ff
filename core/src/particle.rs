//! Pose hypotheses and their diagnostic association bookkeeping.
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::error::{FilterError, Result};

/// Planar pose in the map frame. Heading `theta` is in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose { x, y, theta }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.theta.is_finite()
    }
}

impl Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.4} rad)", self.x, self.y, self.theta)
    }
}

/// Which coordinate list of a particle's associations to render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SenseAxis {
    X,
    Y,
}

/// One weighted pose hypothesis.
///
/// `associations`, `sense_x` and `sense_y` are index-aligned diagnostics describing which
/// landmark each observation matched and where that landmark sits in the map frame. They
/// never feed back into prediction, weighting or resampling.
#[derive(Debug, Default, PartialEq)]
pub struct Particle {
    pub id: i32,
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    pub weight: f64,
    associations: Vec<i32>,
    sense_x: Vec<f64>,
    sense_y: Vec<f64>,
}

// Explicit impl so resampling into a recycled buffer reuses the association vectors.
impl Clone for Particle {
    fn clone(&self) -> Self {
        Particle {
            id: self.id,
            x: self.x,
            y: self.y,
            theta: self.theta,
            weight: self.weight,
            associations: self.associations.clone(),
            sense_x: self.sense_x.clone(),
            sense_y: self.sense_y.clone(),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.id = source.id;
        self.x = source.x;
        self.y = source.y;
        self.theta = source.theta;
        self.weight = source.weight;
        self.associations.clone_from(&source.associations);
        self.sense_x.clone_from(&source.sense_x);
        self.sense_y.clone_from(&source.sense_y);
    }
}

impl Display for Particle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Particle")
            .field("id", &self.id)
            .field("x", &self.x)
            .field("y", &self.y)
            .field("theta", &self.theta)
            .field("weight", &self.weight)
            .field("associations", &self.associations.len())
            .finish()
    }
}

impl Particle {
    pub fn new(id: i32, pose: Pose, weight: f64) -> Particle {
        Particle {
            id,
            x: pose.x,
            y: pose.y,
            theta: pose.theta,
            weight,
            ..Default::default()
        }
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.x, self.y, self.theta)
    }

    pub fn set_pose(&mut self, pose: Pose) {
        self.x = pose.x;
        self.y = pose.y;
        self.theta = pose.theta;
    }

    /// Replace the association bookkeeping.
    ///
    /// Fails with `InvalidParameter` when the three sequences differ in length.
    pub fn set_associations(
        &mut self,
        associations: Vec<i32>,
        sense_x: Vec<f64>,
        sense_y: Vec<f64>,
    ) -> Result<()> {
        if associations.len() != sense_x.len() || associations.len() != sense_y.len() {
            return Err(FilterError::InvalidParameter(format!(
                "association lengths differ: {} ids, {} x, {} y",
                associations.len(),
                sense_x.len(),
                sense_y.len()
            )));
        }
        self.associations = associations;
        self.sense_x = sense_x;
        self.sense_y = sense_y;
        Ok(())
    }

    pub(crate) fn clear_associations(&mut self) {
        self.associations.clear();
        self.sense_x.clear();
        self.sense_y.clear();
    }

    pub(crate) fn push_association(&mut self, id: i32, x: f64, y: f64) {
        self.associations.push(id);
        self.sense_x.push(x);
        self.sense_y.push(y);
    }

    pub fn associations(&self) -> &[i32] {
        &self.associations
    }

    pub fn sense_x(&self) -> &[f64] {
        &self.sense_x
    }

    pub fn sense_y(&self) -> &[f64] {
        &self.sense_y
    }

    /// Space-delimited landmark ids, no trailing separator.
    pub fn associations_string(&self) -> String {
        join_values(&self.associations)
    }

    /// Space-delimited matched coordinates along `axis`, no trailing separator.
    pub fn sense_string(&self, axis: SenseAxis) -> String {
        match axis {
            SenseAxis::X => join_values(&self.sense_x),
            SenseAxis::Y => join_values(&self.sense_y),
        }
    }
}

fn join_values<T: Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
