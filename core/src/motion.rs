//! Velocity / yaw-rate motion model with additive Gaussian process noise.
//!
//! For a pose `(x, y, theta)` advanced by `dt` under velocity `v` and yaw rate `w`:
//!
//! ```text
//! |w| > 1e-6 (arc):      x' = x + v/w * (sin(theta + w dt) - sin(theta))
//!                        y' = y + v/w * (cos(theta) - cos(theta + w dt))
//! otherwise (straight):  x' = x + v dt cos(theta)
//!                        y' = y + v dt sin(theta)
//! both:                  theta' = theta + w dt
//! ```
//!
//! Independent `Normal(0, std)` noise is then added per axis.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ensure_finite, ensure_non_negative_std, ensure_positive};
use crate::particle::Pose;
use crate::random::RandomSource;

/// Below this magnitude the yaw rate is treated as zero to avoid dividing by it.
pub const YAW_RATE_EPSILON: f64 = 1e-6;

/// Commanded motion for one timestep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Control {
    /// Forward velocity (m/s)
    pub velocity: f64,
    /// Yaw rate (rad/s)
    pub yaw_rate: f64,
}

impl Control {
    pub fn new(velocity: f64, yaw_rate: f64) -> Self {
        Control { velocity, yaw_rate }
    }
}

/// Per-axis standard deviations `(x, y, theta)` of a pose distribution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseStd {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl PoseStd {
    /// Validated construction; every component must be finite and non-negative.
    pub fn new(std: [f64; 3]) -> Result<Self> {
        ensure_non_negative_std(std[0], "std_x")?;
        ensure_non_negative_std(std[1], "std_y")?;
        ensure_non_negative_std(std[2], "std_theta")?;
        Ok(PoseStd {
            x: std[0],
            y: std[1],
            theta: std[2],
        })
    }

    /// Draw a pose from `Normal(mean.x, x) x Normal(mean.y, y) x Normal(mean.theta, theta)`.
    pub fn sample_around<R: RandomSource + ?Sized>(&self, mean: &Pose, rng: &mut R) -> Result<Pose> {
        Ok(Pose::new(
            rng.gaussian(mean.x, self.x)?,
            rng.gaussian(mean.y, self.y)?,
            rng.gaussian(mean.theta, self.theta)?,
        ))
    }
}

/// One validated prediction step: elapsed time, controls and process noise.
#[derive(Clone, Copy, Debug)]
pub struct MotionModel {
    delta_t: f64,
    control: Control,
    noise: PoseStd,
}

impl MotionModel {
    pub fn new(delta_t: f64, std_pos: [f64; 3], control: Control) -> Result<Self> {
        ensure_positive(delta_t, "delta_t")?;
        ensure_finite(control.velocity, "velocity")?;
        ensure_finite(control.yaw_rate, "yaw_rate")?;
        Ok(MotionModel {
            delta_t,
            control,
            noise: PoseStd::new(std_pos)?,
        })
    }

    /// Noise-free kinematic prediction.
    pub fn propagate(&self, pose: &Pose) -> Pose {
        let Control { velocity, yaw_rate } = self.control;
        let dt = self.delta_t;
        let theta = pose.theta + yaw_rate * dt;
        if yaw_rate.abs() > YAW_RATE_EPSILON {
            let radius = velocity / yaw_rate;
            Pose::new(
                pose.x + radius * (theta.sin() - pose.theta.sin()),
                pose.y + radius * (pose.theta.cos() - theta.cos()),
                theta,
            )
        } else {
            Pose::new(
                pose.x + velocity * dt * pose.theta.cos(),
                pose.y + velocity * dt * pose.theta.sin(),
                theta,
            )
        }
    }

    /// Kinematic prediction followed by independent per-axis process noise.
    pub fn sample<R: RandomSource + ?Sized>(&self, pose: &Pose, rng: &mut R) -> Result<Pose> {
        let predicted = self.propagate(pose);
        self.noise.sample_around(&predicted, rng)
    }
}
