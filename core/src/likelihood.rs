//! Bivariate Gaussian measurement likelihood with independent axes.
//!
//! For an observation transformed into the map frame at `(mx, my)` and matched to a
//! landmark at `(lx, ly)`:
//!
//! ```text
//! density = exp(-(dx^2 / (2 sx^2) + dy^2 / (2 sy^2))) / (2 pi sx sy)
//! ```
//!
//! The density is strictly positive in exact arithmetic. In `f64` the exponential
//! underflows to zero once the exponent `dx^2 / (2 sx^2) + dy^2 / (2 sy^2)` passes
//! roughly 745 (about 38.6 standard deviations along one axis). At the other end the peak
//! density `1 / (2 pi sx sy)` exceeds 1 for small sigmas, so a raw product over many
//! observations overflows once the summed log-densities pass about 709.8 (`ln f64::MAX`),
//! e.g. 100 observations at `sx = sy = 0.01`.
//!
//! Particle weights are therefore accumulated from [`LandmarkNoise::log_density`] and only
//! exponentiated after the population's maximum log-weight has been subtracted, which keeps
//! the best particle at weight 1. A weight is exactly zero only when its particle had an
//! observation with no eligible landmark, or when it is more than about 745 nats less
//! likely than the best particle.

use std::f64::consts::PI;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ensure_positive};
use crate::map::Landmark;

/// Exponent beyond which `exp(-q)` is zero in `f64`.
pub const UNDERFLOW_EXPONENT: f64 = 745.133_219_101_941_1;

/// Log-density beyond which `exp` overflows `f64`.
pub const OVERFLOW_LOG_DENSITY: f64 = 709.782_712_893_384;

/// Per-axis landmark measurement standard deviations.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandmarkNoise {
    sigma_x: f64,
    sigma_y: f64,
}

impl LandmarkNoise {
    /// Both deviations must be finite and strictly positive.
    pub fn new(std_landmark: [f64; 2]) -> Result<Self> {
        ensure_positive(std_landmark[0], "sigma_x")?;
        ensure_positive(std_landmark[1], "sigma_y")?;
        Ok(LandmarkNoise {
            sigma_x: std_landmark[0],
            sigma_y: std_landmark[1],
        })
    }

    pub fn sigma_x(&self) -> f64 {
        self.sigma_x
    }

    pub fn sigma_y(&self) -> f64 {
        self.sigma_y
    }

    fn exponent(&self, dx: f64, dy: f64) -> f64 {
        dx * dx / (2.0 * self.sigma_x * self.sigma_x)
            + dy * dy / (2.0 * self.sigma_y * self.sigma_y)
    }

    fn normalizer(&self) -> f64 {
        2.0 * PI * self.sigma_x * self.sigma_y
    }

    /// Density of an offset `(dx, dy)` from the landmark mean.
    pub fn density(&self, dx: f64, dy: f64) -> f64 {
        (-self.exponent(dx, dy)).exp() / self.normalizer()
    }

    /// Natural log of [`density`](Self::density); finite even where the density underflows.
    pub fn log_density(&self, dx: f64, dy: f64) -> f64 {
        -self.exponent(dx, dy) - self.normalizer().ln()
    }

    /// Log-likelihood of a map-frame point given its matched landmark.
    pub fn log_likelihood(&self, point: &Point2<f64>, landmark: &Landmark) -> f64 {
        self.log_density(point.x - landmark.x, point.y - landmark.y)
    }
}
