//! Monte Carlo localization against a landmark map
//!
//! This crate implements a two-dimensional particle filter (sequential importance resampling) that
//! estimates the pose `(x, y, theta)` of a moving agent. The agent's motion is described by a forward
//! velocity and yaw rate, and it observes point landmarks of a known map in its own frame. Each filter
//! cycle predicts every particle through a noisy motion model, weighs it by how well its transformed
//! observations match the map and then resamples the population in proportion to those weights.
//!
//! This crate is primarily built off of three additional dependencies:
//! - [`nalgebra`](https://crates.io/crates/nalgebra): Provides the rigid transforms and points used for
//!   observation geometry.
//! - [`rand`](https://crates.io/crates/rand) and [`rand_distr`](https://crates.io/crates/rand_distr):
//!   Provide the seeded random streams for process noise and resampling.
//! - [`rayon`](https://crates.io/crates/rayon): Provides optional data parallelism for the predict and
//!   update phases.
//!
//! ## Crate overview
//!
//! This crate is organized into several modules:
//! - [filter]: The [`ParticleFilter`] and its predict / update / resample cycle.
//! - [particle]: Poses and particles, including the per-particle association record.
//! - [motion]: The constant velocity and yaw rate motion model.
//! - [observation]: Agent-frame observations and the rigid transform into the map frame.
//! - [association]: Nearest-neighbor data association and optional range gating.
//! - [likelihood]: The bivariate Gaussian measurement likelihood.
//! - [resample]: Multinomial, systematic and residual resampling.
//! - [map]: Landmarks and the landmark map.
//! - [random]: The injectable random source.
//! - [config]: Filter configuration.
//! - [error]: The crate error type.
//! - [sim]: Synthetic scenarios and a closed-loop simulation harness.
//!
//! ## Conventions
//!
//! Angles are in radians and positive counter-clockwise. Headings are not wrapped by the filter; wrap
//! them for display with [`sim::wrap_angle`]. An observation `(x, y)` is expressed in the agent frame,
//! with `x` forward and `y` to the left.
pub mod association;
pub mod config;
pub mod error;
pub mod filter;
pub mod likelihood;
pub mod map;
pub mod motion;
pub mod observation;
pub mod particle;
pub mod random;
pub mod resample;
pub mod sim;

pub use association::{LandmarkAssociator, NearestNeighbor, RangeGate};
pub use config::FilterConfig;
pub use error::{FilterError, Result};
pub use filter::ParticleFilter;
pub use likelihood::LandmarkNoise;
pub use map::{Landmark, LandmarkMap};
pub use motion::{Control, MotionModel, PoseStd};
pub use observation::{LandmarkObservation, ObservationTransform};
pub use particle::{Particle, Pose, SenseAxis};
pub use random::{RandomSource, SeededRandom};
pub use resample::{DegenerateWeightPolicy, ResamplingStrategy};
