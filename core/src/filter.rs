//! Sequential importance resampling particle filter for landmark-based localization.
//!
//! The filter owns a fixed-size population of [`Particle`]s together with the weight vector
//! consumed by resampling. Each cycle runs strictly in order:
//!
//! 1. [`predict`](ParticleFilter::predict) advances every particle through the motion model.
//! 2. [`update_weights`](ParticleFilter::update_weights) transforms each observation into the
//!    map frame per particle, associates it with a landmark and multiplies the particle weight
//!    by the measurement likelihood.
//! 3. [`resample`](ParticleFilter::resample) draws the next generation in proportion to weight.
//!
//! # Example
//!
//! ```rust
//! use mcl::{FilterConfig, Landmark, LandmarkMap, LandmarkObservation, ParticleFilter};
//!
//! let map = LandmarkMap::new(vec![Landmark::new(1, 5.0, 0.0), Landmark::new(2, 0.0, 5.0)]);
//! let mut pf = ParticleFilter::new(FilterConfig::default())?;
//! pf.init(0.0, 0.0, 0.0, [0.3, 0.3, 0.01])?;
//!
//! pf.predict(0.1, [0.3, 0.3, 0.01], 1.0, 0.0)?;
//! pf.update_weights(50.0, [0.3, 0.3], &[LandmarkObservation::new(0, 4.9, 0.0)], &map)?;
//! pf.resample()?;
//!
//! assert_eq!(pf.particles().len(), 100);
//! # Ok::<(), mcl::FilterError>(())
//! ```

use std::fmt::{self, Debug};

use log::{debug, trace, warn};
use nalgebra::Point2;
use rayon::prelude::*;

use crate::association::{LandmarkAssociator, NearestNeighbor, RangeGate};
use crate::config::FilterConfig;
use crate::error::{FilterError, Result, ensure_finite};
use crate::likelihood::LandmarkNoise;
use crate::map::{Landmark, LandmarkMap};
use crate::motion::{Control, MotionModel, PoseStd};
use crate::observation::{LandmarkObservation, ObservationTransform};
use crate::particle::{Particle, Pose, SenseAxis};
use crate::random::{RandomSource, SeededRandom};
use crate::resample::resample_indices;

/// Monte Carlo localization filter.
///
/// Generic over the random source and the landmark associator so tests can inject a seeded
/// generator and a faster associator can replace the brute-force search.
pub struct ParticleFilter<R = SeededRandom, A = NearestNeighbor> {
    config: FilterConfig,
    particles: Vec<Particle>,
    /// Recycled buffer the next generation is written into during resampling.
    spare: Vec<Particle>,
    weights: Vec<f64>,
    /// Summed observation log-densities from the last update, aligned with `particles`.
    log_weights: Vec<f64>,
    rng: R,
    associator: A,
    initialized: bool,
}

impl<R, A> Debug for ParticleFilter<R, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let min_weight = self.weights.iter().copied().fold(f64::INFINITY, f64::min);
        let max_weight = self.weights.iter().copied().fold(0.0, f64::max);
        f.debug_struct("ParticleFilter")
            .field("num_particles", &self.particles.len())
            .field("initialized", &self.initialized)
            .field("effective_particles", &self.effective_sample_size())
            .field(
                "weight_range",
                &format_args!("[{:.4e}, {:.4e}]", min_weight, max_weight),
            )
            .field("resampling", &self.config.resampling_strategy)
            .finish()
    }
}

impl ParticleFilter<SeededRandom, NearestNeighbor> {
    /// Create a filter seeded from `config.seed` using nearest-neighbor association.
    pub fn new(config: FilterConfig) -> Result<Self> {
        let rng = SeededRandom::new(config.seed);
        Self::with_parts(config, rng, NearestNeighbor)
    }
}

impl<R, A> ParticleFilter<R, A>
where
    R: RandomSource + Send,
    A: LandmarkAssociator,
{
    pub fn with_parts(config: FilterConfig, rng: R, associator: A) -> Result<Self> {
        config.validate()?;
        Ok(ParticleFilter {
            particles: Vec::with_capacity(config.num_particles),
            spare: Vec::with_capacity(config.num_particles),
            weights: Vec::with_capacity(config.num_particles),
            log_weights: Vec::with_capacity(config.num_particles),
            config,
            rng,
            associator,
            initialized: false,
        })
    }

    /// Sample the population around an initial pose estimate.
    ///
    /// Each particle is drawn from `Normal(x, std[0]) x Normal(y, std[1]) x Normal(theta, std[2])`
    /// with weight 1. Calling this again replaces the population entirely.
    pub fn init(&mut self, x: f64, y: f64, theta: f64, std: [f64; 3]) -> Result<()> {
        let mean = Pose::new(x, y, theta);
        if !mean.is_finite() {
            return Err(FilterError::InvalidParameter(format!(
                "initial pose must be finite, got {mean}"
            )));
        }
        let spread = PoseStd::new(std)?;
        let mut particles = Vec::with_capacity(self.config.num_particles);
        for id in 0..self.config.num_particles {
            let pose = spread.sample_around(&mean, &mut self.rng)?;
            particles.push(Particle::new(id as i32, pose, 1.0));
        }
        self.particles = particles;
        self.spare.clear();
        self.weights = vec![1.0; self.config.num_particles];
        self.log_weights = vec![0.0; self.config.num_particles];
        self.initialized = true;
        debug!(
            "Initialized {} particles around {} with std {:?}",
            self.particles.len(),
            mean,
            std
        );
        Ok(())
    }

    /// Advance every particle by `delta_t` under the given controls plus process noise.
    ///
    /// Weights are not touched. The new poses are written into the spare buffer and swapped
    /// in only once every particle has been predicted, so a failure leaves the population
    /// where it was.
    pub fn predict(
        &mut self,
        delta_t: f64,
        std_pos: [f64; 3],
        velocity: f64,
        yaw_rate: f64,
    ) -> Result<()> {
        self.ensure_initialized()?;
        let model = MotionModel::new(delta_t, std_pos, Control::new(velocity, yaw_rate))?;

        self.spare.clone_from(&self.particles);
        if self.config.parallel {
            let chunk_size = self.config.parallel_chunk_size;
            let mut streams: Vec<R> = (0..self.spare.len().div_ceil(chunk_size))
                .map(|_| self.rng.split())
                .collect();
            self.spare
                .par_chunks_mut(chunk_size)
                .zip(streams.par_iter_mut())
                .try_for_each(|(chunk, rng)| {
                    for particle in chunk {
                        let pose = model.sample(&particle.pose(), rng)?;
                        particle.set_pose(pose);
                    }
                    Ok::<(), FilterError>(())
                })?;
        } else {
            for particle in self.spare.iter_mut() {
                let pose = model.sample(&particle.pose(), &mut self.rng)?;
                particle.set_pose(pose);
            }
        }
        std::mem::swap(&mut self.particles, &mut self.spare);
        debug!(
            "Predicted {} particles: dt={delta_t}, v={velocity}, yaw_rate={yaw_rate}",
            self.particles.len()
        );
        Ok(())
    }

    /// Reweight every particle against this cycle's observations.
    ///
    /// Each particle's log-weight is the sum of the bivariate Gaussian log-densities of
    /// every observation against its associated landmark. Weights are then
    /// `exp(log_weight - max_log_weight)`: proportional to the product of densities, with
    /// the most likely particle at exactly 1, so the product neither overflows nor
    /// underflows with many observations or small sigmas. `sensor_range` only restricts
    /// candidates when range gating is enabled in the configuration; an observation with no
    /// landmark in range then contributes zero likelihood, and only a population where every
    /// particle has zero likelihood ends up with all-zero weights. An empty observation list
    /// leaves every weight at 1.
    pub fn update_weights(
        &mut self,
        sensor_range: f64,
        std_landmark: [f64; 2],
        observations: &[LandmarkObservation],
        map: &LandmarkMap,
    ) -> Result<()> {
        self.ensure_initialized()?;
        let noise = LandmarkNoise::new(std_landmark)?;
        if map.is_empty() {
            return Err(FilterError::InvalidMap(
                "cannot associate observations against an empty landmark map".to_string(),
            ));
        }
        for observation in observations {
            ensure_finite(observation.x, "observation x")?;
            ensure_finite(observation.y, "observation y")?;
        }
        let gate = if self.config.range_gating {
            RangeGate::within(sensor_range)?
        } else {
            RangeGate::disabled()
        };
        let record = self.config.record_associations;
        let associator = &self.associator;

        self.log_weights.resize(self.particles.len(), 0.0);
        if self.config.parallel {
            self.particles
                .par_iter_mut()
                .zip(self.log_weights.par_iter_mut())
                .for_each_init(
                    || Vec::with_capacity(map.len()),
                    |candidates, (particle, log_weight)| {
                        *log_weight = weigh_particle(
                            particle,
                            observations,
                            map,
                            &gate,
                            &noise,
                            associator,
                            record,
                            candidates,
                        )
                    },
                );
        } else {
            let mut candidates: Vec<&Landmark> = Vec::with_capacity(map.len());
            let slots = self.particles.iter_mut().zip(self.log_weights.iter_mut());
            for (particle, log_weight) in slots {
                *log_weight = weigh_particle(
                    particle,
                    observations,
                    map,
                    &gate,
                    &noise,
                    associator,
                    record,
                    &mut candidates,
                );
            }
        }

        let max_log_weight = self
            .log_weights
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        self.weights.clear();
        for (particle, &log_weight) in self.particles.iter_mut().zip(self.log_weights.iter()) {
            particle.weight = if max_log_weight == f64::NEG_INFINITY {
                0.0
            } else {
                (log_weight - max_log_weight).exp()
            };
            self.weights.push(particle.weight);
        }

        let total: f64 = self.weights.iter().sum();
        if total <= 0.0 {
            warn!(
                "All {} particle weights are zero after {} observations",
                self.weights.len(),
                observations.len()
            );
        }
        debug!(
            "Updated weights from {} observations: max log-weight={max_log_weight:.4}, total={total:.4e}, n_eff={:.1}",
            observations.len(),
            self.effective_sample_size()
        );
        Ok(())
    }

    /// Replace the population with draws proportional to the current weight vector.
    ///
    /// Selected particles are copied into a recycled buffer which is then swapped in, so
    /// the draw never reads a slot it has already overwritten. With
    /// [`DegenerateWeightPolicy::Error`](crate::resample::DegenerateWeightPolicy::Error) an
    /// all-zero weight vector returns [`FilterError::DegenerateWeights`] and the population is
    /// left as it was.
    pub fn resample(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        let indices = resample_indices(
            self.config.resampling_strategy,
            self.config.degenerate_policy,
            &self.weights,
            &mut self.rng,
        )?;

        self.spare.resize_with(self.particles.len(), Particle::default);
        for (slot, &source) in self.spare.iter_mut().zip(indices.iter()) {
            slot.clone_from(&self.particles[source]);
        }
        std::mem::swap(&mut self.particles, &mut self.spare);

        for (weight, particle) in self.weights.iter_mut().zip(self.particles.iter()) {
            *weight = particle.weight;
        }
        self.log_weights = indices.iter().map(|&i| self.log_weights[i]).collect();
        trace!("Resampled source indices: {indices:?}");
        debug!(
            "Resampled {} particles ({:?})",
            self.particles.len(),
            self.config.resampling_strategy
        );
        Ok(())
    }

    /// Attach association diagnostics to the particle at `index`.
    pub fn set_associations(
        &mut self,
        index: usize,
        associations: Vec<i32>,
        sense_x: Vec<f64>,
        sense_y: Vec<f64>,
    ) -> Result<()> {
        let count = self.particles.len();
        let particle = self.particles.get_mut(index).ok_or_else(|| {
            FilterError::InvalidParameter(format!(
                "particle index {index} out of range for {count} particles"
            ))
        })?;
        particle.set_associations(associations, sense_x, sense_y)
    }

    /// Space-delimited landmark ids of a particle's associations.
    pub fn get_associations(particle: &Particle) -> String {
        particle.associations_string()
    }

    /// Space-delimited map coordinates of a particle's associations along `axis`.
    pub fn get_sense_coord(particle: &Particle, axis: SenseAxis) -> String {
        particle.sense_string(axis)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized && !self.particles.is_empty() {
            Ok(())
        } else {
            Err(FilterError::Uninitialized)
        }
    }
}

impl<R, A> ParticleFilter<R, A> {
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn num_particles(&self) -> usize {
        self.config.num_particles
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Weight vector index-aligned with [`particles`](Self::particles).
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Unscaled log-likelihoods behind [`weights`](Self::weights); `-inf` marks a
    /// particle with zero likelihood.
    pub fn log_weights(&self) -> &[f64] {
        &self.log_weights
    }

    /// Particle with the largest weight; the first one wins ties.
    pub fn best_particle(&self) -> Option<&Particle> {
        self.particles.iter().reduce(|best, p| {
            if p.weight.total_cmp(&best.weight).is_gt() {
                p
            } else {
                best
            }
        })
    }

    /// Effective sample size `(sum w)^2 / sum w^2` of the current weights.
    pub fn effective_sample_size(&self) -> f64 {
        let sum: f64 = self.weights.iter().sum();
        let sum_of_squares: f64 = self.weights.iter().map(|w| w * w).sum();
        if sum_of_squares > 0.0 {
            sum * sum / sum_of_squares
        } else {
            0.0
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn weigh_particle<'m, A: LandmarkAssociator + ?Sized>(
    particle: &mut Particle,
    observations: &[LandmarkObservation],
    map: &'m LandmarkMap,
    gate: &RangeGate,
    noise: &LandmarkNoise,
    associator: &A,
    record: bool,
    candidates: &mut Vec<&'m Landmark>,
) -> f64 {
    if record {
        particle.clear_associations();
    }
    if observations.is_empty() {
        return 0.0;
    }
    let mut log_weight = 0.0;
    let transform = ObservationTransform::new(&particle.pose());
    gate.candidates(&Point2::new(particle.x, particle.y), map, candidates);
    for observation in observations {
        let point = transform.to_map(&observation.point());
        match associator.associate(&point, candidates) {
            Some(landmark) => {
                log_weight += noise.log_likelihood(&point, landmark);
                if record {
                    particle.push_association(landmark.id, landmark.x, landmark.y);
                }
            }
            None => log_weight = f64::NEG_INFINITY,
        }
    }
    trace!("Particle {} log-weight {:.4}", particle.id, log_weight);
    log_weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resample::{DegenerateWeightPolicy, ResamplingStrategy};
    use assert_approx_eq::assert_approx_eq;

    fn square_map() -> LandmarkMap {
        LandmarkMap::new(vec![
            Landmark::new(1, 10.0, 0.0),
            Landmark::new(2, 0.0, 10.0),
            Landmark::new(3, -10.0, 0.0),
            Landmark::new(4, 0.0, -10.0),
        ])
    }

    fn filter(num_particles: usize) -> ParticleFilter {
        ParticleFilter::new(FilterConfig {
            num_particles,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_init_population() {
        let mut pf = filter(100);
        assert!(!pf.is_initialized());
        pf.init(4.0, -2.0, 0.5, [0.3, 0.3, 0.01]).unwrap();
        assert_eq!(pf.particles().len(), 100);
        assert_eq!(pf.weights(), vec![1.0; 100].as_slice());
        let mean_x = pf.particles().iter().map(|p| p.x).sum::<f64>() / 100.0;
        assert_approx_eq!(mean_x, 4.0, 0.15);
        for (i, p) in pf.particles().iter().enumerate() {
            assert_eq!(p.id, i as i32);
            assert!(p.associations().is_empty());
        }
    }

    #[test]
    fn test_init_zero_std_is_exact_and_reinit_replaces() {
        let mut pf = filter(10);
        pf.init(1.0, 2.0, 3.0, [0.0; 3]).unwrap();
        assert!(pf.particles().iter().all(|p| p.pose() == Pose::new(1.0, 2.0, 3.0)));
        pf.init(-1.0, 0.0, 0.0, [0.0; 3]).unwrap();
        assert_eq!(pf.particles().len(), 10);
        assert!(pf.particles().iter().all(|p| p.x == -1.0));
    }

    #[test]
    fn test_init_negative_std_leaves_state() {
        let mut pf = filter(10);
        assert!(matches!(
            pf.init(0.0, 0.0, 0.0, [0.1, -0.1, 0.1]),
            Err(FilterError::InvalidParameter(_))
        ));
        assert!(!pf.is_initialized());
        assert!(pf.particles().is_empty());
    }

    #[test]
    fn test_uninitialized_phases_fail() {
        let mut pf = filter(10);
        assert!(matches!(
            pf.predict(0.1, [0.0; 3], 1.0, 0.0),
            Err(FilterError::Uninitialized)
        ));
        assert!(matches!(
            pf.update_weights(50.0, [0.3, 0.3], &[], &square_map()),
            Err(FilterError::Uninitialized)
        ));
        assert!(matches!(pf.resample(), Err(FilterError::Uninitialized)));
    }

    #[test]
    fn test_predict_straight_and_arc() {
        let mut pf = filter(5);
        pf.init(0.0, 0.0, 0.0, [0.0; 3]).unwrap();
        pf.predict(2.0, [0.0; 3], 3.0, 0.0).unwrap();
        for p in pf.particles() {
            assert_eq!(p.pose(), Pose::new(6.0, 0.0, 0.0));
        }

        let (v, w, t) = (2.0, 0.5, 1.2);
        pf.init(0.0, 0.0, 0.0, [0.0; 3]).unwrap();
        pf.predict(t, [0.0; 3], v, w).unwrap();
        for p in pf.particles() {
            assert_approx_eq!(p.x, (v / w) * (w * t).sin(), 1e-12);
            assert_approx_eq!(p.y, (v / w) * (1.0 - (w * t).cos()), 1e-12);
            assert_approx_eq!(p.theta, w * t, 1e-12);
            assert_eq!(p.weight, 1.0);
        }
    }

    #[test]
    fn test_predict_invalid_dt_leaves_state() {
        let mut pf = filter(5);
        pf.init(0.0, 0.0, 0.0, [0.0; 3]).unwrap();
        assert!(pf.predict(0.0, [0.0; 3], 1.0, 0.0).is_err());
        assert!(pf.predict(0.1, [0.0, 0.0, -1.0], 1.0, 0.0).is_err());
        assert!(pf.particles().iter().all(|p| p.pose() == Pose::default()));
    }

    #[test]
    fn test_update_weights_expected_density() {
        let mut pf = filter(3);
        pf.init(0.0, 0.0, 0.0, [0.0; 3]).unwrap();
        let observations = [
            LandmarkObservation::new(0, 9.8, 0.1),
            LandmarkObservation::new(1, 0.2, 10.1),
        ];
        pf.update_weights(50.0, [0.3, 0.3], &observations, &square_map())
            .unwrap();
        let noise = LandmarkNoise::new([0.3, 0.3]).unwrap();
        let expected = noise.density(-0.2, 0.1) * noise.density(0.2, 0.1);
        for ((p, w), lw) in pf.particles().iter().zip(pf.weights()).zip(pf.log_weights()) {
            assert_approx_eq!(*lw, expected.ln(), 1e-12);
            // Identical particles are equally likely; the best is scaled to 1.
            assert_eq!(p.weight, 1.0);
            assert_eq!(p.weight, *w);
            assert_eq!(p.associations(), &[1, 2]);
            assert_eq!(p.sense_x(), &[10.0, 0.0]);
            assert_eq!(p.sense_y(), &[0.0, 10.0]);
        }
    }

    #[test]
    fn test_update_weights_rotated_particle() {
        let mut pf = filter(1);
        // Facing +y: an observation straight ahead lands on landmark 2.
        pf.init(0.0, 0.0, std::f64::consts::FRAC_PI_2, [0.0; 3]).unwrap();
        pf.update_weights(50.0, [0.3, 0.3], &[LandmarkObservation::new(0, 10.0, 0.0)], &square_map())
            .unwrap();
        assert_eq!(pf.particles()[0].associations(), &[2]);
        assert_approx_eq!(
            pf.log_weights()[0],
            LandmarkNoise::new([0.3, 0.3]).unwrap().log_density(0.0, 0.0),
            1e-9
        );
        assert_eq!(pf.weights()[0], 1.0);
    }

    #[test]
    fn test_update_weights_relative_to_best_particle() {
        let mut pf = filter(2);
        pf.init(0.0, 0.0, 0.0, [0.0; 3]).unwrap();
        pf.particles[1].x = 0.2;
        let observations = [LandmarkObservation::new(0, 10.0, 0.0)];
        pf.update_weights(50.0, [0.3, 0.3], &observations, &square_map())
            .unwrap();
        let noise = LandmarkNoise::new([0.3, 0.3]).unwrap();
        assert_eq!(pf.weights()[0], 1.0);
        assert_approx_eq!(
            pf.weights()[1],
            noise.density(0.2, 0.0) / noise.density(0.0, 0.0),
            1e-12
        );
    }

    #[test]
    fn test_many_sharp_observations_do_not_overflow() {
        let landmarks: Vec<Landmark> = (0..120)
            .map(|i| Landmark::new(i + 1, (i % 12) as f64 * 5.0, (i / 12) as f64 * 5.0))
            .collect();
        let map = LandmarkMap::new(landmarks);
        let observations: Vec<LandmarkObservation> = map
            .iter()
            .map(|l| LandmarkObservation::new(-1, l.x - 1.0, l.y - 2.0))
            .collect();
        let mut pf = filter(10);
        pf.init(1.0, 2.0, 0.0, [0.0; 3]).unwrap();
        pf.particles[3].x = 1.005;
        pf.update_weights(50.0, [0.01, 0.01], &observations, &map)
            .unwrap();

        // The raw product of densities would be far beyond f64::MAX.
        assert!(pf.log_weights()[0] > crate::likelihood::OVERFLOW_LOG_DENSITY);
        assert!(pf.weights().iter().all(|w| w.is_finite()));
        assert_eq!(pf.weights()[0], 1.0);
        assert!(pf.weights()[3] > 0.0 && pf.weights()[3] < 1.0);

        pf.resample().unwrap();
        assert_eq!(pf.particles().len(), 10);
    }

    #[test]
    fn test_far_observations_keep_best_particle() {
        let map = LandmarkMap::new(vec![Landmark::new(1, 0.0, 0.0)]);
        let mut pf = filter(3);
        pf.init(0.0, 0.0, 0.0, [0.0; 3]).unwrap();
        pf.particles[1].x = 1.0;
        pf.particles[2].x = -1.0;
        // Every density underflows on its own; the nearest particle still wins.
        let observations = [LandmarkObservation::new(1, 5_000.0, 0.0)];
        pf.update_weights(50.0, [0.3, 0.3], &observations, &map)
            .unwrap();
        assert_eq!(pf.weights(), &[0.0, 0.0, 1.0]);
        pf.resample().unwrap();
        assert!(pf.particles().iter().all(|p| p.id == 2));
    }

    #[test]
    fn test_predict_failure_leaves_population() {
        let mut pf = filter(100);
        pf.init(0.0, 0.0, 0.0, [0.0, 0.0, 3.0]).unwrap();
        pf.predict(1.0, [0.0; 3], 1e308, 0.0).unwrap();
        let before: Vec<Pose> = pf.particles().iter().map(|p| p.pose()).collect();
        // Particles heading close to an axis overflow on the second step, the rest do not.
        assert!(matches!(
            pf.predict(1.0, [0.0; 3], 1e308, 0.0),
            Err(FilterError::InvalidParameter(_))
        ));
        let after: Vec<Pose> = pf.particles().iter().map(|p| p.pose()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_update_weights_positive_for_valid_inputs() {
        let mut pf = filter(200);
        pf.init(0.0, 0.0, 0.0, [1.0, 1.0, 0.1]).unwrap();
        let observations = [LandmarkObservation::new(0, 10.0, 0.0)];
        pf.update_weights(50.0, [0.3, 0.3], &observations, &square_map())
            .unwrap();
        assert!(pf.weights().iter().all(|&w| w > 0.0));
    }

    #[test]
    fn test_update_weights_empty_observations_uninformative() {
        let mut pf = filter(20);
        pf.init(0.0, 0.0, 0.0, [1.0, 1.0, 0.1]).unwrap();
        pf.update_weights(50.0, [0.3, 0.3], &[], &square_map()).unwrap();
        assert!(pf.weights().iter().all(|&w| w == 1.0));
        assert_approx_eq!(pf.effective_sample_size(), 20.0, 1e-9);
    }

    #[test]
    fn test_update_weights_rejects_bad_inputs() {
        let mut pf = filter(5);
        pf.init(0.0, 0.0, 0.0, [0.0; 3]).unwrap();
        let observations = [LandmarkObservation::new(0, 10.0, 0.0)];
        assert!(matches!(
            pf.update_weights(50.0, [0.0, 0.3], &observations, &square_map()),
            Err(FilterError::InvalidParameter(_))
        ));
        assert!(matches!(
            pf.update_weights(50.0, [0.3, 0.3], &observations, &LandmarkMap::default()),
            Err(FilterError::InvalidMap(_))
        ));
        assert!(pf.weights().iter().all(|&w| w == 1.0));
    }

    #[test]
    fn test_range_gating_restricts_candidates() {
        let mut pf = ParticleFilter::new(FilterConfig {
            num_particles: 1,
            range_gating: true,
            ..Default::default()
        })
        .unwrap();
        pf.init(0.0, 0.0, 0.0, [0.0; 3]).unwrap();
        let map = LandmarkMap::new(vec![Landmark::new(1, 3.0, 0.0), Landmark::new(2, 30.0, 0.0)]);
        let observations = [LandmarkObservation::new(0, 29.0, 0.0)];

        // Gated: landmark 2 is out of range, the observation falls back to landmark 1.
        pf.update_weights(5.0, [0.3, 0.3], &observations, &map).unwrap();
        assert_eq!(pf.particles()[0].associations(), &[1]);

        // Nothing in range: zero likelihood rather than an error.
        pf.init(100.0, 100.0, 0.0, [0.0; 3]).unwrap();
        pf.update_weights(5.0, [0.3, 0.3], &observations, &map).unwrap();
        assert_eq!(pf.weights()[0], 0.0);
        assert!(pf.particles()[0].associations().is_empty());

        assert!(pf.update_weights(0.0, [0.3, 0.3], &observations, &map).is_err());
    }

    #[test]
    fn test_resample_selects_only_positive_weight() {
        let mut pf = filter(4);
        pf.init(0.0, 0.0, 0.0, [0.0; 3]).unwrap();
        for trial in 0..10_000 {
            pf.init(0.0, 0.0, 0.0, [0.0; 3]).unwrap();
            pf.weights = vec![0.0, 0.0, 1.0, 0.0];
            pf.resample().unwrap();
            assert!(pf.particles().iter().all(|p| p.id == 2), "trial {trial}");
            assert_eq!(pf.particles().len(), 4);
        }
    }

    #[test]
    fn test_resample_degenerate_error_leaves_population() {
        let mut pf = filter(4);
        pf.init(0.0, 0.0, 0.0, [1.0, 1.0, 0.1]).unwrap();
        let before: Vec<Pose> = pf.particles().iter().map(|p| p.pose()).collect();
        pf.weights = vec![0.0; 4];
        assert!(matches!(
            pf.resample(),
            Err(FilterError::DegenerateWeights { .. })
        ));
        let after: Vec<Pose> = pf.particles().iter().map(|p| p.pose()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_resample_degenerate_uniform_fallback() {
        let mut pf = ParticleFilter::new(FilterConfig {
            num_particles: 4,
            degenerate_policy: DegenerateWeightPolicy::Uniform,
            resampling_strategy: ResamplingStrategy::Systematic,
            ..Default::default()
        })
        .unwrap();
        pf.init(0.0, 0.0, 0.0, [1.0, 1.0, 0.1]).unwrap();
        pf.weights = vec![0.0; 4];
        pf.resample().unwrap();
        let ids: Vec<i32> = pf.particles().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_resample_copies_are_independent() {
        let mut pf = filter(3);
        pf.init(0.0, 0.0, 0.0, [0.0; 3]).unwrap();
        pf.weights = vec![1.0, 0.0, 0.0];
        pf.resample().unwrap();
        pf.set_associations(0, vec![7], vec![1.0], vec![2.0]).unwrap();
        assert_eq!(pf.particles()[0].associations(), &[7]);
        assert!(pf.particles()[1].associations().is_empty());
    }

    #[test]
    fn test_association_accessors() {
        let mut pf = filter(2);
        pf.init(0.0, 0.0, 0.0, [0.0; 3]).unwrap();
        pf.set_associations(1, vec![4, 2], vec![0.5, 1.25], vec![-3.0, 8.0])
            .unwrap();
        let p = &pf.particles()[1];
        assert_eq!(ParticleFilter::<SeededRandom>::get_associations(p), "4 2");
        assert_eq!(
            ParticleFilter::<SeededRandom>::get_sense_coord(p, SenseAxis::X),
            "0.5 1.25"
        );
        assert_eq!(
            ParticleFilter::<SeededRandom>::get_sense_coord(p, SenseAxis::Y),
            "-3 8"
        );
        assert!(pf.set_associations(2, vec![], vec![], vec![]).is_err());
    }

    #[test]
    fn test_best_particle_and_ess() {
        let mut pf = filter(3);
        pf.init(0.0, 0.0, 0.0, [0.0; 3]).unwrap();
        assert_approx_eq!(pf.effective_sample_size(), 3.0, 1e-12);
        pf.particles[1].weight = 5.0;
        pf.weights = vec![1.0, 5.0, 1.0];
        assert_eq!(pf.best_particle().map(|p| p.id), Some(1));
        assert_approx_eq!(pf.effective_sample_size(), 49.0 / 27.0, 1e-12);
    }

    #[test]
    fn test_parallel_matches_population_invariants() {
        let mut pf = ParticleFilter::new(FilterConfig {
            num_particles: 300,
            parallel: true,
            parallel_chunk_size: 32,
            ..Default::default()
        })
        .unwrap();
        pf.init(0.0, 0.0, 0.0, [0.5, 0.5, 0.05]).unwrap();
        let map = square_map();
        for _ in 0..5 {
            pf.predict(0.1, [0.1, 0.1, 0.01], 1.0, 0.1).unwrap();
            assert_eq!(pf.particles().len(), 300);
            pf.update_weights(50.0, [0.3, 0.3], &[LandmarkObservation::new(0, 9.9, 0.0)], &map)
                .unwrap();
            assert_eq!(pf.weights().len(), 300);
            pf.resample().unwrap();
            assert_eq!(pf.particles().len(), 300);
        }
    }

    #[test]
    fn test_parallel_is_reproducible_for_fixed_seed() {
        let config = FilterConfig {
            num_particles: 128,
            parallel: true,
            parallel_chunk_size: 16,
            seed: 7,
            ..Default::default()
        };
        let run = || {
            let mut pf = ParticleFilter::new(config.clone()).unwrap();
            pf.init(1.0, 1.0, 0.0, [0.5, 0.5, 0.1]).unwrap();
            pf.predict(0.5, [0.2, 0.2, 0.02], 2.0, 0.3).unwrap();
            pf.particles().iter().map(|p| p.pose()).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }
}
