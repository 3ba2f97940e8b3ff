//! Injected randomness for the stochastic filter phases.
//!
//! The filter never reaches for a global generator. It owns a [`RandomSource`] and hands
//! independent child streams (see [`RandomSource::split`]) to parallel workers, so a fixed
//! seed reproduces a run exactly.

use rand::distr::weighted::{Error as WeightedError, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::error::{FilterError, Result, ensure_finite, ensure_non_negative_std};

/// Source of the samples every stochastic step routes through.
pub trait RandomSource {
    /// Draw from `Normal(mean, std_dev)`. A zero standard deviation returns `mean`.
    fn gaussian(&mut self, mean: f64, std_dev: f64) -> Result<f64>;

    /// Draw uniformly from `[0, 1)`.
    fn uniform(&mut self) -> f64;

    /// Draw one index with probability proportional to `weights[i]`.
    fn weighted_index(&mut self, weights: &[f64]) -> Result<usize>;

    /// Draw `count` independent indices from the categorical distribution over `weights`.
    fn weighted_indices(&mut self, weights: &[f64], count: usize) -> Result<Vec<usize>> {
        (0..count).map(|_| self.weighted_index(weights)).collect()
    }

    /// Derive an independent source for a worker thread, advancing `self`.
    fn split(&mut self) -> Self
    where
        Self: Sized;
}

/// [`StdRng`]-backed random source.
#[derive(Clone, Debug)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    /// Create a source with a specific seed; useful for reproducible tests.
    pub fn new(seed: u64) -> Self {
        SeededRandom {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for SeededRandom {
    fn default() -> Self {
        Self::new(rand::random())
    }
}

fn categorical(weights: &[f64]) -> Result<WeightedIndex<f64>> {
    let total: f64 = weights.iter().sum();
    if weights.is_empty() || !(total > 0.0) || !total.is_finite() {
        return Err(FilterError::DegenerateWeights { total });
    }
    WeightedIndex::new(weights).map_err(|e| match e {
        WeightedError::InsufficientNonZero => FilterError::DegenerateWeights { total },
        other => FilterError::InvalidParameter(format!("invalid weight vector: {other}")),
    })
}

impl RandomSource for SeededRandom {
    fn gaussian(&mut self, mean: f64, std_dev: f64) -> Result<f64> {
        ensure_finite(mean, "mean")?;
        ensure_non_negative_std(std_dev, "std_dev")?;
        if std_dev == 0.0 {
            return Ok(mean);
        }
        let normal = Normal::new(mean, std_dev)
            .map_err(|e| FilterError::InvalidParameter(format!("normal distribution: {e}")))?;
        Ok(normal.sample(&mut self.rng))
    }

    fn uniform(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    fn weighted_index(&mut self, weights: &[f64]) -> Result<usize> {
        Ok(categorical(weights)?.sample(&mut self.rng))
    }

    fn weighted_indices(&mut self, weights: &[f64], count: usize) -> Result<Vec<usize>> {
        let dist = categorical(weights)?;
        Ok((0..count).map(|_| dist.sample(&mut self.rng)).collect())
    }

    fn split(&mut self) -> Self {
        SeededRandom::new(self.rng.next_u64())
    }
}
