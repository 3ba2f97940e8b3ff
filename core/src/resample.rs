//! Importance resampling: choosing the next generation of particles by weight.
//!
//! Every strategy here works on an unnormalized, non-negative weight vector and returns
//! source indices, one per slot of the new population. A zero-weight particle is never
//! selected.
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{FilterError, Result};
use crate::random::RandomSource;

/// How slots of the new population are filled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResamplingStrategy {
    /// Independent categorical draws with replacement.
    #[default]
    Multinomial,
    /// One uniform offset and evenly spaced pointers through the cumulative weights.
    Systematic,
    /// `floor(N * w)` deterministic copies, systematic draws for the remainder.
    Residual,
}

/// What to do when the weight vector carries no information (all zero or non-finite).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateWeightPolicy {
    /// Return [`FilterError::DegenerateWeights`] and leave the population untouched.
    #[default]
    Error,
    /// Resample as if every particle had equal weight.
    Uniform,
}

/// Sum of the weights, after checking they form a usable distribution.
pub fn weight_total(weights: &[f64]) -> Result<f64> {
    if let Some(bad) = weights.iter().find(|w| w.is_nan() || **w < 0.0) {
        return Err(FilterError::InvalidParameter(format!(
            "weights must be non-negative, found {bad}"
        )));
    }
    let total: f64 = weights.iter().sum();
    if total > 0.0 && total.is_finite() {
        Ok(total)
    } else {
        Err(FilterError::DegenerateWeights { total })
    }
}

impl ResamplingStrategy {
    /// Draw `count` source indices from `weights`.
    pub fn select<R: RandomSource + ?Sized>(
        &self,
        weights: &[f64],
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<usize>> {
        match self {
            ResamplingStrategy::Multinomial => multinomial_resample(weights, count, rng),
            ResamplingStrategy::Systematic => systematic_resample(weights, count, rng),
            ResamplingStrategy::Residual => residual_resample(weights, count, rng),
        }
    }
}

/// Apply `strategy`, handling a degenerate weight vector according to `policy`.
pub fn resample_indices<R: RandomSource + ?Sized>(
    strategy: ResamplingStrategy,
    policy: DegenerateWeightPolicy,
    weights: &[f64],
    rng: &mut R,
) -> Result<Vec<usize>> {
    match weight_total(weights) {
        Ok(_) => strategy.select(weights, weights.len(), rng),
        Err(FilterError::DegenerateWeights { total }) if !weights.is_empty() => match policy {
            DegenerateWeightPolicy::Error => Err(FilterError::DegenerateWeights { total }),
            DegenerateWeightPolicy::Uniform => {
                warn!(
                    "Degenerate weights (total {total:e}) across {} particles, resampling uniformly",
                    weights.len()
                );
                let uniform = vec![1.0; weights.len()];
                strategy.select(&uniform, weights.len(), rng)
            }
        },
        Err(e) => Err(e),
    }
}

pub fn multinomial_resample<R: RandomSource + ?Sized>(
    weights: &[f64],
    count: usize,
    rng: &mut R,
) -> Result<Vec<usize>> {
    weight_total(weights)?;
    rng.weighted_indices(weights, count)
}

pub fn systematic_resample<R: RandomSource + ?Sized>(
    weights: &[f64],
    count: usize,
    rng: &mut R,
) -> Result<Vec<usize>> {
    let total = weight_total(weights)?;
    let mut indices = Vec::with_capacity(count);
    if count == 0 {
        return Ok(indices);
    }
    // Rounding in the running sum can leave the last pointer past a trailing zero weight.
    let last_positive = weights.iter().rposition(|&w| w > 0.0).unwrap_or(0);
    let step = total / count as f64;
    let offset = rng.uniform() * step;
    let mut i = 0;
    let mut cumsum = weights[0];
    for j in 0..count {
        let pointer = offset + j as f64 * step;
        while pointer >= cumsum && i + 1 < weights.len() {
            i += 1;
            cumsum += weights[i];
        }
        indices.push(if weights[i] > 0.0 { i } else { last_positive });
    }
    Ok(indices)
}

pub fn residual_resample<R: RandomSource + ?Sized>(
    weights: &[f64],
    count: usize,
    rng: &mut R,
) -> Result<Vec<usize>> {
    let total = weight_total(weights)?;
    let n = count as f64;
    let mut indices = Vec::with_capacity(count);
    let mut residual = vec![0.0; weights.len()];
    for (i, &w) in weights.iter().enumerate() {
        let scaled = w / total * n;
        let copies = scaled.floor() as usize;
        residual[i] = scaled - copies as f64;
        for _ in 0..copies {
            if indices.len() < count {
                indices.push(i);
            }
        }
    }
    let remaining = count - indices.len();
    if remaining > 0 {
        let extra = match systematic_resample(&residual, remaining, rng) {
            Ok(extra) => extra,
            Err(FilterError::DegenerateWeights { .. }) => {
                systematic_resample(weights, remaining, rng)?
            }
            Err(e) => return Err(e),
        };
        indices.extend(extra);
    }
    Ok(indices)
}
