//! Filter configuration.
use serde::{Deserialize, Serialize};

use crate::error::{FilterError, Result};
use crate::resample::{DegenerateWeightPolicy, ResamplingStrategy};

/// Particle filter configuration parameters.
///
/// Every field has a default, so a configuration file only needs to name what it changes.
///
/// ```
/// use mcl::config::FilterConfig;
/// use mcl::resample::ResamplingStrategy;
///
/// let config = FilterConfig {
///     num_particles: 250,
///     resampling_strategy: ResamplingStrategy::Systematic,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Population size, constant for the lifetime of the filter.
    pub num_particles: usize,
    pub resampling_strategy: ResamplingStrategy,
    pub degenerate_policy: DegenerateWeightPolicy,
    /// Restrict association to landmarks within `sensor_range` of each particle.
    pub range_gating: bool,
    /// Record matched landmark ids and positions on each particle during the update.
    pub record_associations: bool,
    /// Run prediction and weighting across the rayon thread pool.
    pub parallel: bool,
    /// Particles per parallel prediction task; each task gets its own random stream.
    pub parallel_chunk_size: usize,
    /// Seed for the filter's random source.
    pub seed: u64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            num_particles: 100,
            resampling_strategy: ResamplingStrategy::Multinomial,
            degenerate_policy: DegenerateWeightPolicy::Error,
            range_gating: false,
            record_associations: true,
            parallel: false,
            parallel_chunk_size: 64,
            seed: 42,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_particles == 0 {
            return Err(FilterError::Config(
                "num_particles must be at least 1".to_string(),
            ));
        }
        if self.parallel_chunk_size == 0 {
            return Err(FilterError::Config(
                "parallel_chunk_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = FilterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.num_particles, 100);
        assert_eq!(config.resampling_strategy, ResamplingStrategy::Multinomial);
        assert_eq!(config.degenerate_policy, DegenerateWeightPolicy::Error);
        assert!(!config.range_gating);
    }

    #[test]
    fn test_zero_particles_rejected() {
        let config = FilterConfig {
            num_particles: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(FilterError::Config(_))));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: FilterConfig = toml::from_str(
            "num_particles = 500\nresampling_strategy = \"residual\"\ndegenerate_policy = \"uniform\"\n",
        )
        .unwrap();
        assert_eq!(config.num_particles, 500);
        assert_eq!(config.resampling_strategy, ResamplingStrategy::Residual);
        assert_eq!(config.degenerate_policy, DegenerateWeightPolicy::Uniform);
        assert_eq!(config.seed, 42);
        assert!(config.record_associations);
    }

    #[test]
    fn test_json_round_trip() {
        let config = FilterConfig {
            parallel: true,
            range_gating: true,
            ..Default::default()
        };
        let text = serde_json::to_string(&config).unwrap();
        let back: FilterConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
