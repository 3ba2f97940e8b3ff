//! Error types for the localization filter and its simulation harness.

use thiserror::Error;

/// Failure modes of the filter cycle.
///
/// Every variant is a deterministic function of the inputs; retrying the same call
/// with the same arguments fails the same way. Filter state is left untouched when
/// any of these is returned.
#[derive(Error, Debug)]
pub enum FilterError {
    /// A standard deviation, time step, control or configuration value is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The landmark map cannot be used for association (e.g. it is empty).
    #[error("invalid map: {0}")]
    InvalidMap(String),

    /// Every particle was assigned zero (or non-finite) likelihood.
    #[error("degenerate weights: total weight {total:e} leaves nothing to resample from")]
    DegenerateWeights { total: f64 },

    /// A cycle phase was invoked before `init` populated the particles.
    #[error("particle filter used before initialization")]
    Uninitialized,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, FilterError>;

/// Check that a standard deviation is finite and non-negative.
pub(crate) fn ensure_non_negative_std(value: f64, name: &str) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(FilterError::InvalidParameter(format!(
            "{name} must be a finite non-negative standard deviation, got {value}"
        )))
    }
}

/// Check that a value is finite and strictly positive.
pub(crate) fn ensure_positive(value: f64, name: &str) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(FilterError::InvalidParameter(format!(
            "{name} must be finite and strictly positive, got {value}"
        )))
    }
}

pub(crate) fn ensure_finite(value: f64, name: &str) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(FilterError::InvalidParameter(format!(
            "{name} must be finite, got {value}"
        )))
    }
}
