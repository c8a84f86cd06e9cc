//! Configuration error types
//!
//! Trajectory and mapping parameters are validated at the call that defines
//! them. Out-of-domain values are rejected, never clamped.

use thiserror::Error;

/// A trajectory, mapping or gesture parameter is non-finite or out of domain
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Parameter is NaN or infinite
    #[error("{name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f32 },

    /// Parameter must be strictly positive
    #[error("{name} must be greater than zero, got {value}")]
    NotPositive { name: &'static str, value: f32 },

    /// Parameter must be zero or positive
    #[error("{name} must not be negative, got {value}")]
    Negative { name: &'static str, value: f32 },

    /// Parameter outside a closed interval
    #[error("{name} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    /// Spring bounce of one or more never settles
    #[error("bounce must be in [0, 1), got {0}")]
    Bounce(f32),

    /// Range map breakpoint lists are empty or mismatched
    #[error("range map needs matching non-empty breakpoints, got {inputs} inputs and {outputs} outputs")]
    MappingShape { inputs: usize, outputs: usize },

    /// Range map input breakpoints are not strictly increasing
    #[error("range map input breakpoints must be strictly increasing")]
    MappingOrder,

    /// Range map outputs mix scalar and color values
    #[error("range map outputs must all be the same kind")]
    MappingKind,

    /// Constraint interval with `min > max`
    #[error("constraint minimum {min} is greater than maximum {max}")]
    InvertedBounds { min: f32, max: f32 },
}

/// Result type for parameter validation
pub type Result<T> = std::result::Result<T, ConfigurationError>;

pub fn ensure_finite(name: &'static str, value: f32) -> Result<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConfigurationError::NonFinite { name, value })
    }
}

pub fn ensure_positive(name: &'static str, value: f32) -> Result<f32> {
    ensure_finite(name, value)?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigurationError::NotPositive { name, value })
    }
}

pub fn ensure_non_negative(name: &'static str, value: f32) -> Result<f32> {
    ensure_finite(name, value)?;
    if value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigurationError::Negative { name, value })
    }
}

pub fn ensure_within(name: &'static str, value: f32, min: f32, max: f32) -> Result<f32> {
    ensure_finite(name, value)?;
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigurationError::OutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}
