//! Momentum decay
//!
//! After a fling the velocity decays exponentially:
//! `v(t) = v0 · power^(t / time_constant)`. Position is the closed-form
//! integral, so like springs a decay step is exact for any `dt`.

use kinetic_core::error::{ensure_finite, ensure_positive, ConfigurationError, Result};
use serde::{Deserialize, Serialize};

/// Exponential decay parameters
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Fraction of velocity remaining after `time_constant` seconds
    pub power: f32,
    /// Seconds
    pub time_constant: f32,
}

impl DecayConfig {
    pub fn new(power: f32, time_constant: f32) -> Result<Self> {
        let config = Self {
            power,
            time_constant,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive("time_constant", self.time_constant)?;
        ensure_positive("power", self.power)?;
        if self.power >= 1.0 {
            return Err(ConfigurationError::OutOfRange {
                name: "power",
                value: self.power,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(())
    }

    /// Decay rate λ with `v(t) = v0·e^(−λt)`
    pub fn rate(&self) -> f32 {
        -self.power.ln() / self.time_constant
    }

    /// Distance still to travel at `velocity` before coming to rest
    pub fn remaining_travel(&self, velocity: f32) -> f32 {
        velocity / self.rate()
    }

    /// Where a value moving at `velocity` comes to rest
    pub fn rest_point(&self, value: f32, velocity: f32) -> f32 {
        value + self.remaining_travel(velocity)
    }
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            power: 0.2,
            time_constant: 0.35,
        }
    }
}

/// Advance a decaying value by `dt`, returning `(value, velocity)`
pub fn solve(config: &DecayConfig, value: f32, velocity: f32, dt: f32) -> (f32, f32) {
    let rate = config.rate() as f64;
    let falloff = (-rate * dt as f64).exp();
    let v0 = velocity as f64;
    let travelled = v0 / rate * (1.0 - falloff);
    (value + travelled as f32, (v0 * falloff) as f32)
}

/// An interval with optionally open ends
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Option<f32>,
    pub max: Option<f32>,
}

impl Bounds {
    pub const UNBOUNDED: Bounds = Bounds {
        min: None,
        max: None,
    };

    pub fn new(min: Option<f32>, max: Option<f32>) -> Result<Self> {
        if let Some(min) = min {
            ensure_finite("min", min)?;
        }
        if let Some(max) = max {
            ensure_finite("max", max)?;
        }
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(ConfigurationError::InvertedBounds { min, max });
            }
        }
        Ok(Self { min, max })
    }

    pub fn between(min: f32, max: f32) -> Result<Self> {
        Self::new(Some(min), Some(max))
    }

    /// Pin to a single position (`min == max`)
    pub fn fixed(at: f32) -> Result<Self> {
        Self::new(Some(at), Some(at))
    }

    pub fn contains(&self, value: f32) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    /// Nearest position inside the interval
    pub fn clamp(&self, value: f32) -> f32 {
        let value = self.min.map_or(value, |min| value.max(min));
        self.max.map_or(value, |max| value.min(max))
    }

    /// The boundary `value` has crossed, if any
    pub fn crossed(&self, value: f32) -> Option<f32> {
        match (self.min, self.max) {
            (Some(min), _) if value < min => Some(min),
            (_, Some(max)) if value > max => Some(max),
            _ => None,
        }
    }
}
