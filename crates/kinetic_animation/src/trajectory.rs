//! Trajectories: the per-channel time-evolution rules
//!
//! A [`TransitionSpec`] is the declarative description handed in by callers.
//! It is validated once and turned into one [`Trajectory`] per channel, which
//! is then stepped every frame until it settles.

use crate::decay::{self, Bounds, DecayConfig};
use crate::easing::Easing;
use crate::spring::{self, SpringConfig};
use crate::tween::Tween;
use kinetic_core::error::{ensure_non_negative, ensure_positive, Result};
use serde::{Deserialize, Serialize};

/// Rest thresholds for settling
///
/// The defaults are for a travel span of up to 100 units; [`Tolerance::scaled`]
/// grows them proportionally for longer moves.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerance {
    /// Maximum distance from the target
    pub rest_delta: f32,
    /// Maximum speed, units per second
    pub rest_speed: f32,
}

impl Tolerance {
    pub fn new(rest_delta: f32, rest_speed: f32) -> Result<Self> {
        ensure_positive("rest_delta", rest_delta)?;
        ensure_positive("rest_speed", rest_speed)?;
        Ok(Self {
            rest_delta,
            rest_speed,
        })
    }

    pub fn scaled(&self, span: f32) -> Tolerance {
        let scale = if span.is_finite() {
            (span.abs() / 100.0).max(1.0)
        } else {
            1.0
        };
        Tolerance {
            rest_delta: self.rest_delta * scale,
            rest_speed: self.rest_speed * scale,
        }
    }

    pub fn is_at_rest(&self, distance: f32, velocity: f32) -> bool {
        distance.abs() < self.rest_delta && velocity.abs() < self.rest_speed
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            rest_delta: 0.01,
            rest_speed: 0.1,
        }
    }
}

/// How a value travels to a new target
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionSpec {
    /// Perceptual spring: settles in about `visual_duration` seconds
    Spring { visual_duration: f32, bounce: f32 },
    /// Spring from raw physical parameters
    Physics {
        stiffness: f32,
        damping: f32,
        #[serde(default = "default_mass")]
        mass: f32,
    },
    /// Fixed-duration eased interpolation
    Tween {
        duration: f32,
        #[serde(default)]
        easing: Easing,
    },
}

fn default_mass() -> f32 {
    1.0
}

impl TransitionSpec {
    pub fn spring(visual_duration: f32, bounce: f32) -> Self {
        TransitionSpec::Spring {
            visual_duration,
            bounce,
        }
    }

    pub fn physics(stiffness: f32, damping: f32, mass: f32) -> Self {
        TransitionSpec::Physics {
            stiffness,
            damping,
            mass,
        }
    }

    pub fn tween(duration: f32, easing: Easing) -> Self {
        TransitionSpec::Tween { duration, easing }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            TransitionSpec::Tween { duration, easing } => {
                ensure_non_negative("duration", duration)?;
                easing.validate()
            }
            _ => self.spring_config().map(|_| ()),
        }
    }

    /// Physical parameters of a spring spec; tweens fall back to the default
    /// spring so that a tween spec can still drive a spring handoff.
    pub fn spring_config(&self) -> Result<SpringConfig> {
        match *self {
            TransitionSpec::Spring {
                visual_duration,
                bounce,
            } => SpringConfig::from_visual(visual_duration, bounce),
            TransitionSpec::Physics {
                stiffness,
                damping,
                mass,
            } => SpringConfig::new(stiffness, damping, mass),
            TransitionSpec::Tween { .. } => Ok(SpringConfig::default()),
        }
    }

    /// Build the trajectory moving one channel from `from` to `to`
    pub fn trajectory(&self, from: f32, to: f32, tolerance: Tolerance) -> Result<Trajectory> {
        self.validate()?;
        let trajectory = match *self {
            TransitionSpec::Tween { duration, easing } => {
                Trajectory::Tween(Tween::new(from, to, duration, easing))
            }
            _ => Trajectory::Spring {
                config: self.spring_config()?,
                target: to,
                tolerance: tolerance.scaled(to - from),
            },
        };
        Ok(trajectory)
    }
}

impl Default for TransitionSpec {
    fn default() -> Self {
        TransitionSpec::spring(0.3, 0.15)
    }
}

/// Result of advancing one channel
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Step {
    pub value: f32,
    pub velocity: f32,
    pub settled: bool,
}

/// The active time-evolution rule of one channel
#[derive(Clone, Debug, PartialEq)]
pub enum Trajectory {
    Spring {
        config: SpringConfig,
        target: f32,
        tolerance: Tolerance,
    },
    Tween(Tween),
    /// Momentum; hands off to `bounce` the first time it leaves `bounds`,
    /// or stops dead on the boundary without one
    Decay {
        config: DecayConfig,
        bounds: Bounds,
        bounce: Option<SpringConfig>,
        tolerance: Tolerance,
    },
}

impl Trajectory {
    pub fn spring(config: SpringConfig, target: f32, tolerance: Tolerance) -> Self {
        Trajectory::Spring {
            config,
            target,
            tolerance,
        }
    }

    /// Momentum from `value` at `velocity`, constrained to `bounds`.
    ///
    /// A value already outside its bounds skips the decay and returns straight
    /// to the nearest boundary.
    pub fn decay(
        config: DecayConfig,
        bounds: Bounds,
        bounce: Option<SpringConfig>,
        value: f32,
        velocity: f32,
        tolerance: Tolerance,
    ) -> Self {
        if let Some(boundary) = bounds.crossed(value) {
            return match bounce {
                Some(bounce) => {
                    Trajectory::spring(bounce, boundary, tolerance.scaled(boundary - value))
                }
                None => Trajectory::Tween(Tween::new(value, boundary, 0.0, Easing::Linear)),
            };
        }
        Trajectory::Decay {
            config,
            bounds,
            bounce,
            tolerance: tolerance.scaled(config.remaining_travel(velocity)),
        }
    }

    /// Where the channel is heading from `value` at `velocity`
    pub fn target(&self, value: f32, velocity: f32) -> f32 {
        match self {
            Trajectory::Spring { target, .. } => *target,
            Trajectory::Tween(tween) => tween.to(),
            Trajectory::Decay { config, bounds, .. } => {
                bounds.clamp(config.rest_point(value, velocity))
            }
        }
    }

    /// Advance by `dt` seconds from `(value, velocity)`.
    ///
    /// Settled steps report the exact resting value and zero velocity.
    pub fn step(&mut self, value: f32, velocity: f32, dt: f32) -> Step {
        match self {
            Trajectory::Spring {
                config,
                target,
                tolerance,
            } => {
                let (displacement, velocity) = spring::solve(config, value - *target, velocity, dt);
                if tolerance.is_at_rest(displacement, velocity) {
                    Step {
                        value: *target,
                        velocity: 0.0,
                        settled: true,
                    }
                } else {
                    Step {
                        value: *target + displacement,
                        velocity,
                        settled: false,
                    }
                }
            }
            Trajectory::Tween(tween) => {
                let (value, velocity) = tween.step(dt);
                Step {
                    value,
                    velocity,
                    settled: tween.is_finished(),
                }
            }
            Trajectory::Decay {
                config,
                bounds,
                bounce,
                tolerance,
            } => {
                let (next, next_velocity) = decay::solve(config, value, velocity, dt);

                if let Some(boundary) = bounds.crossed(next) {
                    tracing::trace!(boundary, velocity = next_velocity, "decay crossed boundary");
                    let Some(bounce) = *bounce else {
                        return Step {
                            value: boundary,
                            velocity: 0.0,
                            settled: true,
                        };
                    };
                    let tolerance = tolerance.scaled(boundary - next);
                    *self = Trajectory::spring(bounce, boundary, tolerance);
                    return Step {
                        value: next,
                        velocity: next_velocity,
                        settled: false,
                    };
                }

                if config.remaining_travel(next_velocity).abs() < tolerance.rest_delta {
                    Step {
                        value: bounds.clamp(config.rest_point(next, next_velocity)),
                        velocity: 0.0,
                        settled: true,
                    }
                } else {
                    Step {
                        value: next,
                        velocity: next_velocity,
                        settled: false,
                    }
                }
            }
        }
    }
}
