//! Spring physics
//!
//! Springs are integrated with the closed-form solution of
//! `m·a = −k·(x − target) − c·v`, so a single step of any length is exact.
//! A host that was backgrounded for ten seconds and resumes with `dt = 10.0`
//! lands exactly where the spring would have been.

use crate::trajectory::Tolerance;
use kinetic_core::error::{
    ensure_finite, ensure_non_negative, ensure_positive, ConfigurationError, Result,
};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Physical spring parameters
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpringConfig {
    pub stiffness: f32,
    pub damping: f32,
    pub mass: f32,
}

impl SpringConfig {
    /// Validated physical parameters
    pub fn new(stiffness: f32, damping: f32, mass: f32) -> Result<Self> {
        let config = Self {
            stiffness,
            damping,
            mass,
        };
        config.validate()?;
        Ok(config)
    }

    /// Derive physical parameters from a perceptual `(visual_duration, bounce)`
    /// pair.
    ///
    /// With `mass = 1` the undamped frequency is `2π / (1.2·visual_duration)`,
    /// which puts the 98% settle point of a critically damped spring at about
    /// `visual_duration` seconds. `damping = 2·√(k·m)·(1 − bounce)`.
    pub fn from_visual(visual_duration: f32, bounce: f32) -> Result<Self> {
        ensure_positive("visual_duration", visual_duration)?;
        ensure_finite("bounce", bounce)?;
        if !(0.0..1.0).contains(&bounce) {
            return Err(ConfigurationError::Bounce(bounce));
        }

        let root = 2.0 * PI / (1.2 * visual_duration as f64);
        let stiffness = root * root;
        let mass = 1.0;
        let damping = 2.0 * (stiffness * mass).sqrt() * (1.0 - bounce as f64);

        Self::new(stiffness as f32, damping as f32, mass as f32)
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive("stiffness", self.stiffness)?;
        ensure_positive("mass", self.mass)?;
        ensure_non_negative("damping", self.damping)?;
        Ok(())
    }

    /// Quick response, little overshoot
    pub fn stiff() -> Self {
        Self {
            stiffness: 400.0,
            damping: 30.0,
            mass: 1.0,
        }
    }

    /// Fast and slightly springy
    pub fn snappy() -> Self {
        Self {
            stiffness: 300.0,
            damping: 20.0,
            mass: 1.0,
        }
    }

    /// Slow, soft approach
    pub fn gentle() -> Self {
        Self {
            stiffness: 120.0,
            damping: 14.0,
            mass: 1.0,
        }
    }

    /// Visible oscillation
    pub fn wobbly() -> Self {
        Self {
            stiffness: 180.0,
            damping: 12.0,
            mass: 1.0,
        }
    }

    /// `ζ = c / (2·√(k·m))`; below one the spring oscillates
    pub fn damping_ratio(&self) -> f32 {
        self.damping / (2.0 * (self.stiffness * self.mass).sqrt())
    }

    /// Undamped angular frequency `√(k/m)`
    pub fn natural_frequency(&self) -> f32 {
        (self.stiffness / self.mass).sqrt()
    }
}

impl Default for SpringConfig {
    fn default() -> Self {
        Self {
            stiffness: 170.0,
            damping: 26.0,
            mass: 1.0,
        }
    }
}

/// Advance a spring by `dt` seconds.
///
/// Takes the displacement from the target and the current velocity, returns
/// both after `dt`.
pub fn solve(config: &SpringConfig, displacement: f32, velocity: f32, dt: f32) -> (f32, f32) {
    let k = config.stiffness as f64;
    let c = config.damping as f64;
    let m = config.mass as f64;
    let x0 = displacement as f64;
    let v0 = velocity as f64;
    let t = dt as f64;

    let omega = (k / m).sqrt();
    let zeta = c / (2.0 * (k * m).sqrt());

    let (x, v) = if (zeta - 1.0).abs() < 1e-6 {
        // Critically damped
        let b = v0 + omega * x0;
        let e = (-omega * t).exp();
        let x = e * (x0 + b * t);
        (x, e * b - omega * x)
    } else if zeta < 1.0 {
        // Underdamped
        let alpha = zeta * omega;
        let omega_d = omega * (1.0 - zeta * zeta).sqrt();
        let b = (v0 + alpha * x0) / omega_d;
        let e = (-alpha * t).exp();
        let (sin, cos) = (omega_d * t).sin_cos();
        let x = e * (x0 * cos + b * sin);
        let v = e * (v0 * cos - (alpha * b + x0 * omega_d) * sin);
        (x, v)
    } else {
        // Overdamped
        let root = (zeta * zeta - 1.0).sqrt();
        let r1 = -omega * (zeta - root);
        let r2 = -omega * (zeta + root);
        let c2 = (v0 - r1 * x0) / (r2 - r1);
        let c1 = x0 - c2;
        let e1 = (r1 * t).exp();
        let e2 = (r2 * t).exp();
        (c1 * e1 + c2 * e2, r1 * c1 * e1 + r2 * c2 * e2)
    };

    (x as f32, v as f32)
}

/// A standalone spring animator for a single scalar
///
/// Retargeting keeps the current value and velocity, so an interrupted
/// spring continues smoothly toward its new target.
#[derive(Clone, Debug)]
pub struct Spring {
    config: SpringConfig,
    value: f32,
    velocity: f32,
    target: f32,
    tolerance: Tolerance,
    settled: bool,
}

impl Spring {
    pub fn new(config: SpringConfig, initial: f32) -> Self {
        Self {
            config,
            value: initial,
            velocity: 0.0,
            target: initial,
            tolerance: Tolerance::default(),
            settled: true,
        }
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn config(&self) -> &SpringConfig {
        &self.config
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    pub fn set_target(&mut self, target: f32) {
        if target != self.target || !self.is_at_rest(target) {
            self.target = target;
            self.settled = false;
        }
    }

    /// Replace the velocity, e.g. with a gesture's release velocity
    pub fn set_velocity(&mut self, velocity: f32) {
        self.velocity = velocity;
        self.settled = self.is_at_rest(self.target);
    }

    pub fn set_config(&mut self, config: SpringConfig) {
        self.config = config;
    }

    /// Advance by `dt` seconds; returns `true` once settled
    pub fn step(&mut self, dt: f32) -> bool {
        if self.settled || dt <= 0.0 {
            return self.settled;
        }

        let (displacement, velocity) =
            solve(&self.config, self.value - self.target, self.velocity, dt);
        self.value = self.target + displacement;
        self.velocity = velocity;

        if self.is_at_rest(self.target) {
            self.value = self.target;
            self.velocity = 0.0;
            self.settled = true;
        }
        self.settled
    }

    fn is_at_rest(&self, target: f32) -> bool {
        (self.value - target).abs() < self.tolerance.rest_delta
            && self.velocity.abs() < self.tolerance.rest_speed
    }
}
