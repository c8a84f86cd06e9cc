//! Easing curves for tweens
//!
//! The named curves follow the CSS definitions, so `EaseInOut` is exactly
//! `cubic-bezier(0.42, 0, 0.58, 1)`.

use kinetic_core::error::{ensure_finite, ensure_within, Result};
use serde::{Deserialize, Serialize};

/// Easing function type
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
    CubicBezier(f32, f32, f32, f32),
}

impl Easing {
    /// Apply the easing function to a progress value (0.0 to 1.0)
    pub fn apply(&self, t: f32) -> f32 {
        match *self {
            Easing::Linear => t.clamp(0.0, 1.0),
            Easing::EaseIn => cubic_bezier_ease(t, 0.42, 0.0, 1.0, 1.0),
            Easing::EaseOut => cubic_bezier_ease(t, 0.0, 0.0, 0.58, 1.0),
            Easing::EaseInOut => cubic_bezier_ease(t, 0.42, 0.0, 0.58, 1.0),
            Easing::CubicBezier(x1, y1, x2, y2) => cubic_bezier_ease(t, x1, y1, x2, y2),
        }
    }

    /// d(eased)/d(progress) at `t`, by central difference
    pub fn slope(&self, t: f32) -> f32 {
        const H: f32 = 1e-3;
        let lo = (t - H).max(0.0);
        let hi = (t + H).min(1.0);
        if hi <= lo {
            return 0.0;
        }
        (self.apply(hi) - self.apply(lo)) / (hi - lo)
    }

    /// Reject bezier curves whose x control points leave `[0, 1]`; such a
    /// curve is not a function of time.
    pub fn validate(&self) -> Result<()> {
        if let Easing::CubicBezier(x1, y1, x2, y2) = *self {
            ensure_within("cubic-bezier x1", x1, 0.0, 1.0)?;
            ensure_within("cubic-bezier x2", x2, 0.0, 1.0)?;
            ensure_finite("cubic-bezier y1", y1)?;
            ensure_finite("cubic-bezier y2", y2)?;
        }
        Ok(())
    }
}

/// Cubic bezier easing (matches CSS / browser implementations).
///
/// Newton-Raphson with a bisection fallback, evaluated in f64.
fn cubic_bezier_ease(t: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> f32 {
    if t <= 0.0 {
        return 0.0;
    }
    if t >= 1.0 {
        return 1.0;
    }

    let x = t as f64;
    let (x1, y1, x2, y2) = (x1 as f64, y1 as f64, x2 as f64, y2 as f64);

    let mut p = x;
    for _ in 0..8 {
        let err = bezier_sample(p, x1, x2) - x;
        if err.abs() < 1e-7 {
            return bezier_sample(p, y1, y2) as f32;
        }
        let slope = bezier_slope(p, x1, x2);
        if slope.abs() < 1e-7 {
            break;
        }
        p -= err / slope;
    }

    let mut lo = 0.0_f64;
    let mut hi = 1.0_f64;
    p = x;
    for _ in 0..32 {
        let val = bezier_sample(p, x1, x2);
        if (val - x).abs() < 1e-7 {
            break;
        }
        if val < x {
            lo = p;
        } else {
            hi = p;
        }
        p = (lo + hi) * 0.5;
    }

    bezier_sample(p, y1, y2) as f32
}

/// B(t) = 3(1-t)²t·p1 + 3(1-t)t²·p2 + t³, in Horner form
#[inline]
fn bezier_sample(t: f64, p1: f64, p2: f64) -> f64 {
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    ((a * t + b) * t + c) * t
}

#[inline]
fn bezier_slope(t: f64, p1: f64, p2: f64) -> f64 {
    let a = 1.0 - 3.0 * p2 + 3.0 * p1;
    let b = 3.0 * p2 - 6.0 * p1;
    let c = 3.0 * p1;
    (3.0 * a * t + 2.0 * b) * t + c
}
