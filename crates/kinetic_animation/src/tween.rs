//! Time-based tweens

use crate::easing::Easing;

/// A fixed-duration interpolation from `from` to `to`
#[derive(Clone, Debug, PartialEq)]
pub struct Tween {
    from: f32,
    to: f32,
    duration: f32,
    easing: Easing,
    elapsed: f32,
}

impl Tween {
    /// `duration` is in seconds and must already be validated
    pub fn new(from: f32, to: f32, duration: f32, easing: Easing) -> Self {
        Self {
            from,
            to,
            duration,
            easing,
            elapsed: 0.0,
        }
    }

    pub fn from(&self) -> f32 {
        self.from
    }

    pub fn to(&self) -> f32 {
        self.to
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        }
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.duration
    }

    /// Advance by `dt` seconds, returning `(value, velocity)`.
    ///
    /// The velocity is the slope of the eased curve, so a spring that takes
    /// over mid-tween inherits the tween's motion.
    pub fn step(&mut self, dt: f32) -> (f32, f32) {
        self.elapsed += dt.max(0.0);
        if self.is_finished() {
            return (self.to, 0.0);
        }

        let progress = self.progress();
        let value = self.from + (self.to - self.from) * self.easing.apply(progress);
        let velocity = (self.to - self.from) * self.easing.slope(progress) / self.duration;
        (value, velocity)
    }
}
