//! Release velocity estimation

use kinetic_core::{Point, Vec2};
use std::collections::VecDeque;

/// Samples kept even when the window would allow more
const MAX_SAMPLES: usize = 32;

/// Bounded buffer of recent `(timestamp, position)` samples
#[derive(Clone, Debug)]
pub struct VelocityTracker {
    samples: VecDeque<(f64, Point)>,
    /// Seconds
    window: f64,
}

impl VelocityTracker {
    pub fn new(window_secs: f64) -> Self {
        Self {
            samples: VecDeque::with_capacity(MAX_SAMPLES),
            window: window_secs,
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Record a sample; timestamps are in seconds.
    ///
    /// A timestamp older than the newest sample restarts tracking.
    pub fn push(&mut self, timestamp: f64, position: Point) {
        if let Some(&(last, _)) = self.samples.back() {
            if timestamp < last {
                self.samples.clear();
            }
        }
        self.samples.push_back((timestamp, position));
        self.prune(timestamp);
        while self.samples.len() > MAX_SAMPLES {
            self.samples.pop_front();
        }
    }

    /// Velocity in units per second, over the window ending at `now`.
    ///
    /// The slope between the oldest and newest sample still inside the
    /// window; a pause before release leaves fewer than two samples and
    /// reads as zero.
    pub fn velocity(&mut self, now: f64) -> Vec2 {
        self.prune(now);
        let (Some(&(t0, p0)), Some(&(t1, p1))) = (self.samples.front(), self.samples.back())
        else {
            return Vec2::ZERO;
        };
        let elapsed = t1 - t0;
        if self.samples.len() < 2 || elapsed <= 0.0 {
            return Vec2::ZERO;
        }
        let delta = p1 - p0;
        Vec2::new(
            (delta.x as f64 / elapsed) as f32,
            (delta.y as f64 / elapsed) as f32,
        )
    }

    fn prune(&mut self, now: f64) {
        let cutoff = now - self.window;
        while let Some(&(t, _)) = self.samples.front() {
            if t < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }
}
