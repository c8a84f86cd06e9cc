//! Animatable values
//!
//! A [`Value`] is either a scalar or a composite made of independent scalar
//! channels. Trajectories always run per channel, so composites are flattened
//! into [`Channels`] before animating and rebuilt afterwards.

use crate::color::Color;
use crate::geometry::Point;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Flattened channel storage; no value kind has more than four channels
pub type Channels = SmallVec<[f32; 4]>;

/// The shape of a value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Scalar,
    Point,
    Color,
}

impl ValueKind {
    pub fn channel_count(self) -> usize {
        match self {
            ValueKind::Scalar => 1,
            ValueKind::Point => 2,
            ValueKind::Color => 4,
        }
    }
}

/// A scalar or composite animatable value
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Scalar(f32),
    Point(Point),
    Color(Color),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Scalar(_) => ValueKind::Scalar,
            Value::Point(_) => ValueKind::Point,
            Value::Color(_) => ValueKind::Color,
        }
    }

    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            Value::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_point(&self) -> Option<Point> {
        match self {
            Value::Point(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            Value::Color(c) => Some(*c),
            _ => None,
        }
    }

    pub fn channels(&self) -> Channels {
        match self {
            Value::Scalar(v) => smallvec::smallvec![*v],
            Value::Point(p) => smallvec::smallvec![p.x, p.y],
            Value::Color(c) => SmallVec::from_slice(&c.to_array()),
        }
    }

    /// Rebuild a value of `kind` from its channels.
    ///
    /// Missing channels read as zero; surplus channels are ignored.
    pub fn from_channels(kind: ValueKind, channels: &[f32]) -> Value {
        let at = |i: usize| channels.get(i).copied().unwrap_or(0.0);
        match kind {
            ValueKind::Scalar => Value::Scalar(at(0)),
            ValueKind::Point => Value::Point(Point::new(at(0), at(1))),
            ValueKind::Color => Value::Color(Color::rgba(at(0), at(1), at(2), at(3))),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.channels().iter().all(|c| c.is_finite())
    }

    /// Largest absolute per-channel difference
    pub fn distance(&self, other: &Value) -> f32 {
        self.channels()
            .iter()
            .zip(other.channels().iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f32::max)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Scalar(0.0)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Scalar(v)
    }
}

impl From<Point> for Value {
    fn from(p: Point) -> Self {
        Value::Point(p)
    }
}

impl From<Color> for Value {
    fn from(c: Color) -> Self {
        Value::Color(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_round_trip_per_kind() {
        let values = [
            Value::Scalar(3.5),
            Value::Point(Point::new(1.0, -2.0)),
            Value::Color(Color::rgba(0.1, 0.2, 0.3, 0.4)),
        ];
        for value in values {
            let channels = value.channels();
            assert_eq!(channels.len(), value.kind().channel_count());
            assert_eq!(Value::from_channels(value.kind(), &channels), value);
        }
    }

    #[test]
    fn test_distance_is_max_channel_delta() {
        let a = Value::Point(Point::new(0.0, 0.0));
        let b = Value::Point(Point::new(3.0, -7.0));
        assert_eq!(a.distance(&b), 7.0);
    }

    #[test]
    fn test_non_finite_detection() {
        assert!(Value::Scalar(1.0).is_finite());
        assert!(!Value::Scalar(f32::NAN).is_finite());
        assert!(!Value::Point(Point::new(0.0, f32::INFINITY)).is_finite());
    }
}
