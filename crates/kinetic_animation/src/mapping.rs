//! Piecewise-linear range mapping
//!
//! A [`RangeMap`] maps a scalar input onto an output value, e.g. a drag
//! offset of `[-150, 0, 150]` onto a rotation of `[-15, 0, 15]` degrees or
//! onto three colors. Inputs outside the range clamp to the end outputs.

use kinetic_core::error::{ensure_finite, ConfigurationError, Result};
use kinetic_core::{Channels, Color, Value, ValueKind};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRangeMap", into = "RawRangeMap")]
pub struct RangeMap {
    input: Vec<f32>,
    output: Vec<Value>,
}

#[derive(Clone, Serialize, Deserialize)]
struct RawRangeMap {
    input: Vec<f32>,
    output: Vec<Value>,
}

impl TryFrom<RawRangeMap> for RangeMap {
    type Error = ConfigurationError;

    fn try_from(raw: RawRangeMap) -> Result<Self> {
        RangeMap::from_values(raw.input, raw.output)
    }
}

impl From<RangeMap> for RawRangeMap {
    fn from(map: RangeMap) -> Self {
        RawRangeMap {
            input: map.input,
            output: map.output,
        }
    }
}

impl RangeMap {
    /// Scalar-to-scalar mapping
    pub fn new(input: &[f32], output: &[f32]) -> Result<Self> {
        Self::from_values(
            input.to_vec(),
            output.iter().copied().map(Value::Scalar).collect(),
        )
    }

    /// Scalar-to-color mapping
    pub fn colors(input: &[f32], output: &[Color]) -> Result<Self> {
        Self::from_values(
            input.to_vec(),
            output.iter().copied().map(Value::Color).collect(),
        )
    }

    /// Mapping onto arbitrary outputs of a single kind.
    ///
    /// Requires at least one stop, strictly increasing finite inputs and one
    /// output per input. A single stop maps every input to its output.
    pub fn from_values(input: Vec<f32>, output: Vec<Value>) -> Result<Self> {
        if input.is_empty() || input.len() != output.len() {
            return Err(ConfigurationError::MappingShape {
                inputs: input.len(),
                outputs: output.len(),
            });
        }
        for &x in &input {
            ensure_finite("mapping input", x)?;
        }
        if input.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ConfigurationError::MappingOrder);
        }
        let kind = output[0].kind();
        if output.iter().any(|v| v.kind() != kind) {
            return Err(ConfigurationError::MappingKind);
        }
        for value in &output {
            for channel in value.channels() {
                ensure_finite("mapping output", channel)?;
            }
        }
        Ok(Self { input, output })
    }

    pub fn input(&self) -> &[f32] {
        &self.input
    }

    pub fn output(&self) -> &[Value] {
        &self.output
    }

    pub fn output_kind(&self) -> ValueKind {
        self.output[0].kind()
    }

    pub fn apply(&self, x: f32) -> Value {
        let last = self.input.len() - 1;
        if !(x > self.input[0]) {
            // also catches NaN
            return self.output[0];
        }
        if x >= self.input[last] {
            return self.output[last];
        }

        // First stop strictly greater than x; in 1..=last here
        let upper = self.input.partition_point(|&stop| stop <= x);
        let lower = upper - 1;
        let t = (x - self.input[lower]) / (self.input[upper] - self.input[lower]);

        let from = self.output[lower].channels();
        let to = self.output[upper].channels();
        let mixed: Channels = from
            .iter()
            .zip(to.iter())
            .map(|(a, b)| a + (b - a) * t)
            .collect();
        Value::from_channels(self.output_kind(), &mixed)
    }
}
