//! Staggered orchestration offsets

use kinetic_core::error::{ensure_non_negative, Result};
use serde::{Deserialize, Serialize};

/// When the parent animates relative to its children
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum When {
    /// Children wait for the parent to settle
    BeforeChildren,
    /// The parent waits for every child to settle
    AfterChildren,
}

/// Start offsets for a group of children, in seconds
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Orchestration {
    /// Delay before the first child
    pub delay_children: f32,
    /// Delay between consecutive children
    pub stagger_children: f32,
    pub when: Option<When>,
    /// Children past this index share its offset
    pub limit: Option<usize>,
}

impl Orchestration {
    pub fn new(delay_children: f32, stagger_children: f32) -> Result<Self> {
        let orchestration = Self {
            delay_children,
            stagger_children,
            ..Self::default()
        };
        orchestration.validate()?;
        Ok(orchestration)
    }

    pub fn when(mut self, when: When) -> Self {
        self.when = Some(when);
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("delay_children", self.delay_children)?;
        ensure_non_negative("stagger_children", self.stagger_children)?;
        Ok(())
    }

    /// Start offset of child `index`
    pub fn offset_for_index(&self, index: usize) -> f32 {
        let index = self.limit.map_or(index, |limit| index.min(limit));
        self.delay_children + index as f32 * self.stagger_children
    }

    pub fn offsets(&self, count: usize) -> Vec<f32> {
        (0..count).map(|i| self.offset_for_index(i)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets() {
        let orchestration = Orchestration::new(0.1, 0.05).unwrap();
        let offsets = orchestration.offsets(4);
        let expected = [0.1, 0.15, 0.2, 0.25];
        for (offset, expected) in offsets.iter().zip(expected) {
            assert!((offset - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_offsets_never_decrease() {
        for (delay, stagger) in [(0.0, 0.0), (0.1, 0.08), (0.3, 0.25), (2.0, 0.12)] {
            let orchestration = Orchestration::new(delay, stagger).unwrap();
            let offsets = orchestration.offsets(50);
            assert!(offsets.windows(2).all(|w| w[1] >= w[0]));

            let limited = orchestration.limit(3).offsets(50);
            assert!(limited.windows(2).all(|w| w[1] >= w[0]));
            assert_eq!(limited[3], limited[49]);
        }
    }

    #[test]
    fn test_rejects_negative_or_non_finite_delays() {
        assert!(Orchestration::new(-0.1, 0.05).is_err());
        assert!(Orchestration::new(0.1, f32::NAN).is_err());
        assert!(Orchestration::new(0.1, f32::INFINITY).is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let orchestration: Orchestration =
            serde_json::from_str(r#"{"stagger_children":0.05,"when":"before_children"}"#)
                .unwrap();
        assert_eq!(orchestration.delay_children, 0.0);
        assert_eq!(orchestration.when, Some(When::BeforeChildren));
    }
}
