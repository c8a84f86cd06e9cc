//! Swipe carousel snapping
//!
//! Turns a release into a card index: a fast flick skips up to three cards,
//! a slow drag snaps to whichever card is nearest once it passes a third of
//! a step.

use crate::error::Result;
use crate::gesture::{Constraints, ReleaseAction, ReleaseInfo};
use kinetic_animation::{RangeMap, TransitionSpec};
use kinetic_core::error::{ensure_non_negative, ensure_positive};
use kinetic_core::{ConfigurationError, Point};

/// Release speed per skipped card, px/s
const VELOCITY_PER_STEP: f32 = 600.0;
/// Most cards a single flick can skip
const MAX_VELOCITY_STEPS: u32 = 3;
/// Release speed that always counts as a swipe, px/s
const FLICK_VELOCITY: f32 = 300.0;

/// Horizontal card carousel snap policy
#[derive(Clone, Debug, PartialEq)]
pub struct CarouselSnap {
    card_width: f32,
    gap: f32,
    count: usize,
    index: usize,
    spec: TransitionSpec,
}

impl CarouselSnap {
    pub fn new(card_width: f32, gap: f32, count: usize) -> Result<Self> {
        ensure_positive("card_width", card_width)?;
        ensure_non_negative("gap", gap)?;
        if count == 0 {
            return Err(ConfigurationError::NotPositive {
                name: "card count",
                value: 0.0,
            }
            .into());
        }
        Ok(Self {
            card_width,
            gap,
            count,
            index: 0,
            spec: TransitionSpec::spring(0.4, 0.15),
        })
    }

    pub fn with_spec(mut self, spec: TransitionSpec) -> Result<Self> {
        spec.validate()?;
        self.spec = spec;
        Ok(self)
    }

    /// Start on card `index`
    pub fn with_index(mut self, index: usize) -> Result<Self> {
        if index >= self.count {
            return Err(ConfigurationError::OutOfRange {
                name: "card index",
                value: index as f32,
                min: 0.0,
                max: (self.count - 1) as f32,
            }
            .into());
        }
        self.index = index;
        Ok(self)
    }

    /// Distance between neighbouring cards
    pub fn step(&self) -> f32 {
        self.card_width + self.gap
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn spec(&self) -> TransitionSpec {
        self.spec
    }

    /// Drag constraints keeping the track between the first and last card
    pub fn constraints(&self) -> Constraints {
        let last = (self.count - 1) as f32 * self.step();
        Constraints::horizontal(-last, 0.0).unwrap_or(Constraints::NONE)
    }

    /// Track offset that shows card `index`
    pub fn target_for(&self, index: usize) -> f32 {
        -(index as f32) * self.step()
    }

    /// Index to settle on after a release with drag `offset` and `velocity`
    pub fn decide(&self, offset: f32, velocity: f32) -> usize {
        let step = self.step();
        let velocity_steps =
            ((velocity.abs() / VELOCITY_PER_STEP).floor() as u32 + 1).min(MAX_VELOCITY_STEPS);
        let offset_steps = (offset.abs() / step).round() as u32;
        let steps = velocity_steps.max(offset_steps) as usize;

        if velocity < -FLICK_VELOCITY || offset < -step / 3.0 {
            (self.index + steps).min(self.count - 1)
        } else if velocity > FLICK_VELOCITY || offset > step / 3.0 {
            self.index.saturating_sub(steps)
        } else {
            self.index
        }
    }

    /// Settle a released drag on a card, moving the current index
    pub fn release(&mut self, info: &ReleaseInfo) -> ReleaseAction {
        let index = self.decide(info.offset.x, info.velocity.x);
        if index != self.index {
            tracing::debug!(from = self.index, to = index, "carousel index changed");
        }
        self.index = index;
        ReleaseAction::SpringTo {
            target: Point::new(self.target_for(index), info.point.y),
            spec: self.spec,
        }
    }

    /// Breakpoints around card `index` on the track offset: the card peaks
    /// while centered and falls off toward its neighbours.
    fn falloff(&self, index: usize, edge: f32, peak: f32) -> Result<RangeMap> {
        let center = index as f32 * self.step() + self.card_width / 2.0;
        let width = self.card_width;
        let input = [
            -(center + width),
            -center + width / 2.0,
            -(center - width * 1.5),
        ];
        Ok(RangeMap::new(&input, &[edge, peak, edge])?)
    }

    /// Card scale as a function of the track offset
    pub fn card_scale(&self, index: usize) -> Result<RangeMap> {
        self.falloff(index, 0.9, 1.0)
    }

    /// Card opacity as a function of the track offset
    pub fn card_opacity(&self, index: usize) -> Result<RangeMap> {
        self.falloff(index, 0.5, 1.0)
    }
}
