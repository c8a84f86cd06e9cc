//! Headless scenario runner
//!
//! A scenario is a JSON document declaring named values, gestures and
//! presence groups, followed by steps run in order against one engine:
//!
//! ```json
//! {
//!   "values": { "opacity": 0 },
//!   "gestures": { "cards": { "carousel": { "card_width": 240, "gap": 16, "count": 5 } } },
//!   "steps": [
//!     { "type": "set_target", "value": "opacity", "target": 1 },
//!     { "type": "drag", "gesture": "cards", "from": [300, 0], "to": [255, 0], "duration": 0.05 },
//!     { "type": "settle" },
//!     { "type": "assert_carousel", "gesture": "cards", "index": 2 },
//!     { "type": "assert_value", "value": "cards.x", "equals": -512, "tolerance": 0.5 }
//!   ]
//! }
//! ```
//!
//! Gesture axes are addressed as `<gesture>.x` and `<gesture>.y`.

use anyhow::Context;
use kinetic_motion::{
    CarouselSnap, Constraints, DragAxis, ElementId, EngineConfig, GestureConfig, GestureId,
    MotionEngine, MotionError, Point, PresenceGroup, PresenceGroupId, PresenceMode,
    PresenceState, TransitionSpec, ValueId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

const DEFAULT_DT: f32 = 1.0 / 60.0;

/// Errors that abort a scenario
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// A step names something the scenario never declared
    #[error("unknown {kind} '{name}'")]
    Unknown { kind: &'static str, name: String },

    /// A settle step ran out of frames
    #[error("engine still active after {frames} frames")]
    NotSettled { frames: u32 },

    #[error(transparent)]
    Motion(#[from] MotionError),
}

fn default_true() -> bool {
    true
}

fn default_frames() -> u32 {
    1
}

fn default_max_frames() -> u32 {
    600
}

fn default_drag_steps() -> u32 {
    10
}

fn default_tolerance() -> f32 {
    0.01
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    #[serde(default)]
    pub values: BTreeMap<String, f32>,
    #[serde(default)]
    pub gestures: BTreeMap<String, GestureDef>,
    #[serde(default)]
    pub presence: BTreeMap<String, PresenceDef>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GestureDef {
    pub axis: DragAxis,
    pub constraints: Option<Constraints>,
    pub elastic: Option<f32>,
    #[serde(default = "default_true")]
    pub momentum: bool,
    /// Snap releases to cards; overrides axis and constraints
    pub carousel: Option<CarouselDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CarouselDef {
    pub card_width: f32,
    #[serde(default)]
    pub gap: f32,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresenceDef {
    #[serde(default)]
    pub mode: PresenceMode,
    pub keys: Vec<String>,
    /// Animate keys present in the first desired set
    #[serde(default = "default_true")]
    pub initial: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Tick {
        #[serde(default = "default_frames")]
        frames: u32,
        dt: Option<f32>,
    },
    /// Tick until the engine is idle
    Settle {
        #[serde(default = "default_max_frames")]
        max_frames: u32,
    },
    SetTarget {
        value: String,
        target: f32,
        #[serde(default)]
        transition: TransitionSpec,
    },
    Jump {
        value: String,
        to: f32,
    },
    /// Press, move in even steps over `duration` seconds, then release
    Drag {
        gesture: String,
        from: [f32; 2],
        to: [f32; 2],
        duration: f32,
        #[serde(default = "default_drag_steps")]
        steps: u32,
        #[serde(default)]
        cancel: bool,
    },
    Presence {
        group: String,
        keys: Vec<String>,
    },
    AssertValue {
        value: String,
        equals: f32,
        #[serde(default = "default_tolerance")]
        tolerance: f32,
    },
    /// `state: null` asserts the key is not mounted
    AssertPresence {
        group: String,
        key: String,
        state: Option<PresenceState>,
    },
    AssertCarousel {
        gesture: String,
        index: usize,
    },
}

impl Scenario {
    pub fn from_json(content: &str) -> serde_json::Result<Self> {
        serde_json::from_str(content)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Result of a completed scenario
#[derive(Debug, Default, Serialize)]
pub struct Outcome {
    pub frames: u64,
    pub time: f64,
    pub passed: usize,
    pub failures: Vec<String>,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Runner {
    engine: MotionEngine,
    values: BTreeMap<String, ValueId>,
    gestures: BTreeMap<String, GestureId>,
    groups: BTreeMap<String, PresenceGroupId>,
    outcome: Outcome,
}

impl Runner {
    fn new(scenario: &Scenario, config: EngineConfig) -> Result<Self, ScenarioError> {
        let mut engine = MotionEngine::new(config)?;

        let mut values = BTreeMap::new();
        for (name, initial) in &scenario.values {
            values.insert(name.clone(), engine.create_motion_value(*initial));
        }

        let mut gestures = BTreeMap::new();
        for (n, (name, def)) in scenario.gestures.iter().enumerate() {
            let element = ElementId(n as u64 + 1);
            let id = match &def.carousel {
                Some(carousel) => {
                    let snap = CarouselSnap::new(carousel.card_width, carousel.gap, carousel.count)?;
                    engine.register_carousel(element, snap)?.0
                }
                None => {
                    let mut config = GestureConfig::new().axis(def.axis).momentum(def.momentum);
                    if let Some(constraints) = def.constraints {
                        config = config.constraints(constraints);
                    }
                    if let Some(elastic) = def.elastic {
                        config = config.elastic(elastic);
                    }
                    engine.register_gesture(element, config)?
                }
            };
            if let Some((x, y)) = engine.gesture_values(id) {
                values.insert(format!("{name}.x"), x);
                values.insert(format!("{name}.y"), y);
            }
            gestures.insert(name.clone(), id);
        }

        let mut groups = BTreeMap::new();
        for (name, def) in &scenario.presence {
            let group = engine
                .insert_presence_group(PresenceGroup::new(def.mode).initial(def.initial));
            for key in &def.keys {
                engine.register_presence(key.as_str(), group, None, None)?;
            }
            groups.insert(name.clone(), group);
        }

        Ok(Self {
            engine,
            values,
            gestures,
            groups,
            outcome: Outcome::default(),
        })
    }

    fn value(&self, name: &str) -> Result<ValueId, ScenarioError> {
        self.values.get(name).copied().ok_or_else(|| ScenarioError::Unknown {
            kind: "value",
            name: name.to_string(),
        })
    }

    fn gesture(&self, name: &str) -> Result<GestureId, ScenarioError> {
        self.gestures
            .get(name)
            .copied()
            .ok_or_else(|| ScenarioError::Unknown {
                kind: "gesture",
                name: name.to_string(),
            })
    }

    fn group(&self, name: &str) -> Result<PresenceGroupId, ScenarioError> {
        self.groups.get(name).copied().ok_or_else(|| ScenarioError::Unknown {
            kind: "presence group",
            name: name.to_string(),
        })
    }

    fn check(&mut self, ok: bool, step: usize, message: impl FnOnce() -> String) {
        if ok {
            self.outcome.passed += 1;
        } else {
            let failure = format!("step {step}: {}", message());
            tracing::warn!("{failure}");
            self.outcome.failures.push(failure);
        }
    }

    fn run_step(&mut self, index: usize, step: &Step) -> Result<(), ScenarioError> {
        tracing::debug!(step = index, ?step, "running step");
        match step {
            Step::Tick { frames, dt } => {
                let dt = dt.unwrap_or(DEFAULT_DT);
                for _ in 0..*frames {
                    self.engine.tick(dt);
                }
            }
            Step::Settle { max_frames } => {
                let mut frames = 0;
                while self.engine.is_active() {
                    if frames == *max_frames {
                        return Err(ScenarioError::NotSettled { frames });
                    }
                    self.engine.tick(DEFAULT_DT);
                    frames += 1;
                }
            }
            Step::SetTarget {
                value,
                target,
                transition,
            } => {
                let id = self.value(value)?;
                self.engine.set_target(id, *target, transition)?;
            }
            Step::Jump { value, to } => {
                let id = self.value(value)?;
                self.engine.jump(id, *to)?;
            }
            Step::Drag {
                gesture,
                from,
                to,
                duration,
                steps,
                cancel,
            } => {
                let id = self.gesture(gesture)?;
                let from = Point::new(from[0], from[1]);
                let to = Point::new(to[0], to[1]);
                let steps = (*steps).max(1);
                let dt = duration.max(0.0) / steps as f32;

                let mut timestamp = self.engine.time();
                self.engine.pointer_down(id, from, timestamp)?;
                for i in 1..=steps {
                    let t = i as f32 / steps as f32;
                    timestamp += dt as f64;
                    let point = Point::new(from.x + (to.x - from.x) * t, from.y + (to.y - from.y) * t);
                    self.engine.pointer_move(id, point, timestamp)?;
                    self.engine.tick(dt);
                }
                if *cancel {
                    self.engine.pointer_cancel(id, timestamp)?;
                } else {
                    self.engine.pointer_up(id, to, timestamp)?;
                }
            }
            Step::Presence { group, keys } => {
                let group = self.group(group)?;
                self.engine.set_presence(group, keys.iter().cloned())?;
            }
            Step::AssertValue {
                value,
                equals,
                tolerance,
            } => {
                let id = self.value(value)?;
                let actual = self.engine.scalar(id);
                let ok = actual.is_some_and(|v| (v - equals).abs() <= *tolerance);
                self.check(ok, index, || {
                    format!("{value} = {actual:?}, expected {equals} ± {tolerance}")
                });
            }
            Step::AssertPresence { group, key, state } => {
                let id = self.group(group)?;
                let actual = self.engine.presence_state(id, key);
                let mounted = matches!(
                    actual,
                    Some(PresenceState::Entering | PresenceState::Present | PresenceState::Exiting)
                );
                let ok = match state {
                    Some(expected) => actual == Some(*expected),
                    None => !mounted,
                };
                self.check(ok, index, || {
                    format!("{group}/{key} is {actual:?}, expected {state:?}")
                });
            }
            Step::AssertCarousel { gesture, index: expected } => {
                let id = self.gesture(gesture)?;
                let actual = self.engine.carousel_index(id);
                self.check(actual == Some(*expected), index, || {
                    format!("{gesture} is on card {actual:?}, expected {expected}")
                });
            }
        }
        Ok(())
    }
}

/// Run every step; assertion failures are collected, other errors abort
pub fn run(scenario: &Scenario, config: EngineConfig) -> Result<Outcome, ScenarioError> {
    let mut runner = Runner::new(scenario, config)?;
    for (index, step) in scenario.steps.iter().enumerate() {
        runner.run_step(index, step)?;
    }
    let mut outcome = runner.outcome;
    outcome.frames = runner.engine.frame();
    outcome.time = runner.engine.time();
    tracing::info!(
        frames = outcome.frames,
        passed = outcome.passed,
        failed = outcome.failures.len(),
        "scenario finished"
    );
    Ok(outcome)
}
