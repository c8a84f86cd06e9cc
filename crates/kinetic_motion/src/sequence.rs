//! Orchestrated parent/children transitions
//!
//! A [`Sequence`] animates an optional parent value and a list of children
//! with one transition. Children start at their [`Orchestration`] offsets,
//! measured from when the children are allowed to start:
//!
//! - no `when`: parent and children start together
//! - [`When::BeforeChildren`]: children wait for the parent to settle
//! - [`When::AfterChildren`]: the parent waits for every child to settle

use crate::error::{MotionError, Result};
use kinetic_animation::{AnimationError, Orchestration, TransitionSpec, ValueGraph, ValueId, When};
use kinetic_core::Value;
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle to a running sequence
    pub struct SequenceId;
}

/// Value to animate and where it should end up
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub value: ValueId,
    pub target: Value,
}

/// Description of an orchestrated transition
#[derive(Clone, Debug, PartialEq)]
pub struct Sequence {
    parent: Option<Track>,
    children: Vec<Track>,
    spec: TransitionSpec,
    orchestration: Orchestration,
}

impl Sequence {
    pub fn new(spec: TransitionSpec) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            spec,
            orchestration: Orchestration::default(),
        }
    }

    pub fn parent(mut self, value: ValueId, target: impl Into<Value>) -> Self {
        self.parent = Some(Track {
            value,
            target: target.into(),
        });
        self
    }

    pub fn child(mut self, value: ValueId, target: impl Into<Value>) -> Self {
        self.children.push(Track {
            value,
            target: target.into(),
        });
        self
    }

    pub fn orchestration(mut self, orchestration: Orchestration) -> Self {
        self.orchestration = orchestration;
        self
    }

    fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.parent.iter().chain(&self.children)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TrackState {
    Waiting,
    Running,
    Done,
}

struct Run {
    sequence: Sequence,
    elapsed: f64,
    parent: TrackState,
    children: Vec<TrackState>,
    /// Time the children's offsets count from
    children_origin: Option<f64>,
}

impl Run {
    fn new(sequence: Sequence) -> Self {
        let parent = if sequence.parent.is_some() {
            TrackState::Waiting
        } else {
            TrackState::Done
        };
        let children = vec![TrackState::Waiting; sequence.children.len()];
        Self {
            sequence,
            elapsed: 0.0,
            parent,
            children,
            children_origin: None,
        }
    }

    fn is_complete(&self) -> bool {
        self.parent == TrackState::Done && self.children.iter().all(|s| *s == TrackState::Done)
    }

    fn advance(&mut self, graph: &mut ValueGraph, dt: f64) {
        self.elapsed += dt;
        let spec = self.sequence.spec;

        // Settle running tracks first so dependants can start this frame
        if self.parent == TrackState::Running {
            if let Some(parent) = &self.sequence.parent {
                if !is_busy(graph, parent.value) {
                    self.parent = TrackState::Done;
                }
            }
        }
        for (state, track) in self.children.iter_mut().zip(&self.sequence.children) {
            if *state == TrackState::Running && !is_busy(graph, track.value) {
                *state = TrackState::Done;
            }
        }

        let when = self.sequence.orchestration.when;
        if self.parent == TrackState::Waiting {
            let ready = match when {
                Some(When::AfterChildren) => self.children.iter().all(|s| *s == TrackState::Done),
                _ => true,
            };
            if ready {
                if let Some(parent) = &self.sequence.parent {
                    self.parent = start(graph, parent, &spec);
                }
            }
        }

        if self.children_origin.is_none() {
            let ready = match when {
                Some(When::BeforeChildren) => self.parent == TrackState::Done,
                _ => true,
            };
            if ready {
                self.children_origin = Some(self.elapsed);
            }
        }
        let Some(origin) = self.children_origin else {
            return;
        };
        let since = self.elapsed - origin;
        let orchestration = self.sequence.orchestration;
        for (index, (state, track)) in self
            .children
            .iter_mut()
            .zip(&self.sequence.children)
            .enumerate()
        {
            if *state == TrackState::Waiting
                && since + 1e-9 >= orchestration.offset_for_index(index) as f64
            {
                *state = start(graph, track, &spec);
            }
        }
    }
}

fn is_busy(graph: &ValueGraph, id: ValueId) -> bool {
    graph.is_animating(id) || graph.has_pending(id)
}

fn start(graph: &mut ValueGraph, track: &Track, spec: &TransitionSpec) -> TrackState {
    match graph.set_target(track.value, track.target, spec) {
        Ok(()) => TrackState::Running,
        Err(err) => {
            tracing::warn!(value = ?track.value, %err, "sequence track skipped");
            TrackState::Done
        }
    }
}

/// Runs started sequences, one step per frame
pub struct SequenceScheduler {
    runs: SlotMap<SequenceId, Run>,
}

impl SequenceScheduler {
    pub fn new() -> Self {
        Self {
            runs: SlotMap::with_key(),
        }
    }

    /// Validate and queue a sequence; nothing starts before the next frame
    pub fn start(&mut self, graph: &ValueGraph, sequence: Sequence) -> Result<SequenceId> {
        sequence.spec.validate()?;
        sequence.orchestration.validate()?;
        for track in sequence.tracks() {
            let current = graph
                .get(track.value)
                .ok_or(AnimationError::UnknownValue(track.value))?;
            if current.kind() != track.target.kind() {
                return Err(AnimationError::KindMismatch {
                    expected: current.kind(),
                    found: track.target.kind(),
                }
                .into());
            }
        }
        let children = sequence.children.len();
        let id = self.runs.insert(Run::new(sequence));
        tracing::debug!(?id, children, "sequence started");
        Ok(id)
    }

    pub fn cancel(&mut self, id: SequenceId) -> Result<()> {
        self.runs
            .remove(id)
            .map(|_| ())
            .ok_or(MotionError::UnknownSequence(id))
    }

    pub fn is_running(&self, id: SequenceId) -> bool {
        self.runs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Step every sequence by `dt` seconds; returns those that completed
    pub fn advance(&mut self, graph: &mut ValueGraph, dt: f64) -> Vec<SequenceId> {
        let mut complete = Vec::new();
        for (id, run) in self.runs.iter_mut() {
            run.advance(graph, dt);
            if run.is_complete() {
                complete.push(id);
            }
        }
        for id in &complete {
            self.runs.remove(*id);
            tracing::debug!(?id, "sequence complete");
        }
        complete
    }
}

impl Default for SequenceScheduler {
    fn default() -> Self {
        Self::new()
    }
}
