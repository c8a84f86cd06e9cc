//! Frame-driven motion engine
//!
//! The host calls [`MotionEngine::tick`] once per frame with the elapsed time.
//! Every tick runs the same steps:
//!
//! 1. presence groups apply their desired sets and gestures apply queued
//!    pointer events
//! 2. the value graph applies pending intents, advances trajectories and
//!    propagates derivations
//! 3. layout commits are measured, presence and gesture states observe
//!    settles, sequences start due tracks; the intents these queue are
//!    applied before the frame is reported
//! 4. the frame report goes to the sink, then value subscribers run

use crate::carousel::CarouselSnap;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::gesture::{DragAxis, GestureConfig, GestureController, GestureId, GesturePhase};
use crate::layout::{
    ElementId, LayoutBox, LayoutId, LayoutMeasurer, LayoutMorphEngine, MorphOutcome,
    MorphTransform,
};
use crate::presence::{
    PresenceEvent, PresenceGroup, PresenceGroupId, PresenceMode, PresenceScheduler, PresenceState,
};
use crate::sequence::{Sequence, SequenceId, SequenceScheduler};
use kinetic_animation::{RangeMap, SubscriptionId, TransitionSpec, ValueGraph, ValueId};
use kinetic_core::{Point, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Carousel shared between the engine and its gesture's release handler
pub type SharedCarousel = Rc<RefCell<CarouselSnap>>;

/// Receives every frame after it has been computed
pub trait FrameSink {
    fn frame(&mut self, report: &FrameReport, graph: &ValueGraph);
}

impl<F> FrameSink for F
where
    F: FnMut(&FrameReport, &ValueGraph),
{
    fn frame(&mut self, report: &FrameReport, graph: &ValueGraph) {
        self(report, graph)
    }
}

/// Everything that happened during one tick
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    /// Frame counter, starting at 1
    pub frame: u64,
    /// Delta actually simulated, after sanitizing and clamping
    pub dt: f32,
    /// Engine clock in seconds
    pub time: f64,
    pub changed: Vec<ValueId>,
    pub settled: Vec<ValueId>,
    /// Values whose trajectory diverged and was stopped
    pub failed: Vec<ValueId>,
    pub derivations_computed: usize,
    /// Gestures that returned to idle
    pub gestures_idle: Vec<GestureId>,
    pub presence: Vec<(PresenceGroupId, PresenceEvent)>,
    pub layout: Vec<(LayoutId, MorphOutcome)>,
    pub sequences_completed: Vec<SequenceId>,
}

struct NoMeasurement;

impl LayoutMeasurer for NoMeasurement {
    fn measure(&self, _element: ElementId) -> Option<LayoutBox> {
        None
    }
}

/// Explicit engine instance owning the value graph and every controller
pub struct MotionEngine {
    config: EngineConfig,
    graph: ValueGraph,
    gestures: GestureController,
    presence: PresenceScheduler,
    layout: LayoutMorphEngine,
    sequences: SequenceScheduler,
    measurer: Box<dyn LayoutMeasurer>,
    sink: Option<Box<dyn FrameSink>>,
    pending_layout: Option<Vec<(LayoutId, ElementId)>>,
    carousels: Vec<(GestureId, SharedCarousel)>,
    time: f64,
    frame: u64,
}

impl MotionEngine {
    /// Build an engine; fails if the config holds out-of-domain values
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        tracing::debug!(max_dt = ?config.max_dt, "creating motion engine");
        Ok(Self {
            graph: ValueGraph::new().with_tolerance(config.tolerance),
            gestures: GestureController::new(config.gesture.clone()),
            presence: PresenceScheduler::new(config.presence.clone()),
            layout: LayoutMorphEngine::new(config.layout.clone()),
            sequences: SequenceScheduler::new(),
            measurer: Box::new(NoMeasurement),
            sink: None,
            pending_layout: None,
            carousels: Vec::new(),
            time: 0.0,
            frame: 0,
            config,
        })
    }

    /// Measure layout boxes through `measurer`; without one every layout
    /// change falls back to a fade
    pub fn with_measurer(mut self, measurer: impl LayoutMeasurer + 'static) -> Self {
        self.measurer = Box::new(measurer);
        self
    }

    pub fn with_sink(mut self, sink: impl FrameSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn graph(&self) -> &ValueGraph {
        &self.graph
    }

    /// Direct graph access, for operations the engine does not wrap
    pub fn graph_mut(&mut self) -> &mut ValueGraph {
        &mut self.graph
    }

    /// Engine clock in seconds
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    // Values

    pub fn create_motion_value(&mut self, initial: impl Into<Value>) -> ValueId {
        self.graph.create_value(initial)
    }

    pub fn set_target(
        &mut self,
        id: ValueId,
        target: impl Into<Value>,
        spec: &TransitionSpec,
    ) -> Result<()> {
        Ok(self.graph.set_target(id, target, spec)?)
    }

    pub fn jump(&mut self, id: ValueId, value: impl Into<Value>) -> Result<()> {
        Ok(self.graph.jump(id, value)?)
    }

    pub fn derive(&mut self, inputs: &[ValueId], map: RangeMap) -> Result<ValueId> {
        Ok(self.graph.derive(inputs, map)?)
    }

    pub fn derive_with<F>(&mut self, inputs: &[ValueId], compute: F) -> Result<ValueId>
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        Ok(self.graph.derive_with(inputs, compute)?)
    }

    pub fn subscribe<F>(&mut self, id: ValueId, callback: F) -> Result<SubscriptionId>
    where
        F: FnMut(ValueId, &Value) + 'static,
    {
        Ok(self.graph.subscribe(id, callback)?)
    }

    pub fn value(&self, id: ValueId) -> Option<Value> {
        self.graph.get(id)
    }

    pub fn scalar(&self, id: ValueId) -> Option<f32> {
        self.graph.get_scalar(id)
    }

    /// Remaining distance to the active target, for diagnosing values that
    /// never settle
    pub fn distance_to_target(&self, id: ValueId) -> Option<f32> {
        self.graph.distance_to_target(id)
    }

    // Gestures

    pub fn register_gesture(
        &mut self,
        element: ElementId,
        config: GestureConfig,
    ) -> Result<GestureId> {
        self.gestures.register(&mut self.graph, element, config)
    }

    /// Register a horizontal drag that snaps `carousel`'s cards on release
    pub fn register_carousel(
        &mut self,
        element: ElementId,
        carousel: CarouselSnap,
    ) -> Result<(GestureId, SharedCarousel)> {
        let constraints = carousel.constraints();
        let shared: SharedCarousel = Rc::new(RefCell::new(carousel));
        let handle = Rc::clone(&shared);
        let config = GestureConfig::new()
            .axis(DragAxis::X)
            .constraints(constraints)
            .elastic(0.15)
            .on_release(move |info| handle.borrow_mut().release(info));
        let id = self.register_gesture(element, config)?;
        self.carousels.push((id, Rc::clone(&shared)));
        Ok((id, shared))
    }

    /// Current card of a carousel gesture
    pub fn carousel_index(&self, id: GestureId) -> Option<usize> {
        let (_, carousel) = self.carousels.iter().find(|(g, _)| *g == id)?;
        Some(carousel.borrow().index())
    }

    pub fn unregister_gesture(&mut self, id: GestureId) -> Result<()> {
        self.carousels.retain(|(g, _)| *g != id);
        self.gestures.unregister(&mut self.graph, id)
    }

    /// The `x` and `y` values driven by a gesture
    pub fn gesture_values(&self, id: GestureId) -> Option<(ValueId, ValueId)> {
        self.gestures.values(id)
    }

    pub fn gesture_phase(&self, id: GestureId) -> Option<GesturePhase> {
        self.gestures.phase(id)
    }

    pub fn pointer_down(&mut self, id: GestureId, point: Point, timestamp: f64) -> Result<()> {
        self.gestures.pointer_down(id, point, timestamp)
    }

    pub fn pointer_move(&mut self, id: GestureId, point: Point, timestamp: f64) -> Result<()> {
        self.gestures.pointer_move(id, point, timestamp)
    }

    pub fn pointer_up(&mut self, id: GestureId, point: Point, timestamp: f64) -> Result<()> {
        self.gestures.pointer_up(id, point, timestamp)
    }

    pub fn pointer_cancel(&mut self, id: GestureId, timestamp: f64) -> Result<()> {
        self.gestures.pointer_cancel(id, timestamp)
    }

    // Presence

    pub fn create_presence_group(&mut self, mode: PresenceMode) -> PresenceGroupId {
        self.presence.create_group(mode)
    }

    /// Add a group built with [`PresenceGroup::initial`] or other options
    pub fn insert_presence_group(&mut self, group: PresenceGroup) -> PresenceGroupId {
        self.presence.insert_group(group)
    }

    /// Declare a key; `None` transitions use the configured defaults
    pub fn register_presence(
        &mut self,
        key: impl Into<String>,
        group: PresenceGroupId,
        enter: Option<TransitionSpec>,
        exit: Option<TransitionSpec>,
    ) -> Result<()> {
        self.presence.register(group, key, enter, exit)
    }

    pub fn set_presence<I, S>(&mut self, group: PresenceGroupId, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.presence.set_desired(group, keys)
    }

    pub fn presence_group(&self, group: PresenceGroupId) -> Option<&PresenceGroup> {
        self.presence.group(group)
    }

    pub fn presence_state(&self, group: PresenceGroupId, key: &str) -> Option<PresenceState> {
        self.presence.group(group)?.state(key)
    }

    /// Current progress of a mounted key, `0` absent to `1` present
    pub fn presence_progress(&self, group: PresenceGroupId, key: &str) -> Option<f32> {
        let progress = self.presence.group(group)?.progress(key)?;
        self.graph.get_scalar(progress)
    }

    pub fn remove_presence_group(&mut self, group: PresenceGroupId) -> Result<()> {
        self.presence.remove_group(&mut self.graph, group)
    }

    // Layout

    /// Record the layout keys rendered this frame; measured on the next tick
    pub fn commit_layout(&mut self, nodes: &[(LayoutId, ElementId)]) {
        self.pending_layout = Some(nodes.to_vec());
    }

    pub fn set_layout_transition(
        &mut self,
        key: impl Into<LayoutId>,
        spec: TransitionSpec,
    ) -> Result<()> {
        self.layout.set_transition(key, spec)
    }

    pub fn layout_transform(&self, key: &LayoutId) -> Option<MorphTransform> {
        self.layout.transform(&self.graph, key)
    }

    // Sequences

    pub fn start_sequence(&mut self, sequence: Sequence) -> Result<SequenceId> {
        self.sequences.start(&self.graph, sequence)
    }

    pub fn cancel_sequence(&mut self, id: SequenceId) -> Result<()> {
        self.sequences.cancel(id)
    }

    /// A sequence is complete once it is no longer running
    pub fn sequence_complete(&self, id: SequenceId) -> bool {
        !self.sequences.is_running(id)
    }

    /// Whether anything still needs frames
    pub fn is_active(&self) -> bool {
        self.graph.has_active_animations()
            || self.gestures.has_pending_input()
            || self.pending_layout.is_some()
            || !self.sequences.is_empty()
            || !self.presence.is_idle()
    }

    /// Advance the engine by `dt` seconds.
    ///
    /// Non-finite or negative deltas count as zero; deltas above `max_dt`
    /// are clamped.
    pub fn tick(&mut self, dt: f32) -> FrameReport {
        let mut dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        if let Some(max_dt) = self.config.max_dt {
            dt = dt.min(max_dt);
        }
        self.frame += 1;
        self.time += dt as f64;
        tracing::trace!(frame = self.frame, dt, "tick");

        self.presence.begin_frame(&mut self.graph, self.time);
        self.gestures.process(&mut self.graph);

        let mut tick = self.graph.update(dt);

        let mut layout = Vec::new();
        if let Some(nodes) = self.pending_layout.take() {
            match self
                .layout
                .commit(&mut self.graph, &nodes, self.measurer.as_ref())
            {
                Ok(outcomes) => layout = outcomes,
                Err(err) => tracing::warn!(%err, "layout commit failed"),
            }
        }
        self.presence.end_frame(&mut self.graph, self.time);
        let sequences_completed = self.sequences.advance(&mut self.graph, dt as f64);
        // Morph starts, entries and sequence tracks queued above land this frame
        tick.merge(self.graph.flush());
        let gestures_idle = self.gestures.update_phases(&self.graph);

        let report = FrameReport {
            frame: self.frame,
            dt,
            time: self.time,
            changed: tick.changed.clone(),
            settled: tick.settled.clone(),
            failed: tick.failed.clone(),
            derivations_computed: tick.derivations_computed,
            gestures_idle,
            presence: self.presence.drain_events(),
            layout,
            sequences_completed,
        };
        if let Some(sink) = self.sink.as_mut() {
            sink.frame(&report, &self.graph);
        }
        self.graph.notify(&tick);
        report
    }
}
