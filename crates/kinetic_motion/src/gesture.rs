//! Drag gestures
//!
//! Each registered gesture owns an `x` and a `y` motion value. Pointer events
//! are queued as they arrive and applied at the start of the next frame:
//!
//! ```text
//! Idle ─down─▶ Dragging ─up/cancel─▶ Releasing ──settled──▶ Idle
//!                               └──▶ SettlingBack ─settled─▶ Idle
//! ```
//!
//! While dragging, positions outside the constraints are compressed by a
//! rubber band. On release the measured velocity either carries the value on
//! as bounded momentum or is discarded in favor of a snap spring.

use crate::config::GestureSettings;
use crate::error::{MotionError, Result};
use crate::layout::ElementId;
use crate::velocity::VelocityTracker;
use kinetic_animation::{Bounds, TransitionSpec, ValueGraph, ValueId};
use kinetic_core::error::{ensure_finite, ensure_within};
use kinetic_core::{Point, Vec2};
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle to a registered gesture
    pub struct GestureId;
}

/// Axes a drag may move along
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragAxis {
    #[default]
    Free,
    X,
    Y,
}

impl DragAxis {
    fn allows_x(self) -> bool {
        self != DragAxis::Y
    }

    fn allows_y(self) -> bool {
        self != DragAxis::X
    }
}

/// Per-axis drag constraints
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    pub x: Bounds,
    pub y: Bounds,
}

impl Constraints {
    pub const NONE: Constraints = Constraints {
        x: Bounds::UNBOUNDED,
        y: Bounds::UNBOUNDED,
    };

    pub fn new(x: Bounds, y: Bounds) -> Self {
        Self { x, y }
    }

    /// Box constraints, as offsets from the value origin
    pub fn rect(left: f32, right: f32, top: f32, bottom: f32) -> Result<Self> {
        Ok(Self {
            x: Bounds::between(left, right)?,
            y: Bounds::between(top, bottom)?,
        })
    }

    /// Constrain only the horizontal axis
    pub fn horizontal(left: f32, right: f32) -> Result<Self> {
        Ok(Self {
            x: Bounds::between(left, right)?,
            y: Bounds::UNBOUNDED,
        })
    }

    pub fn contains(&self, point: Point) -> bool {
        self.x.contains(point.x) && self.y.contains(point.y)
    }

    pub fn clamp(&self, point: Point) -> Point {
        Point::new(self.x.clamp(point.x), self.y.clamp(point.y))
    }

    fn validate(&self) -> Result<()> {
        Bounds::new(self.x.min, self.x.max)?;
        Bounds::new(self.y.min, self.y.max)?;
        Ok(())
    }
}

/// Gesture state at release, handed to `on_release`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReleaseInfo {
    /// Position of the dragged value
    pub point: Point,
    /// Position relative to where the drag started
    pub offset: Vec2,
    /// Measured release velocity, units per second
    pub velocity: Vec2,
}

/// What a gesture does once released
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ReleaseAction {
    /// Momentum or snap back, per the gesture's configuration
    #[default]
    Default,
    /// Spring to an explicit position, keeping the release velocity
    SpringTo {
        target: Point,
        spec: TransitionSpec,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GesturePhase {
    Idle,
    Dragging,
    /// Released, animating under momentum or toward a chosen target
    Releasing,
    /// Released outside the constraints, returning inside
    SettlingBack,
}

pub type ReleaseHandler = Box<dyn FnMut(&ReleaseInfo) -> ReleaseAction>;

/// Drag gesture configuration
pub struct GestureConfig {
    pub axis: DragAxis,
    /// Lock to the first axis moved along beyond the lock threshold
    pub direction_lock: bool,
    pub constraints: Constraints,
    /// Rubber band factor in `[0, 1]`; `None` uses the engine default
    pub elastic: Option<f32>,
    pub momentum: bool,
    on_release: Option<ReleaseHandler>,
}

impl GestureConfig {
    pub fn new() -> Self {
        Self {
            axis: DragAxis::Free,
            direction_lock: false,
            constraints: Constraints::NONE,
            elastic: None,
            momentum: true,
            on_release: None,
        }
    }

    pub fn axis(mut self, axis: DragAxis) -> Self {
        self.axis = axis;
        self
    }

    pub fn direction_lock(mut self, enabled: bool) -> Self {
        self.direction_lock = enabled;
        self
    }

    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn elastic(mut self, elastic: f32) -> Self {
        self.elastic = Some(elastic);
        self
    }

    pub fn momentum(mut self, enabled: bool) -> Self {
        self.momentum = enabled;
        self
    }

    pub fn on_release<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&ReleaseInfo) -> ReleaseAction + 'static,
    {
        self.on_release = Some(Box::new(handler));
        self
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Compress the part of `value` beyond `bounds`.
///
/// `bound + sign·elastic·extent·ln(1 + |excess| / extent)`: zero elastic is a
/// hard clamp, and the pull grows ever stiffer with distance.
pub fn rubber_band(value: f32, bounds: &Bounds, elastic: f32, extent: f32) -> f32 {
    match bounds.crossed(value) {
        None => value,
        Some(bound) => {
            let excess = value - bound;
            bound + excess.signum() * elastic * extent * (excess.abs() / extent).ln_1p()
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum PointerEvent {
    Down(Point, f64),
    Move(Point, f64),
    Up(Point, f64),
    Cancel(f64),
}

struct Session {
    pointer_origin: Point,
    value_origin: Point,
    position: Point,
    last_timestamp: f64,
    locked: Option<DragAxis>,
    tracker: VelocityTracker,
    released: bool,
}

struct Gesture {
    element: ElementId,
    config: GestureConfig,
    elastic: f32,
    /// Velocity window, seconds
    window: f64,
    x: ValueId,
    y: ValueId,
    phase: GesturePhase,
    session: Option<Session>,
    queue: Vec<PointerEvent>,
}

/// Owns every registered gesture and turns pointer input into value updates
pub struct GestureController {
    gestures: SlotMap<GestureId, Gesture>,
    settings: GestureSettings,
}

impl GestureController {
    pub fn new(settings: GestureSettings) -> Self {
        Self {
            gestures: SlotMap::with_key(),
            settings,
        }
    }

    pub fn settings(&self) -> &GestureSettings {
        &self.settings
    }

    /// Register a draggable element; its `x` and `y` values start at zero
    pub fn register(
        &mut self,
        graph: &mut ValueGraph,
        element: ElementId,
        config: GestureConfig,
    ) -> Result<GestureId> {
        let elastic = config.elastic.unwrap_or(self.settings.elastic);
        ensure_within("elastic", elastic, 0.0, 1.0)?;
        config.constraints.validate()?;

        let x = graph.create_value(0.0);
        let y = graph.create_value(0.0);
        let id = self.gestures.insert(Gesture {
            element,
            config,
            elastic,
            window: self.settings.velocity_window_ms as f64 / 1000.0,
            x,
            y,
            phase: GesturePhase::Idle,
            session: None,
            queue: Vec::new(),
        });
        tracing::debug!(?id, ?element, "registered gesture");
        Ok(id)
    }

    /// Drop a gesture and its values
    pub fn unregister(&mut self, graph: &mut ValueGraph, id: GestureId) -> Result<()> {
        let gesture = self
            .gestures
            .remove(id)
            .ok_or(MotionError::UnknownGesture(id))?;
        graph.remove(gesture.x)?;
        graph.remove(gesture.y)?;
        Ok(())
    }

    pub fn values(&self, id: GestureId) -> Option<(ValueId, ValueId)> {
        self.gestures.get(id).map(|g| (g.x, g.y))
    }

    pub fn phase(&self, id: GestureId) -> Option<GesturePhase> {
        self.gestures.get(id).map(|g| g.phase)
    }

    pub fn element(&self, id: GestureId) -> Option<ElementId> {
        self.gestures.get(id).map(|g| g.element)
    }

    /// Pointer pressed at `point`; timestamps are in seconds
    pub fn pointer_down(&mut self, id: GestureId, point: Point, timestamp: f64) -> Result<()> {
        self.enqueue(id, PointerEvent::Down(point, timestamp), Some(point))
    }

    pub fn pointer_move(&mut self, id: GestureId, point: Point, timestamp: f64) -> Result<()> {
        self.enqueue(id, PointerEvent::Move(point, timestamp), Some(point))
    }

    pub fn pointer_up(&mut self, id: GestureId, point: Point, timestamp: f64) -> Result<()> {
        self.enqueue(id, PointerEvent::Up(point, timestamp), Some(point))
    }

    /// Pointer capture lost; releases at the last known sample
    pub fn pointer_cancel(&mut self, id: GestureId, timestamp: f64) -> Result<()> {
        self.enqueue(id, PointerEvent::Cancel(timestamp), None)
    }

    /// Whether any pointer events are waiting for the next tick
    pub fn has_pending_input(&self) -> bool {
        self.gestures.values().any(|g| !g.queue.is_empty())
    }

    /// Apply queued pointer events, in arrival order
    pub fn process(&mut self, graph: &mut ValueGraph) {
        let settings = &self.settings;
        for (id, gesture) in self.gestures.iter_mut() {
            for event in std::mem::take(&mut gesture.queue) {
                let applied = match event {
                    PointerEvent::Down(point, t) => gesture.press(graph, point, t),
                    PointerEvent::Move(point, t) => gesture.drag(graph, settings, point, t),
                    PointerEvent::Up(point, t) => gesture
                        .drag(graph, settings, point, t)
                        .and_then(|_| gesture.release(graph, settings, t)),
                    PointerEvent::Cancel(t) => {
                        let t = gesture.session.as_ref().map_or(t, |s| s.last_timestamp);
                        gesture.release(graph, settings, t)
                    }
                };
                if let Err(err) = applied {
                    tracing::warn!(?id, %err, "pointer event failed");
                }
            }
        }
    }

    /// Return released gestures whose animations settled to `Idle`
    pub fn update_phases(&mut self, graph: &ValueGraph) -> Vec<GestureId> {
        let mut idle = Vec::new();
        for (id, gesture) in self.gestures.iter_mut() {
            if !matches!(
                gesture.phase,
                GesturePhase::Releasing | GesturePhase::SettlingBack
            ) {
                continue;
            }
            let busy = [gesture.x, gesture.y]
                .iter()
                .any(|v| graph.is_animating(*v) || graph.has_pending(*v));
            if !busy {
                tracing::debug!(?id, from = ?gesture.phase, "gesture settled");
                gesture.phase = GesturePhase::Idle;
                gesture.session = None;
                idle.push(id);
            }
        }
        idle
    }

    fn enqueue(&mut self, id: GestureId, event: PointerEvent, point: Option<Point>) -> Result<()> {
        let gesture = self
            .gestures
            .get_mut(id)
            .ok_or(MotionError::UnknownGesture(id))?;
        if let Some(point) = point {
            ensure_finite("pointer x", point.x)?;
            ensure_finite("pointer y", point.y)?;
        }
        gesture.queue.push(event);
        Ok(())
    }
}

impl Gesture {
    fn press(&mut self, graph: &mut ValueGraph, point: Point, timestamp: f64) -> Result<()> {
        let value_origin = match &self.session {
            Some(session) if !session.released => session.position,
            _ => Point::new(
                graph.get_scalar(self.x).unwrap_or(0.0),
                graph.get_scalar(self.y).unwrap_or(0.0),
            ),
        };
        graph.stop(self.x)?;
        graph.stop(self.y)?;

        let mut tracker = VelocityTracker::new(self.window);
        tracker.push(timestamp, value_origin);
        self.session = Some(Session {
            pointer_origin: point,
            value_origin,
            position: value_origin,
            last_timestamp: timestamp,
            locked: None,
            tracker,
            released: false,
        });
        tracing::debug!(element = ?self.element, from = ?self.phase, "drag started");
        self.phase = GesturePhase::Dragging;
        Ok(())
    }

    fn drag(
        &mut self,
        graph: &mut ValueGraph,
        settings: &GestureSettings,
        point: Point,
        timestamp: f64,
    ) -> Result<()> {
        let Some(session) = self.session.as_mut().filter(|s| !s.released) else {
            tracing::trace!(element = ?self.element, "pointer move without drag");
            return Ok(());
        };
        let delta = point - session.pointer_origin;

        if self.config.direction_lock && self.config.axis == DragAxis::Free {
            if session.locked.is_none() {
                let threshold = settings.direction_lock_threshold;
                if delta.x.abs() <= threshold && delta.y.abs() <= threshold {
                    return Ok(());
                }
                let axis = if delta.x.abs() >= delta.y.abs() {
                    DragAxis::X
                } else {
                    DragAxis::Y
                };
                tracing::debug!(element = ?self.element, ?axis, "direction locked");
                session.locked = Some(axis);
            }
        }

        let axis = session.locked.unwrap_or(self.config.axis);
        let offset = Vec2::new(
            if axis.allows_x() { delta.x } else { 0.0 },
            if axis.allows_y() { delta.y } else { 0.0 },
        );
        let raw = session.value_origin + offset;
        let constraints = &self.config.constraints;
        let extent = settings.rubber_band_extent;
        let position = Point::new(
            rubber_band(raw.x, &constraints.x, self.elastic, extent),
            rubber_band(raw.y, &constraints.y, self.elastic, extent),
        );

        graph.jump(self.x, position.x)?;
        graph.jump(self.y, position.y)?;
        session.tracker.push(timestamp, raw);
        session.position = position;
        session.last_timestamp = timestamp;
        Ok(())
    }

    fn release(
        &mut self,
        graph: &mut ValueGraph,
        settings: &GestureSettings,
        timestamp: f64,
    ) -> Result<()> {
        let Some(session) = self.session.as_mut().filter(|s| !s.released) else {
            return Ok(());
        };
        session.released = true;

        let axis = session.locked.unwrap_or(self.config.axis);
        let mut velocity = session.tracker.velocity(timestamp);
        if !axis.allows_x() {
            velocity.x = 0.0;
        }
        if !axis.allows_y() {
            velocity.y = 0.0;
        }
        let position = session.position;
        let info = ReleaseInfo {
            point: position,
            offset: position - session.value_origin,
            velocity,
        };

        let mut action = match self.config.on_release.as_mut() {
            Some(handler) => handler(&info),
            None => ReleaseAction::Default,
        };
        if let ReleaseAction::SpringTo { spec, .. } = &action {
            if let Err(err) = spec.validate() {
                tracing::warn!(element = ?self.element, %err, "invalid release spec, using default");
                action = ReleaseAction::Default;
            }
        }

        let constraints = self.config.constraints;
        let outside = !constraints.contains(position);
        let phase = match action {
            ReleaseAction::SpringTo { target, spec } => {
                graph.set_velocity(self.x, &[velocity.x])?;
                graph.set_target(self.x, target.x, &spec)?;
                graph.set_velocity(self.y, &[velocity.y])?;
                graph.set_target(self.y, target.y, &spec)?;
                GesturePhase::Releasing
            }
            ReleaseAction::Default => {
                let axes = [
                    (self.x, position.x, velocity.x, constraints.x, axis.allows_x()),
                    (self.y, position.y, velocity.y, constraints.y, axis.allows_y()),
                ];
                for (id, at, speed, bounds, allowed) in axes {
                    if allowed {
                        self.settle_axis(graph, settings, id, at, speed, bounds)?;
                    }
                }
                if outside {
                    GesturePhase::SettlingBack
                } else {
                    GesturePhase::Releasing
                }
            }
        };

        tracing::debug!(
            element = ?self.element,
            ?phase,
            vx = velocity.x,
            vy = velocity.y,
            "drag released"
        );
        self.phase = phase;
        Ok(())
    }

    fn settle_axis(
        &self,
        graph: &mut ValueGraph,
        settings: &GestureSettings,
        id: ValueId,
        at: f32,
        velocity: f32,
        bounds: Bounds,
    ) -> Result<()> {
        if !self.config.momentum {
            graph.set_velocity(id, &[0.0])?;
            graph.set_target(id, bounds.clamp(at), &settings.snap)?;
            return Ok(());
        }

        let bounce = settings.bounce_spring();
        if let Some(bound) = bounds.crossed(at) {
            graph.set_velocity(id, &[velocity])?;
            graph.set_target(
                id,
                bound,
                &TransitionSpec::physics(bounce.stiffness, bounce.damping, bounce.mass),
            )?;
        } else {
            let bounce = (self.elastic > 0.0).then_some(bounce);
            graph.start_decay(id, velocity, settings.decay, bounds, bounce)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: f32 = 1.0 / 60.0;

    fn frame(controller: &mut GestureController, graph: &mut ValueGraph) {
        controller.process(graph);
        graph.tick(FRAME);
        controller.update_phases(graph);
    }

    fn position(graph: &ValueGraph, controller: &GestureController, id: GestureId) -> Point {
        let (x, y) = controller.values(id).unwrap();
        Point::new(graph.get_scalar(x).unwrap(), graph.get_scalar(y).unwrap())
    }

    fn run_until_idle(controller: &mut GestureController, graph: &mut ValueGraph, id: GestureId) {
        for _ in 0..600 {
            frame(controller, graph);
            if controller.phase(id) == Some(GesturePhase::Idle) {
                return;
            }
        }
        panic!("gesture never settled");
    }

    #[test]
    fn test_rubber_band() {
        let bounds = Bounds::between(-100.0, 0.0).unwrap();
        assert_eq!(rubber_band(-50.0, &bounds, 0.5, 300.0), -50.0);
        assert_eq!(rubber_band(80.0, &bounds, 0.0, 300.0), 0.0);
        assert_eq!(rubber_band(-180.0, &bounds, 0.0, 300.0), -100.0);

        let stretched = rubber_band(300.0, &bounds, 0.5, 300.0);
        assert!((stretched - 150.0 * std::f32::consts::LN_2).abs() < 1e-3);

        // Full elastic still compresses, but only slightly near the bound
        let near = rubber_band(10.0, &bounds, 1.0, 300.0);
        assert!(near < 10.0 && near > 9.8);
    }

    #[test]
    fn test_drag_follows_pointer_on_axis() {
        let mut graph = ValueGraph::new();
        let mut controller = GestureController::new(GestureSettings::default());
        let id = controller
            .register(
                &mut graph,
                ElementId(1),
                GestureConfig::new().axis(DragAxis::X),
            )
            .unwrap();

        controller
            .pointer_down(id, Point::new(100.0, 100.0), 0.0)
            .unwrap();
        controller
            .pointer_move(id, Point::new(150.0, 130.0), 0.016)
            .unwrap();
        frame(&mut controller, &mut graph);

        assert_eq!(controller.phase(id), Some(GesturePhase::Dragging));
        assert_eq!(position(&graph, &controller, id), Point::new(50.0, 0.0));
    }

    #[test]
    fn test_elastic_zero_never_leaves_bounds() {
        let mut graph = ValueGraph::new();
        let mut controller = GestureController::new(GestureSettings::default());
        let constraints = Constraints::rect(-100.0, 100.0, -50.0, 50.0).unwrap();
        let id = controller
            .register(
                &mut graph,
                ElementId(1),
                GestureConfig::new().constraints(constraints).elastic(0.0),
            )
            .unwrap();

        controller.pointer_down(id, Point::ZERO, 0.0).unwrap();
        let mut t = 0.0;
        for i in 1..40 {
            t += 1.0 / 60.0;
            let point = Point::new(i as f32 * 25.0, i as f32 * -12.0);
            controller.pointer_move(id, point, t).unwrap();
            frame(&mut controller, &mut graph);
            assert!(constraints.contains(position(&graph, &controller, id)));
        }
        controller
            .pointer_up(id, Point::new(1000.0, -480.0), t)
            .unwrap();
        for _ in 0..300 {
            frame(&mut controller, &mut graph);
            assert!(constraints.contains(position(&graph, &controller, id)));
        }
        assert_eq!(controller.phase(id), Some(GesturePhase::Idle));
    }

    #[test]
    fn test_release_without_momentum_has_zero_velocity() {
        let mut graph = ValueGraph::new();
        let mut controller = GestureController::new(GestureSettings::default());
        let id = controller
            .register(
                &mut graph,
                ElementId(1),
                GestureConfig::new()
                    .axis(DragAxis::X)
                    .constraints(Constraints::horizontal(-100.0, 0.0).unwrap())
                    .elastic(0.5)
                    .momentum(false),
            )
            .unwrap();
        let (x, _) = controller.values(id).unwrap();

        controller.pointer_down(id, Point::ZERO, 0.0).unwrap();
        for i in 1..=6 {
            let t = i as f64 / 60.0;
            controller
                .pointer_move(id, Point::new(i as f32 * 40.0, 0.0), t)
                .unwrap();
        }
        controller
            .pointer_up(id, Point::new(240.0, 0.0), 0.1)
            .unwrap();
        controller.process(&mut graph);
        graph.update(0.0);

        assert_eq!(graph.scalar_velocity(x), Some(0.0));
        assert!(graph.get_scalar(x).unwrap() > 0.0);
        controller.update_phases(&graph);
        assert_eq!(controller.phase(id), Some(GesturePhase::SettlingBack));

        run_until_idle(&mut controller, &mut graph, id);
        assert_eq!(graph.get_scalar(x), Some(0.0));
    }

    #[test]
    fn test_momentum_carries_value_past_release_point() {
        let mut graph = ValueGraph::new();
        let mut controller = GestureController::new(GestureSettings::default());
        let id = controller
            .register(&mut graph, ElementId(1), GestureConfig::new().axis(DragAxis::X))
            .unwrap();
        let (x, _) = controller.values(id).unwrap();

        controller.pointer_down(id, Point::ZERO, 0.0).unwrap();
        for i in 1..=5 {
            controller
                .pointer_move(id, Point::new(i as f32 * 10.0, 0.0), i as f64 * 0.01)
                .unwrap();
        }
        controller
            .pointer_up(id, Point::new(50.0, 0.0), 0.05)
            .unwrap();
        run_until_idle(&mut controller, &mut graph, id);

        // ~1000 px/s decays to a rest point well past the release position
        let rest = graph.get_scalar(x).unwrap();
        assert!(rest > 150.0);
    }

    #[test]
    fn test_direction_lock_picks_first_axis() {
        let mut graph = ValueGraph::new();
        let mut controller = GestureController::new(GestureSettings::default());
        let id = controller
            .register(
                &mut graph,
                ElementId(1),
                GestureConfig::new().direction_lock(true),
            )
            .unwrap();

        controller.pointer_down(id, Point::ZERO, 0.0).unwrap();
        controller
            .pointer_move(id, Point::new(2.0, 1.0), 0.01)
            .unwrap();
        frame(&mut controller, &mut graph);
        assert_eq!(position(&graph, &controller, id), Point::ZERO);

        controller
            .pointer_move(id, Point::new(10.0, 4.0), 0.02)
            .unwrap();
        controller
            .pointer_move(id, Point::new(20.0, 40.0), 0.03)
            .unwrap();
        frame(&mut controller, &mut graph);
        assert_eq!(position(&graph, &controller, id), Point::new(20.0, 0.0));
    }

    #[test]
    fn test_cancel_releases_at_last_sample() {
        let mut graph = ValueGraph::new();
        let mut controller = GestureController::new(GestureSettings::default());
        let id = controller
            .register(
                &mut graph,
                ElementId(1),
                GestureConfig::new().momentum(false),
            )
            .unwrap();

        controller.pointer_down(id, Point::ZERO, 0.0).unwrap();
        controller
            .pointer_move(id, Point::new(30.0, 30.0), 0.05)
            .unwrap();
        controller.pointer_cancel(id, 5.0).unwrap();
        frame(&mut controller, &mut graph);
        assert_ne!(controller.phase(id), Some(GesturePhase::Dragging));

        run_until_idle(&mut controller, &mut graph, id);
        assert_eq!(position(&graph, &controller, id), Point::new(30.0, 30.0));
    }

    #[test]
    fn test_on_release_spring_to() {
        let mut graph = ValueGraph::new();
        let mut controller = GestureController::new(GestureSettings::default());
        let seen = std::rc::Rc::new(std::cell::Cell::new(None));
        let record = seen.clone();
        let id = controller
            .register(
                &mut graph,
                ElementId(1),
                GestureConfig::new().axis(DragAxis::X).on_release(move |info| {
                    record.set(Some(*info));
                    ReleaseAction::SpringTo {
                        target: Point::new(-256.0, 0.0),
                        spec: TransitionSpec::spring(0.4, 0.15),
                    }
                }),
            )
            .unwrap();

        controller.pointer_down(id, Point::ZERO, 0.0).unwrap();
        controller
            .pointer_move(id, Point::new(-40.0, 0.0), 0.02)
            .unwrap();
        controller
            .pointer_up(id, Point::new(-80.0, 0.0), 0.04)
            .unwrap();
        run_until_idle(&mut controller, &mut graph, id);

        let info = seen.get().unwrap();
        assert_eq!(info.offset, Vec2::new(-80.0, 0.0));
        assert!((info.velocity.x + 2000.0).abs() < 1.0);
        assert_eq!(position(&graph, &controller, id), Point::new(-256.0, 0.0));
    }

    #[test]
    fn test_rejects_bad_elastic_and_unknown_gesture() {
        let mut graph = ValueGraph::new();
        let mut controller = GestureController::new(GestureSettings::default());
        assert!(controller
            .register(&mut graph, ElementId(1), GestureConfig::new().elastic(1.5))
            .is_err());

        let id = controller
            .register(&mut graph, ElementId(1), GestureConfig::new())
            .unwrap();
        controller.unregister(&mut graph, id).unwrap();
        assert_eq!(
            controller.pointer_down(id, Point::ZERO, 0.0),
            Err(MotionError::UnknownGesture(id))
        );
        assert!(graph.is_empty());
    }
}
