//! Reactive value graph
//!
//! An arena of motion values. Source values own at most one active animation
//! (one trajectory per channel); derived values are pure functions of other
//! values and are recomputed in topological order, at most once per tick and
//! only when one of their inputs changed.
//!
//! Mutations requested between ticks are validated immediately but only
//! recorded; they take effect atomically at the start of the next tick:
//!
//! 1. `apply_intents` - queued targets, jumps and stops
//! 2. `advance` - every active trajectory steps by `dt`
//! 3. `propagate` - derived values recompute
//! 4. `notify` - subscribers of changed values run

use crate::decay::{Bounds, DecayConfig};
use crate::error::{AnimationError, GraphCycleError, Result};
use crate::mapping::RangeMap;
use crate::spring::SpringConfig;
use crate::trajectory::{Tolerance, Trajectory, TransitionSpec};
use kinetic_core::error::ensure_finite;
use kinetic_core::{Channels, ConfigurationError, Value};
use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::{new_key_type, SlotMap};
use smallvec::{smallvec, SmallVec};
use std::collections::VecDeque;

new_key_type! {
    /// Handle to a motion value
    pub struct ValueId;
    /// Handle to a value subscription
    pub struct SubscriptionId;
}

type Compute = Box<dyn Fn(&[Value]) -> Value>;
type Subscriber = Box<dyn FnMut(ValueId, &Value)>;

/// One trajectory slot per channel; `None` once that channel settled
type Animation = SmallVec<[Option<Trajectory>; 4]>;

enum NodeKind {
    Source {
        velocity: Channels,
        animation: Option<Animation>,
    },
    Derived {
        inputs: SmallVec<[ValueId; 4]>,
        compute: Compute,
    },
}

struct Node {
    value: Value,
    kind: NodeKind,
    dependents: SmallVec<[ValueId; 4]>,
    subscribers: SmallVec<[SubscriptionId; 2]>,
}

impl Node {
    fn is_derived(&self) -> bool {
        matches!(self.kind, NodeKind::Derived { .. })
    }
}

struct Subscription {
    value: ValueId,
    callback: Subscriber,
}

enum Intent {
    Target {
        id: ValueId,
        target: Value,
        spec: TransitionSpec,
    },
    Jump {
        id: ValueId,
        value: Value,
    },
    Reanchor {
        id: ValueId,
        value: Value,
    },
    SetVelocity {
        id: ValueId,
        velocity: Channels,
    },
    Stop(ValueId),
    Decay {
        id: ValueId,
        velocity: f32,
        config: DecayConfig,
        bounds: Bounds,
        bounce: Option<SpringConfig>,
    },
}

/// What happened during one tick
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    /// Values whose animation settled this tick
    pub settled: Vec<ValueId>,
    /// Values whose current value changed, sources before derivations
    pub changed: Vec<ValueId>,
    /// Values whose trajectory or derivation produced a non-finite result
    pub failed: Vec<ValueId>,
    /// Number of derivation functions evaluated
    pub derivations_computed: usize,
}

impl TickReport {
    /// Fold a later pass of the same frame into this report
    pub fn merge(&mut self, later: TickReport) {
        for id in later.changed {
            if !self.changed.contains(&id) {
                self.changed.push(id);
            }
        }
        for id in later.settled {
            if !self.settled.contains(&id) {
                self.settled.push(id);
            }
        }
        for id in later.failed {
            if !self.failed.contains(&id) {
                self.failed.push(id);
            }
        }
        self.derivations_computed += later.derivations_computed;
    }
}

/// The reactive motion value graph
pub struct ValueGraph {
    nodes: SlotMap<ValueId, Node>,
    subscriptions: SlotMap<SubscriptionId, Subscription>,
    intents: Vec<Intent>,
    /// Derived values whose inputs were rebound since the last tick
    dirty: FxHashSet<ValueId>,
    /// Cached topological order of derived values
    order: Vec<ValueId>,
    order_stale: bool,
    tolerance: Tolerance,
}

impl ValueGraph {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            subscriptions: SlotMap::with_key(),
            intents: Vec::new(),
            dirty: FxHashSet::default(),
            order: Vec::new(),
            order_stale: false,
            tolerance: Tolerance::default(),
        }
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    /// Create a source value at rest
    pub fn create_value(&mut self, initial: impl Into<Value>) -> ValueId {
        let value = initial.into();
        let channels = value.kind().channel_count();
        self.nodes.insert(Node {
            value,
            kind: NodeKind::Source {
                velocity: smallvec![0.0; channels],
                animation: None,
            },
            dependents: SmallVec::new(),
            subscribers: SmallVec::new(),
        })
    }

    /// Animate a source value to `target` with `spec`.
    ///
    /// Current value and velocity carry over into the new trajectory.
    pub fn set_target(
        &mut self,
        id: ValueId,
        target: impl Into<Value>,
        spec: &TransitionSpec,
    ) -> Result<()> {
        let target = target.into();
        self.check_source_value(id, &target)?;
        spec.validate()?;
        self.intents.push(Intent::Target {
            id,
            target,
            spec: *spec,
        });
        Ok(())
    }

    /// Set the value instantly, cancelling its animation and zeroing velocity
    pub fn jump(&mut self, id: ValueId, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.check_source_value(id, &value)?;
        self.intents.push(Intent::Jump { id, value });
        Ok(())
    }

    /// Set the value instantly, keeping velocity and any running animation
    pub fn reanchor(&mut self, id: ValueId, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.check_source_value(id, &value)?;
        self.intents.push(Intent::Reanchor { id, value });
        Ok(())
    }

    /// Replace the per-channel velocity of a source value
    pub fn set_velocity(&mut self, id: ValueId, velocity: &[f32]) -> Result<()> {
        let node = self.source(id)?;
        let expected = node.value.kind().channel_count();
        if velocity.len() != expected {
            return Err(ConfigurationError::OutOfRange {
                name: "velocity channels",
                value: velocity.len() as f32,
                min: expected as f32,
                max: expected as f32,
            }
            .into());
        }
        for &v in velocity {
            ensure_finite("velocity", v)?;
        }
        self.intents.push(Intent::SetVelocity {
            id,
            velocity: SmallVec::from_slice(velocity),
        });
        Ok(())
    }

    /// Cancel the active animation, keeping the current value
    pub fn stop(&mut self, id: ValueId) -> Result<()> {
        self.source(id)?;
        self.intents.push(Intent::Stop(id));
        Ok(())
    }

    /// Start momentum on a scalar source value.
    ///
    /// When the value leaves `bounds` the decay hands off to a `bounce`
    /// spring targeting the crossed boundary; without one it stops on the
    /// boundary.
    pub fn start_decay(
        &mut self,
        id: ValueId,
        velocity: f32,
        config: DecayConfig,
        bounds: Bounds,
        bounce: Option<SpringConfig>,
    ) -> Result<()> {
        let node = self.source(id)?;
        if node.value.as_scalar().is_none() {
            return Err(AnimationError::KindMismatch {
                expected: kinetic_core::ValueKind::Scalar,
                found: node.value.kind(),
            });
        }
        ensure_finite("velocity", velocity)?;
        config.validate()?;
        if let Some(bounce) = &bounce {
            bounce.validate()?;
        }
        self.intents.push(Intent::Decay {
            id,
            velocity,
            config,
            bounds,
            bounce,
        });
        Ok(())
    }

    /// Derive a value through a range map.
    ///
    /// The map input is the sum of the first channel of every input, so
    /// offsets compose by listing several sources.
    pub fn derive(&mut self, inputs: &[ValueId], map: RangeMap) -> Result<ValueId> {
        self.derive_with(inputs, move |values| {
            let x: f32 = values
                .iter()
                .map(|v| v.channels().first().copied().unwrap_or(0.0))
                .sum();
            map.apply(x)
        })
    }

    /// Derive a value through an arbitrary pure function of its inputs
    pub fn derive_with<F>(&mut self, inputs: &[ValueId], compute: F) -> Result<ValueId>
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        for &input in inputs {
            if !self.nodes.contains_key(input) {
                return Err(AnimationError::UnknownValue(input));
            }
        }

        let values = self.input_values(inputs);
        let value = compute(&values);
        let id = self.nodes.insert(Node {
            value,
            kind: NodeKind::Derived {
                inputs: SmallVec::from_slice(inputs),
                compute: Box::new(compute),
            },
            dependents: SmallVec::new(),
            subscribers: SmallVec::new(),
        });
        self.link(id, inputs);
        self.order_stale = true;
        Ok(id)
    }

    /// Replace the inputs of a derived value; recomputed on the next tick
    pub fn rebind(&mut self, derived: ValueId, inputs: &[ValueId]) -> Result<()> {
        let node = self
            .nodes
            .get(derived)
            .ok_or(AnimationError::UnknownValue(derived))?;
        if !node.is_derived() {
            return Err(AnimationError::NotDerived(derived));
        }
        for &input in inputs {
            if !self.nodes.contains_key(input) {
                return Err(AnimationError::UnknownValue(input));
            }
        }
        if self.reaches_any(derived, inputs) {
            return Err(GraphCycleError { derived }.into());
        }

        let old = match &self.nodes[derived].kind {
            NodeKind::Derived { inputs, .. } => inputs.clone(),
            NodeKind::Source { .. } => SmallVec::new(),
        };
        for input in old {
            if let Some(node) = self.nodes.get_mut(input) {
                node.dependents.retain(|d| *d != derived);
            }
        }
        if let NodeKind::Derived { inputs: current, .. } = &mut self.nodes[derived].kind {
            *current = SmallVec::from_slice(inputs);
        }
        self.link(derived, inputs);
        self.dirty.insert(derived);
        self.order_stale = true;
        Ok(())
    }

    /// Remove a value and, transitively, every value derived from it
    pub fn remove(&mut self, id: ValueId) -> Result<()> {
        if !self.nodes.contains_key(id) {
            return Err(AnimationError::UnknownValue(id));
        }

        let mut doomed = vec![id];
        let mut seen: FxHashSet<ValueId> = FxHashSet::default();
        seen.insert(id);
        let mut cursor = 0;
        while cursor < doomed.len() {
            for &dependent in &self.nodes[doomed[cursor]].dependents {
                if seen.insert(dependent) {
                    doomed.push(dependent);
                }
            }
            cursor += 1;
        }

        for &gone in &doomed {
            let Some(node) = self.nodes.remove(gone) else {
                continue;
            };
            if let NodeKind::Derived { inputs, .. } = &node.kind {
                for input in inputs {
                    if let Some(input) = self.nodes.get_mut(*input) {
                        input.dependents.retain(|d| *d != gone);
                    }
                }
            }
            for subscription in node.subscribers {
                self.subscriptions.remove(subscription);
            }
            self.dirty.remove(&gone);
        }
        tracing::trace!(?id, removed = doomed.len(), "removed motion values");
        self.order_stale = true;
        Ok(())
    }

    /// Run `callback` whenever the value changes, after each tick
    pub fn subscribe<F>(&mut self, id: ValueId, callback: F) -> Result<SubscriptionId>
    where
        F: FnMut(ValueId, &Value) + 'static,
    {
        if !self.nodes.contains_key(id) {
            return Err(AnimationError::UnknownValue(id));
        }
        let subscription = self.subscriptions.insert(Subscription {
            value: id,
            callback: Box::new(callback),
        });
        self.nodes[id].subscribers.push(subscription);
        Ok(subscription)
    }

    pub fn unsubscribe(&mut self, subscription: SubscriptionId) -> bool {
        let Some(removed) = self.subscriptions.remove(subscription) else {
            return false;
        };
        if let Some(node) = self.nodes.get_mut(removed.value) {
            node.subscribers.retain(|s| *s != subscription);
        }
        true
    }

    pub fn contains(&self, id: ValueId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: ValueId) -> Option<Value> {
        self.nodes.get(id).map(|node| node.value)
    }

    pub fn get_scalar(&self, id: ValueId) -> Option<f32> {
        self.get(id).and_then(|value| value.as_scalar())
    }

    /// Per-channel velocity; derived values report none
    pub fn velocity(&self, id: ValueId) -> Option<Channels> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Source { velocity, .. } => Some(velocity.clone()),
            NodeKind::Derived { .. } => None,
        }
    }

    pub fn scalar_velocity(&self, id: ValueId) -> Option<f32> {
        self.velocity(id).and_then(|v| v.first().copied())
    }

    pub fn is_animating(&self, id: ValueId) -> bool {
        matches!(
            self.nodes.get(id).map(|node| &node.kind),
            Some(NodeKind::Source {
                animation: Some(_),
                ..
            })
        )
    }

    /// Whether a queued intent for `id` has not been applied yet
    pub fn has_pending(&self, id: ValueId) -> bool {
        self.intents.iter().any(|intent| intent.value_id() == id)
    }

    /// Whether any value is animating or has pending intents
    pub fn has_active_animations(&self) -> bool {
        !self.intents.is_empty()
            || self.nodes.iter().any(|(_, node)| {
                matches!(
                    node.kind,
                    NodeKind::Source {
                        animation: Some(_),
                        ..
                    }
                )
            })
    }

    /// Where the active animation is heading
    pub fn target(&self, id: ValueId) -> Option<Value> {
        let node = self.nodes.get(id)?;
        let NodeKind::Source {
            velocity,
            animation: Some(animation),
        } = &node.kind
        else {
            return None;
        };
        let current = node.value.channels();
        let channels: Channels = animation
            .iter()
            .enumerate()
            .map(|(i, slot)| match slot {
                Some(trajectory) => trajectory.target(current[i], velocity[i]),
                None => current[i],
            })
            .collect();
        Some(Value::from_channels(node.value.kind(), &channels))
    }

    /// Largest per-channel distance from the active animation's target.
    ///
    /// `None` when the value is at rest; a value whose distance stays large
    /// tick after tick has a spring that cannot settle.
    pub fn distance_to_target(&self, id: ValueId) -> Option<f32> {
        let target = self.target(id)?;
        self.get(id).map(|value| value.distance(&target))
    }

    /// Run one full tick
    pub fn tick(&mut self, dt: f32) -> TickReport {
        let report = self.update(dt);
        self.notify(&report);
        report
    }

    /// Apply intents, advance trajectories and propagate derivations, without
    /// notifying subscribers
    pub fn update(&mut self, dt: f32) -> TickReport {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let mut report = TickReport::default();
        let mut changed: FxHashSet<ValueId> = FxHashSet::default();

        self.apply_intents(&mut changed, &mut report);
        self.advance(dt, &mut changed, &mut report);
        self.propagate(&mut changed, &mut report);

        tracing::trace!(
            dt,
            changed = report.changed.len(),
            settled = report.settled.len(),
            "value graph tick"
        );
        report
    }

    /// Apply queued intents and propagate derivations without advancing time.
    ///
    /// Lets controllers that queue intents after [`update`](Self::update)
    /// have them reflected in the same frame.
    pub fn flush(&mut self) -> TickReport {
        let mut report = TickReport::default();
        if self.intents.is_empty() && self.dirty.is_empty() {
            return report;
        }
        let mut changed: FxHashSet<ValueId> = FxHashSet::default();
        self.apply_intents(&mut changed, &mut report);
        self.propagate(&mut changed, &mut report);
        report
    }

    /// Deliver change notifications for `report`
    pub fn notify(&mut self, report: &TickReport) {
        for &id in &report.changed {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            for subscription in &node.subscribers {
                if let Some(subscription) = self.subscriptions.get_mut(*subscription) {
                    (subscription.callback)(id, &node.value);
                }
            }
        }
    }

    fn apply_intents(&mut self, changed: &mut FxHashSet<ValueId>, report: &mut TickReport) {
        let tolerance = self.tolerance;
        for intent in std::mem::take(&mut self.intents) {
            let id = intent.value_id();
            let Some(node) = self.nodes.get_mut(id) else {
                tracing::debug!(?id, "dropping intent for removed value");
                continue;
            };
            let NodeKind::Source {
                velocity,
                animation,
            } = &mut node.kind
            else {
                continue;
            };

            match intent {
                Intent::Target { target, spec, .. } => {
                    let from = node.value.channels();
                    let to = target.channels();
                    let built: std::result::Result<Animation, _> = from
                        .iter()
                        .zip(to.iter())
                        .map(|(&from, &to)| spec.trajectory(from, to, tolerance).map(Some))
                        .collect();
                    match built {
                        Ok(trajectories) => *animation = Some(trajectories),
                        Err(err) => tracing::warn!(?id, %err, "rejected transition"),
                    }
                }
                Intent::Jump { value, .. } => {
                    *animation = None;
                    velocity.iter_mut().for_each(|v| *v = 0.0);
                    if value != node.value {
                        node.value = value;
                        mark_changed(id, changed, report);
                    }
                }
                Intent::Reanchor { value, .. } => {
                    if value != node.value {
                        node.value = value;
                        mark_changed(id, changed, report);
                    }
                }
                Intent::SetVelocity { velocity: next, .. } => {
                    *velocity = next;
                }
                Intent::Stop(_) => {
                    *animation = None;
                    velocity.iter_mut().for_each(|v| *v = 0.0);
                }
                Intent::Decay {
                    velocity: initial,
                    config,
                    bounds,
                    bounce,
                    ..
                } => {
                    let value = node.value.as_scalar().unwrap_or(0.0);
                    velocity[0] = initial;
                    let trajectory =
                        Trajectory::decay(config, bounds, bounce, value, initial, tolerance);
                    *animation = Some(smallvec![Some(trajectory)]);
                }
            }
        }
    }

    fn advance(&mut self, dt: f32, changed: &mut FxHashSet<ValueId>, report: &mut TickReport) {
        for (id, node) in self.nodes.iter_mut() {
            let NodeKind::Source {
                velocity,
                animation,
            } = &mut node.kind
            else {
                continue;
            };
            let Some(trajectories) = animation.as_mut() else {
                continue;
            };

            let mut values = node.value.channels();
            let mut velocities = velocity.clone();
            for (channel, slot) in trajectories.iter_mut().enumerate() {
                if let Some(trajectory) = slot {
                    let step = trajectory.step(values[channel], velocities[channel], dt);
                    values[channel] = step.value;
                    velocities[channel] = step.velocity;
                    if step.settled {
                        *slot = None;
                    }
                }
            }
            let done = trajectories.iter().all(Option::is_none);

            if !values.iter().chain(velocities.iter()).all(|c| c.is_finite()) {
                tracing::warn!(?id, value = ?node.value, "trajectory diverged; keeping last finite value");
                *animation = None;
                velocity.iter_mut().for_each(|v| *v = 0.0);
                report.failed.push(id);
                continue;
            }

            *velocity = velocities;
            let next = Value::from_channels(node.value.kind(), &values);
            if next != node.value {
                node.value = next;
                mark_changed(id, changed, report);
            }
            if done {
                *animation = None;
                report.settled.push(id);
            }
        }
    }

    fn propagate(&mut self, changed: &mut FxHashSet<ValueId>, report: &mut TickReport) {
        if self.order_stale {
            self.rebuild_order();
        }
        let dirty = std::mem::take(&mut self.dirty);

        for &id in &self.order {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            let NodeKind::Derived { inputs, compute } = &node.kind else {
                continue;
            };
            if !dirty.contains(&id) && !inputs.iter().any(|input| changed.contains(input)) {
                continue;
            }

            let values: SmallVec<[Value; 4]> = inputs
                .iter()
                .filter_map(|input| self.nodes.get(*input).map(|n| n.value))
                .collect();
            let next = compute(&values);
            report.derivations_computed += 1;

            if !next.is_finite() {
                tracing::warn!(?id, "derivation produced a non-finite value; keeping last finite value");
                report.failed.push(id);
                continue;
            }
            if let Some(node) = self.nodes.get_mut(id) {
                if next != node.value {
                    node.value = next;
                    mark_changed(id, changed, report);
                }
            }
        }
    }

    /// Kahn's algorithm over derived values; sources are implicit roots
    fn rebuild_order(&mut self) {
        let mut indegree: FxHashMap<ValueId, usize> = FxHashMap::default();
        for (id, node) in &self.nodes {
            if let NodeKind::Derived { inputs, .. } = &node.kind {
                let mut derived_inputs: SmallVec<[ValueId; 4]> = SmallVec::new();
                for input in inputs {
                    let is_derived = self.nodes.get(*input).is_some_and(Node::is_derived);
                    if is_derived && !derived_inputs.contains(input) {
                        derived_inputs.push(*input);
                    }
                }
                indegree.insert(id, derived_inputs.len());
            }
        }

        let mut queue: VecDeque<ValueId> = self
            .nodes
            .keys()
            .filter(|id| indegree.get(id) == Some(&0))
            .collect();
        self.order.clear();
        while let Some(id) = queue.pop_front() {
            self.order.push(id);
            for dependent in &self.nodes[id].dependents {
                if let Some(degree) = indegree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(*dependent);
                    }
                }
            }
        }

        if self.order.len() != indegree.len() {
            tracing::warn!(
                ordered = self.order.len(),
                derived = indegree.len(),
                "derivation order is incomplete"
            );
        }
        self.order_stale = false;
    }

    /// Whether `from` or anything derived from it is one of `targets`
    fn reaches_any(&self, from: ValueId, targets: &[ValueId]) -> bool {
        let mut stack = vec![from];
        let mut seen: FxHashSet<ValueId> = FxHashSet::default();
        while let Some(id) = stack.pop() {
            if targets.contains(&id) {
                return true;
            }
            if !seen.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(id) {
                stack.extend(node.dependents.iter().copied());
            }
        }
        false
    }

    fn link(&mut self, derived: ValueId, inputs: &[ValueId]) {
        for &input in inputs {
            if let Some(node) = self.nodes.get_mut(input) {
                if !node.dependents.contains(&derived) {
                    node.dependents.push(derived);
                }
            }
        }
    }

    fn input_values(&self, inputs: &[ValueId]) -> SmallVec<[Value; 4]> {
        inputs
            .iter()
            .filter_map(|id| self.nodes.get(*id).map(|node| node.value))
            .collect()
    }

    fn source(&self, id: ValueId) -> Result<&Node> {
        let node = self.nodes.get(id).ok_or(AnimationError::UnknownValue(id))?;
        if node.is_derived() {
            return Err(AnimationError::NotASource(id));
        }
        Ok(node)
    }

    fn check_source_value(&self, id: ValueId, value: &Value) -> Result<()> {
        let node = self.source(id)?;
        if node.value.kind() != value.kind() {
            return Err(AnimationError::KindMismatch {
                expected: node.value.kind(),
                found: value.kind(),
            });
        }
        for channel in value.channels() {
            ensure_finite("target", channel)?;
        }
        Ok(())
    }
}

impl Default for ValueGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl Intent {
    fn value_id(&self) -> ValueId {
        match self {
            Intent::Target { id, .. }
            | Intent::Jump { id, .. }
            | Intent::Reanchor { id, .. }
            | Intent::SetVelocity { id, .. }
            | Intent::Decay { id, .. } => *id,
            Intent::Stop(id) => *id,
        }
    }
}

fn mark_changed(id: ValueId, changed: &mut FxHashSet<ValueId>, report: &mut TickReport) {
    if changed.insert(id) {
        report.changed.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::easing::Easing;
    use kinetic_core::Color;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn settle(graph: &mut ValueGraph) -> usize {
        for frame in 0..1000 {
            graph.tick(1.0 / 60.0);
            if !graph.has_active_animations() {
                return frame;
            }
        }
        panic!("graph never settled");
    }

    #[test]
    fn test_set_target_applies_at_next_tick() {
        let mut graph = ValueGraph::new();
        let x = graph.create_value(0.0);
        graph
            .set_target(x, 100.0, &TransitionSpec::default())
            .unwrap();

        // Recorded, not yet applied
        assert!(!graph.is_animating(x));
        assert_eq!(graph.get_scalar(x), Some(0.0));

        graph.tick(1.0 / 60.0);
        assert!(graph.is_animating(x));
        assert!(graph.get_scalar(x).unwrap() > 0.0);

        settle(&mut graph);
        assert_eq!(graph.get_scalar(x), Some(100.0));
        assert_eq!(graph.scalar_velocity(x), Some(0.0));
    }

    #[test]
    fn test_invalid_requests_fail_synchronously() {
        let mut graph = ValueGraph::new();
        let x = graph.create_value(0.0);

        assert!(matches!(
            graph.set_target(x, 1.0, &TransitionSpec::spring(0.3, 1.5)),
            Err(AnimationError::Configuration(ConfigurationError::Bounce(_)))
        ));
        assert!(matches!(
            graph.set_target(x, Color::WHITE, &TransitionSpec::default()),
            Err(AnimationError::KindMismatch { .. })
        ));
        assert!(graph.jump(x, f32::NAN).is_err());

        let derived = graph
            .derive(&[x], RangeMap::new(&[0.0, 1.0], &[0.0, 1.0]).unwrap())
            .unwrap();
        assert!(matches!(
            graph.set_target(derived, 1.0, &TransitionSpec::default()),
            Err(AnimationError::NotASource(_))
        ));
        assert!(!graph.has_active_animations());
    }

    #[test]
    fn test_retarget_preserves_velocity() {
        let mut graph = ValueGraph::new();
        let x = graph.create_value(0.0);
        graph
            .set_target(x, 100.0, &TransitionSpec::spring(0.4, 0.0))
            .unwrap();
        for _ in 0..5 {
            graph.tick(1.0 / 60.0);
        }
        let value = graph.get_scalar(x).unwrap();
        let velocity = graph.scalar_velocity(x).unwrap();
        assert!(velocity > 0.0);

        graph
            .set_target(x, -100.0, &TransitionSpec::spring(0.4, 0.0))
            .unwrap();
        graph.tick(0.0);
        // A zero-length step leaves both untouched
        assert!((graph.get_scalar(x).unwrap() - value).abs() < 1e-3);
        assert!((graph.scalar_velocity(x).unwrap() - velocity).abs() < 1e-3);

        // Still moving forward before turning around
        graph.tick(1.0 / 120.0);
        assert!(graph.get_scalar(x).unwrap() > value);
    }

    #[test]
    fn test_flush_applies_intents_without_advancing() {
        let mut graph = ValueGraph::new();
        let x = graph.create_value(0.0);
        let doubled = graph
            .derive(&[x], RangeMap::new(&[0.0, 100.0], &[0.0, 200.0]).unwrap())
            .unwrap();
        graph.tick(1.0 / 60.0);

        graph.reanchor(x, 40.0).unwrap();
        graph
            .set_target(x, 0.0, &TransitionSpec::spring(0.3, 0.0))
            .unwrap();
        let report = graph.flush();
        assert_eq!(graph.get_scalar(x), Some(40.0));
        assert_eq!(graph.get_scalar(doubled), Some(80.0));
        assert_eq!(report.changed, vec![x, doubled]);
        assert!(graph.is_animating(x));
        assert!(!graph.has_pending(x));

        // Nothing queued: nothing recomputed
        assert_eq!(graph.flush().derivations_computed, 0);
    }

    #[test]
    fn test_report_merge_keeps_first_pass_order() {
        let mut graph = ValueGraph::new();
        let a = graph.create_value(0.0);
        let b = graph.create_value(0.0);
        let mut first = TickReport {
            changed: vec![a],
            derivations_computed: 1,
            ..Default::default()
        };
        first.merge(TickReport {
            changed: vec![b, a],
            settled: vec![b],
            derivations_computed: 2,
            ..Default::default()
        });
        assert_eq!(first.changed, vec![a, b]);
        assert_eq!(first.settled, vec![b]);
        assert_eq!(first.derivations_computed, 3);
    }

    #[test]
    fn test_jump_and_reanchor() {
        let mut graph = ValueGraph::new();
        let x = graph.create_value(0.0);
        graph
            .set_target(x, 50.0, &TransitionSpec::default())
            .unwrap();
        for _ in 0..5 {
            graph.tick(1.0 / 60.0);
        }

        graph.reanchor(x, 10.0).unwrap();
        graph.tick(0.0);
        assert_eq!(graph.get_scalar(x), Some(10.0));
        assert!(graph.scalar_velocity(x).unwrap() > 0.0);
        assert!(graph.is_animating(x));

        graph.jump(x, 20.0).unwrap();
        graph.tick(1.0 / 60.0);
        assert_eq!(graph.get_scalar(x), Some(20.0));
        assert_eq!(graph.scalar_velocity(x), Some(0.0));
        assert!(!graph.is_animating(x));
    }

    #[test]
    fn test_color_value_animates_per_channel() {
        let mut graph = ValueGraph::new();
        let color = graph.create_value(Color::BLACK);
        graph
            .set_target(
                color,
                Color::rgb(1.0, 0.5, 0.0),
                &TransitionSpec::tween(0.2, Easing::Linear),
            )
            .unwrap();
        graph.tick(0.1);
        let mid = graph.get(color).unwrap().as_color().unwrap();
        assert!((mid.r - 0.5).abs() < 1e-4);
        assert!((mid.g - 0.25).abs() < 1e-4);
        assert_eq!(mid.b, 0.0);

        settle(&mut graph);
        assert_eq!(
            graph.get(color),
            Some(Value::Color(Color::rgb(1.0, 0.5, 0.0)))
        );
    }

    #[test]
    fn test_derived_value_follows_source() {
        let mut graph = ValueGraph::new();
        let x = graph.create_value(0.0);
        let rotate = graph
            .derive(
                &[x],
                RangeMap::new(&[-150.0, 0.0, 150.0], &[-15.0, 0.0, 15.0]).unwrap(),
            )
            .unwrap();
        assert_eq!(graph.get_scalar(rotate), Some(0.0));

        graph.jump(x, 75.0).unwrap();
        let report = graph.tick(1.0 / 60.0);
        assert_eq!(graph.get_scalar(rotate), Some(7.5));
        assert_eq!(report.changed, vec![x, rotate]);

        graph.jump(x, 1000.0).unwrap();
        graph.tick(1.0 / 60.0);
        assert_eq!(graph.get_scalar(rotate), Some(15.0));
    }

    #[test]
    fn test_derive_sums_inputs() {
        let mut graph = ValueGraph::new();
        let base = graph.create_value(10.0);
        let offset = graph.create_value(5.0);
        let total = graph
            .derive(&[base, offset], RangeMap::new(&[0.0, 100.0], &[0.0, 100.0]).unwrap())
            .unwrap();
        assert_eq!(graph.get_scalar(total), Some(15.0));
    }

    #[test]
    fn test_diamond_computes_each_derivation_once() {
        let mut graph = ValueGraph::new();
        let source = graph.create_value(1.0);
        let calls = Rc::new(RefCell::new(0));

        let left = graph
            .derive_with(&[source], |v| Value::Scalar(v[0].as_scalar().unwrap_or(0.0) * 2.0))
            .unwrap();
        let right = graph
            .derive_with(&[source], |v| Value::Scalar(v[0].as_scalar().unwrap_or(0.0) + 1.0))
            .unwrap();
        let counter = calls.clone();
        let sum = graph
            .derive_with(&[left, right], move |v| {
                *counter.borrow_mut() += 1;
                Value::Scalar(v.iter().filter_map(Value::as_scalar).sum())
            })
            .unwrap();
        *calls.borrow_mut() = 0;

        graph.jump(source, 3.0).unwrap();
        let report = graph.tick(1.0 / 60.0);
        assert_eq!(graph.get_scalar(sum), Some(6.0 + 4.0));
        assert_eq!(*calls.borrow(), 1);
        assert_eq!(report.derivations_computed, 3);

        // Nothing changed, nothing recomputed
        let report = graph.tick(1.0 / 60.0);
        assert_eq!(report.derivations_computed, 0);
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn test_rebind_rejects_cycles() {
        let mut graph = ValueGraph::new();
        let source = graph.create_value(0.0);
        let identity = |v: &[Value]| v.first().copied().unwrap_or_default();
        let a = graph.derive_with(&[source], identity).unwrap();
        let b = graph.derive_with(&[a], identity).unwrap();

        assert_eq!(
            graph.rebind(a, &[b]),
            Err(AnimationError::GraphCycle(GraphCycleError { derived: a }))
        );
        assert_eq!(
            graph.rebind(a, &[a]),
            Err(AnimationError::GraphCycle(GraphCycleError { derived: a }))
        );
        assert!(matches!(
            graph.rebind(source, &[a]),
            Err(AnimationError::NotDerived(_))
        ));

        // A legal rebind still works and is picked up next tick
        let other = graph.create_value(42.0);
        graph.rebind(b, &[other]).unwrap();
        graph.tick(1.0 / 60.0);
        assert_eq!(graph.get_scalar(b), Some(42.0));
    }

    #[test]
    fn test_derive_from_unknown_value_fails() {
        let mut graph = ValueGraph::new();
        let x = graph.create_value(0.0);
        graph.remove(x).unwrap();
        assert_eq!(
            graph
                .derive_with(&[x], |v| v[0])
                .map(|_| ()),
            Err(AnimationError::UnknownValue(x))
        );
    }

    #[test]
    fn test_remove_cascades_to_derivations() {
        let mut graph = ValueGraph::new();
        let x = graph.create_value(0.0);
        let y = graph.derive_with(&[x], |v| v[0]).unwrap();
        let z = graph.derive_with(&[y], |v| v[0]).unwrap();
        let unrelated = graph.create_value(1.0);

        graph.remove(x).unwrap();
        assert!(!graph.contains(x));
        assert!(!graph.contains(y));
        assert!(!graph.contains(z));
        assert!(graph.contains(unrelated));
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_subscribers_notified_in_order() {
        let mut graph = ValueGraph::new();
        let x = graph.create_value(0.0);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let log = seen.clone();
        graph
            .subscribe(x, move |_, value| log.borrow_mut().push(("first", *value)))
            .unwrap();
        let log = seen.clone();
        let second = graph
            .subscribe(x, move |_, value| log.borrow_mut().push(("second", *value)))
            .unwrap();

        graph.jump(x, 1.0).unwrap();
        graph.tick(1.0 / 60.0);
        assert_eq!(
            *seen.borrow(),
            vec![("first", Value::Scalar(1.0)), ("second", Value::Scalar(1.0))]
        );

        assert!(graph.unsubscribe(second));
        graph.jump(x, 2.0).unwrap();
        graph.tick(1.0 / 60.0);
        assert_eq!(seen.borrow().len(), 3);
        assert!(!graph.unsubscribe(second));
    }

    #[test]
    fn test_diverging_trajectory_is_isolated() {
        let mut graph = ValueGraph::new();
        let broken = graph.create_value(-3.0e38);
        let healthy = graph.create_value(0.0);
        let follower = graph.derive_with(&[healthy], |v| v[0]).unwrap();

        graph
            .set_target(broken, 3.0e38, &TransitionSpec::physics(400.0, 10.0, 1.0))
            .unwrap();
        graph
            .set_target(healthy, 10.0, &TransitionSpec::default())
            .unwrap();
        let report = graph.tick(1.0 / 60.0);

        assert_eq!(report.failed, vec![broken]);
        assert_eq!(graph.get_scalar(broken), Some(-3.0e38));
        assert!(!graph.is_animating(broken));
        assert!(graph.get_scalar(follower).unwrap() > 0.0);
    }

    #[test]
    fn test_distance_to_target() {
        let mut graph = ValueGraph::new();
        let x = graph.create_value(0.0);
        assert_eq!(graph.distance_to_target(x), None);

        graph
            .set_target(x, 80.0, &TransitionSpec::default())
            .unwrap();
        graph.tick(1.0 / 60.0);
        let early = graph.distance_to_target(x).unwrap();
        assert!(early > 0.0 && early < 80.0);
        settle(&mut graph);
        assert_eq!(graph.distance_to_target(x), None);
    }

    #[test]
    fn test_bounded_decay_settles_on_boundary() {
        let mut graph = ValueGraph::new();
        let x = graph.create_value(0.0);
        graph
            .start_decay(
                x,
                2000.0,
                DecayConfig::default(),
                Bounds::between(-100.0, 100.0).unwrap(),
                SpringConfig::from_visual(0.3, 0.0).ok(),
            )
            .unwrap();
        settle(&mut graph);
        assert_eq!(graph.get_scalar(x), Some(100.0));
    }
}
