//! Enter/exit presence
//!
//! A [`PresenceGroup`] compares the desired set of keys against what is
//! currently mounted and animates a per-key progress value: `0` is absent,
//! `1` is fully present. An element leaving the desired set keeps rendering
//! until its exit settles; only then is its progress value released.
//!
//! Each frame runs in two halves around the graph update:
//! [`PresenceGroup::begin_frame`] applies the latest desired set and
//! [`PresenceGroup::end_frame`] observes settled trajectories.

use crate::config::PresenceSettings;
use crate::error::{MotionError, Result};
use indexmap::IndexMap;
use kinetic_animation::{TransitionSpec, ValueGraph, ValueId};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle to a presence group
    pub struct PresenceGroupId;
}

/// How entering keys are ordered against exiting ones
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceMode {
    /// Enter and exit together
    #[default]
    Sync,
    /// Hold entering keys until every exit is removed
    Wait,
    /// Exiting keys leave layout immediately but keep animating
    PopLayout,
}

/// Lifecycle of a mounted key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    Entering,
    Present,
    Exiting,
    /// Exit finished and the progress value was released
    Removed,
}

/// A state transition, stamped with the group clock in seconds
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PresenceEvent {
    pub key: String,
    pub kind: PresenceState,
    pub at: f64,
}

struct Entry {
    enter: TransitionSpec,
    exit: TransitionSpec,
    state: Option<PresenceState>,
    progress: Option<ValueId>,
}

impl Entry {
    fn is_mounted(&self) -> bool {
        matches!(
            self.state,
            Some(PresenceState::Entering | PresenceState::Present | PresenceState::Exiting)
        )
    }
}

/// A set of keyed elements that enter and exit under one ordering mode
pub struct PresenceGroup {
    mode: PresenceMode,
    animate_initial: bool,
    applied_once: bool,
    entries: IndexMap<String, Entry>,
    pending: Option<Vec<String>>,
    desired: Vec<String>,
    /// Wait-mode keys queued behind running exits
    held: Vec<String>,
    events: Vec<PresenceEvent>,
    clock: f64,
}

impl PresenceGroup {
    pub fn new(mode: PresenceMode) -> Self {
        Self {
            mode,
            animate_initial: true,
            applied_once: false,
            entries: IndexMap::new(),
            pending: None,
            desired: Vec::new(),
            held: Vec::new(),
            events: Vec::new(),
            clock: 0.0,
        }
    }

    /// Whether keys in the first desired set animate in.
    ///
    /// With `false` they start out `Present`.
    pub fn initial(mut self, animate: bool) -> Self {
        self.animate_initial = animate;
        self
    }

    pub fn mode(&self) -> PresenceMode {
        self.mode
    }

    /// Declare `key` with its enter and exit transitions
    pub fn register(
        &mut self,
        key: impl Into<String>,
        enter: TransitionSpec,
        exit: TransitionSpec,
    ) -> Result<()> {
        enter.validate()?;
        exit.validate()?;
        let key = key.into();
        match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.enter = enter;
                entry.exit = exit;
            }
            None => {
                self.entries.insert(
                    key,
                    Entry {
                        enter,
                        exit,
                        state: None,
                        progress: None,
                    },
                );
            }
        }
        Ok(())
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Replace the desired set; takes effect on the next frame
    pub fn set_desired<I, S>(&mut self, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = FxHashSet::default();
        let mut desired = Vec::new();
        for key in keys {
            let key = key.into();
            if !self.entries.contains_key(&key) {
                return Err(MotionError::UnknownPresenceKey(key));
            }
            if seen.insert(key.clone()) {
                desired.push(key);
            }
        }
        self.pending = Some(desired);
        Ok(())
    }

    pub fn state(&self, key: &str) -> Option<PresenceState> {
        self.entries.get(key).and_then(|e| e.state)
    }

    /// Progress value of a mounted key
    pub fn progress(&self, key: &str) -> Option<ValueId> {
        self.entries.get(key).and_then(|e| e.progress)
    }

    /// Keys that should be drawn, including exiting ones
    pub fn visible_keys(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, e)| e.is_mounted())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Keys that take part in layout; pop-layout excludes exiting keys
    pub fn layout_keys(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, e)| match self.mode {
                PresenceMode::PopLayout => matches!(
                    e.state,
                    Some(PresenceState::Entering | PresenceState::Present)
                ),
                _ => e.is_mounted(),
            })
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Desired set applied by the last frame
    pub fn desired_keys(&self) -> &[String] {
        &self.desired
    }

    /// Keys waiting for exits to finish before entering
    pub fn held_keys(&self) -> &[String] {
        &self.held
    }

    pub fn is_idle(&self) -> bool {
        self.pending.is_none()
            && self.held.is_empty()
            && self.entries.values().all(|e| {
                matches!(
                    e.state,
                    None | Some(PresenceState::Present | PresenceState::Removed)
                )
            })
    }

    pub fn drain_events(&mut self) -> Vec<PresenceEvent> {
        std::mem::take(&mut self.events)
    }

    /// Apply the latest desired set. `now` is the group clock in seconds.
    pub fn begin_frame(&mut self, graph: &mut ValueGraph, now: f64) -> Result<()> {
        self.clock = now;
        let Some(desired) = self.pending.take() else {
            return Ok(());
        };
        let wanted: FxHashSet<&str> = desired.iter().map(String::as_str).collect();

        let leaving: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, e)| {
                matches!(
                    e.state,
                    Some(PresenceState::Entering | PresenceState::Present)
                ) && !wanted.contains(key.as_str())
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in &leaving {
            self.start_exit(graph, key)?;
        }
        self.held.retain(|key| wanted.contains(key.as_str()));

        let first = !self.applied_once;
        self.applied_once = true;
        for key in &desired {
            let state = self.state(key);
            match state {
                Some(PresenceState::Entering | PresenceState::Present) => {}
                Some(PresenceState::Exiting) => self.start_enter(graph, key)?,
                None | Some(PresenceState::Removed) => {
                    if first && !self.animate_initial {
                        self.mount_present(graph, key);
                    } else if self.mode == PresenceMode::Wait && self.has_exits() {
                        if !self.held.contains(key) {
                            tracing::trace!(key = %key, "holding entry behind exits");
                            self.held.push(key.clone());
                        }
                    } else {
                        self.start_enter(graph, key)?;
                    }
                }
            }
        }
        self.desired = desired;
        Ok(())
    }

    /// Advance states whose progress settled, release finished exits and
    /// start held entries once nothing is exiting.
    pub fn end_frame(&mut self, graph: &mut ValueGraph, now: f64) -> Result<()> {
        self.clock = now;
        let mut entered = Vec::new();
        let mut removed = Vec::new();
        for (key, entry) in &self.entries {
            let Some(progress) = entry.progress else {
                continue;
            };
            if graph.is_animating(progress) || graph.has_pending(progress) {
                continue;
            }
            match entry.state {
                Some(PresenceState::Entering) => entered.push(key.clone()),
                Some(PresenceState::Exiting) => removed.push(key.clone()),
                _ => {}
            }
        }

        for key in entered {
            self.transition(&key, PresenceState::Present);
        }
        for key in removed {
            if let Some(entry) = self.entries.get_mut(&key) {
                if let Some(progress) = entry.progress.take() {
                    if graph.contains(progress) {
                        graph.remove(progress)?;
                    }
                }
            }
            self.transition(&key, PresenceState::Removed);
        }

        if !self.held.is_empty() && !self.has_exits() {
            for key in std::mem::take(&mut self.held) {
                self.start_enter(graph, &key)?;
            }
        }
        Ok(())
    }

    /// Release every progress value owned by the group
    pub fn clear(&mut self, graph: &mut ValueGraph) -> Result<()> {
        for entry in self.entries.values_mut() {
            if let Some(progress) = entry.progress.take() {
                if graph.contains(progress) {
                    graph.remove(progress)?;
                }
            }
            entry.state = None;
        }
        self.held.clear();
        self.pending = None;
        Ok(())
    }

    fn has_exits(&self) -> bool {
        self.entries
            .values()
            .any(|e| e.state == Some(PresenceState::Exiting))
    }

    fn start_enter(&mut self, graph: &mut ValueGraph, key: &str) -> Result<()> {
        let Some(entry) = self.entries.get_mut(key) else {
            return Err(MotionError::UnknownPresenceKey(key.to_owned()));
        };
        // Re-entry keeps the progress value, and with it value and velocity
        let progress = match entry.progress {
            Some(progress) => progress,
            None => {
                let progress = graph.create_value(0.0);
                entry.progress = Some(progress);
                progress
            }
        };
        graph.set_target(progress, 1.0, &entry.enter)?;
        self.transition(key, PresenceState::Entering);
        Ok(())
    }

    fn start_exit(&mut self, graph: &mut ValueGraph, key: &str) -> Result<()> {
        let Some(entry) = self.entries.get(key) else {
            return Err(MotionError::UnknownPresenceKey(key.to_owned()));
        };
        if let Some(progress) = entry.progress {
            graph.set_target(progress, 0.0, &entry.exit)?;
        }
        self.transition(key, PresenceState::Exiting);
        Ok(())
    }

    fn mount_present(&mut self, graph: &mut ValueGraph, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.progress = Some(graph.create_value(1.0));
        }
        self.transition(key, PresenceState::Present);
    }

    fn transition(&mut self, key: &str, kind: PresenceState) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        tracing::debug!(key, from = ?entry.state, to = ?kind, at = self.clock, "presence");
        entry.state = Some(kind);
        self.events.push(PresenceEvent {
            key: key.to_owned(),
            kind,
            at: self.clock,
        });
    }
}

/// All presence groups of an engine
pub struct PresenceScheduler {
    groups: SlotMap<PresenceGroupId, PresenceGroup>,
    settings: PresenceSettings,
}

impl PresenceScheduler {
    pub fn new(settings: PresenceSettings) -> Self {
        Self {
            groups: SlotMap::with_key(),
            settings,
        }
    }

    pub fn create_group(&mut self, mode: PresenceMode) -> PresenceGroupId {
        let id = self.groups.insert(PresenceGroup::new(mode));
        tracing::debug!(?id, ?mode, "created presence group");
        id
    }

    /// Add an already configured group
    pub fn insert_group(&mut self, group: PresenceGroup) -> PresenceGroupId {
        self.groups.insert(group)
    }

    pub fn remove_group(&mut self, graph: &mut ValueGraph, id: PresenceGroupId) -> Result<()> {
        let mut group = self
            .groups
            .remove(id)
            .ok_or(MotionError::UnknownPresenceGroup(id))?;
        group.clear(graph)
    }

    pub fn group(&self, id: PresenceGroupId) -> Option<&PresenceGroup> {
        self.groups.get(id)
    }

    pub fn group_mut(&mut self, id: PresenceGroupId) -> Result<&mut PresenceGroup> {
        self.groups
            .get_mut(id)
            .ok_or(MotionError::UnknownPresenceGroup(id))
    }

    /// Register `key` in `group`; `None` specs use the configured defaults
    pub fn register(
        &mut self,
        group: PresenceGroupId,
        key: impl Into<String>,
        enter: Option<TransitionSpec>,
        exit: Option<TransitionSpec>,
    ) -> Result<()> {
        let enter = enter.unwrap_or(self.settings.enter);
        let exit = exit.unwrap_or(self.settings.exit);
        self.group_mut(group)?.register(key, enter, exit)
    }

    pub fn set_desired<I, S>(&mut self, group: PresenceGroupId, keys: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_mut(group)?.set_desired(keys)
    }

    pub fn begin_frame(&mut self, graph: &mut ValueGraph, now: f64) {
        for (id, group) in self.groups.iter_mut() {
            if let Err(err) = group.begin_frame(graph, now) {
                tracing::warn!(?id, %err, "presence update failed");
            }
        }
    }

    pub fn end_frame(&mut self, graph: &mut ValueGraph, now: f64) {
        for (id, group) in self.groups.iter_mut() {
            if let Err(err) = group.end_frame(graph, now) {
                tracing::warn!(?id, %err, "presence update failed");
            }
        }
    }

    /// No group has pending changes or running transitions
    pub fn is_idle(&self) -> bool {
        self.groups.values().all(PresenceGroup::is_idle)
    }

    pub fn drain_events(&mut self) -> Vec<(PresenceGroupId, PresenceEvent)> {
        let mut events = Vec::new();
        for (id, group) in self.groups.iter_mut() {
            events.extend(group.drain_events().into_iter().map(|e| (id, e)));
        }
        events
    }
}
