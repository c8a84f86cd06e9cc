//! Shared layout morphs
//!
//! Elements carrying the same [`LayoutId`] are treated as one visual object.
//! When its measured box changes between commits the element jumps to the
//! new layout immediately and a transform makes it *look* like it is still
//! in the old place, then springs that transform back to identity.
//!
//! Transforms are expressed relative to the new box with a center origin:
//! `translate = previous.center - current.center`,
//! `scale = previous.size / current.size`.

use crate::config::LayoutSettings;
use crate::error::Result;
use indexmap::IndexMap;
use kinetic_animation::{TransitionSpec, ValueGraph, ValueId};
use kinetic_core::{CornerRadius, Point, Rect, Size, Vec2};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle of a rendered element, assigned by the rendering layer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u64);

/// Shared identity linking elements across layouts
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayoutId(String);

impl LayoutId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LayoutId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for LayoutId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for LayoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Measured box of an element in layout coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutBox {
    pub rect: Rect,
    #[serde(default)]
    pub corner_radius: CornerRadius,
}

impl LayoutBox {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            corner_radius: CornerRadius::ZERO,
        }
    }

    pub fn with_radius(mut self, corner_radius: CornerRadius) -> Self {
        self.corner_radius = corner_radius;
        self
    }
}

/// Reads element boxes from the rendering layer
pub trait LayoutMeasurer {
    /// Current box of `element`, or `None` if it cannot be measured
    fn measure(&self, element: ElementId) -> Option<LayoutBox>;
}

impl<F> LayoutMeasurer for F
where
    F: Fn(ElementId) -> Option<LayoutBox>,
{
    fn measure(&self, element: ElementId) -> Option<LayoutBox> {
        self(element)
    }
}

/// What a commit did to a layout key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MorphOutcome {
    /// First sighting; opacity enters from 0
    Appeared,
    /// Box unavailable; plain opacity fade instead of a morph
    Faded,
    /// Key left the tree; its values were released
    Vanished,
    /// Box or element changed; transform springs back to identity
    Morphed,
    Unchanged,
}

/// Render-time transform of a layout key
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MorphTransform {
    pub translate: Vec2,
    pub scale: Vec2,
    /// Horizontal corner radii, scale corrected
    pub radius_x: CornerRadius,
    /// Vertical corner radii, scale corrected
    pub radius_y: CornerRadius,
    pub opacity: f32,
}

struct Morph {
    element: ElementId,
    snapshot: Option<LayoutBox>,
    translate: ValueId,
    scale: ValueId,
    radius: [ValueId; 4],
    opacity: ValueId,
}

impl Morph {
    fn values(&self) -> impl Iterator<Item = ValueId> + '_ {
        [self.translate, self.scale, self.opacity]
            .into_iter()
            .chain(self.radius.iter().copied())
    }
}

/// Tracks layout keys across commits and drives their morph transforms
pub struct LayoutMorphEngine {
    settings: LayoutSettings,
    morphs: IndexMap<LayoutId, Morph>,
    transitions: FxHashMap<LayoutId, TransitionSpec>,
}

impl LayoutMorphEngine {
    pub fn new(settings: LayoutSettings) -> Self {
        Self {
            settings,
            morphs: IndexMap::new(),
            transitions: FxHashMap::default(),
        }
    }

    /// Override the transition of one key, used for both its morphs and its
    /// first appearance
    pub fn set_transition(&mut self, key: impl Into<LayoutId>, spec: TransitionSpec) -> Result<()> {
        spec.validate()?;
        self.transitions.insert(key.into(), spec);
        Ok(())
    }

    pub fn contains(&self, key: &LayoutId) -> bool {
        self.morphs.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.morphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.morphs.is_empty()
    }

    /// Keys in commit order
    pub fn keys(&self) -> impl Iterator<Item = &LayoutId> {
        self.morphs.keys()
    }

    /// Box recorded for `key` by the last commit
    pub fn snapshot(&self, key: &LayoutId) -> Option<LayoutBox> {
        self.morphs.get(key).and_then(|m| m.snapshot)
    }

    /// Whether any value of `key` is still moving
    pub fn is_animating(&self, graph: &ValueGraph, key: &LayoutId) -> bool {
        self.morphs
            .get(key)
            .is_some_and(|m| m.values().any(|v| graph.is_animating(v) || graph.has_pending(v)))
    }

    /// Measure `nodes` and start morphs for every key whose box changed.
    ///
    /// Keys from the previous commit missing in `nodes` are dropped.
    pub fn commit(
        &mut self,
        graph: &mut ValueGraph,
        nodes: &[(LayoutId, ElementId)],
        measurer: &dyn LayoutMeasurer,
    ) -> Result<Vec<(LayoutId, MorphOutcome)>> {
        let mut outcomes = Vec::with_capacity(nodes.len());
        let mut previous = std::mem::take(&mut self.morphs);

        for (key, element) in nodes {
            if self.morphs.contains_key(key) {
                tracing::warn!(%key, "layout id committed twice, keeping first element");
                continue;
            }
            let measured = measurer
                .measure(*element)
                .filter(|b| b.rect.is_measurable());
            let (morph, outcome) = match previous.shift_remove(key) {
                None => {
                    let enter = self
                        .transitions
                        .get(key)
                        .copied()
                        .unwrap_or(self.settings.enter);
                    self.appear(graph, *element, measured, &enter)?
                }
                Some(morph) => {
                    let spec = self.transition_for(key);
                    self.update(graph, morph, *element, measured, &spec)?
                }
            };
            if outcome != MorphOutcome::Unchanged {
                tracing::debug!(%key, ?outcome, "layout commit");
            }
            self.morphs.insert(key.clone(), morph);
            outcomes.push((key.clone(), outcome));
        }

        for (key, morph) in previous {
            for id in morph.values() {
                if graph.contains(id) {
                    graph.remove(id)?;
                }
            }
            tracing::debug!(%key, "layout key vanished");
            outcomes.push((key, MorphOutcome::Vanished));
        }
        Ok(outcomes)
    }

    /// Current transform of `key`
    pub fn transform(&self, graph: &ValueGraph, key: &LayoutId) -> Option<MorphTransform> {
        let morph = self.morphs.get(key)?;
        let translate = point_value(graph, morph.translate)?;
        let scale = point_value(graph, morph.scale)?;
        let (radius_x, radius_y) = self.visual_corner_radius(graph, key)?;
        Some(MorphTransform {
            translate: Vec2::new(translate.x, translate.y),
            scale: Vec2::new(scale.x, scale.y),
            radius_x,
            radius_y,
            opacity: graph.get_scalar(morph.opacity)?,
        })
    }

    /// Corner radii divided by the current scale, per axis, so the rendered
    /// corners keep their shape while the box is scaled.
    pub fn visual_corner_radius(
        &self,
        graph: &ValueGraph,
        key: &LayoutId,
    ) -> Option<(CornerRadius, CornerRadius)> {
        let morph = self.morphs.get(key)?;
        let scale = point_value(graph, morph.scale)?;
        let radius = radius_value(graph, &morph.radius)?.to_array();
        let correct = |s: f32| CornerRadius::from_array(radius.map(|r| divide_by_scale(r, s)));
        Some((correct(scale.x), correct(scale.y)))
    }

    fn transition_for(&self, key: &LayoutId) -> TransitionSpec {
        self.transitions
            .get(key)
            .copied()
            .unwrap_or(self.settings.morph)
    }

    fn fade_spec(&self) -> TransitionSpec {
        TransitionSpec::tween(self.settings.fade_duration, Default::default())
    }

    fn appear(
        &self,
        graph: &mut ValueGraph,
        element: ElementId,
        measured: Option<LayoutBox>,
        enter: &TransitionSpec,
    ) -> Result<(Morph, MorphOutcome)> {
        let radius = measured.map_or(CornerRadius::ZERO, |b| b.corner_radius);
        let morph = Morph {
            element,
            snapshot: measured,
            translate: graph.create_value(Point::ZERO),
            scale: graph.create_value(Point::new(1.0, 1.0)),
            radius: radius.to_array().map(|r| graph.create_value(r)),
            opacity: graph.create_value(0.0),
        };
        let outcome = match measured {
            Some(_) => {
                graph.set_target(morph.opacity, 1.0, enter)?;
                MorphOutcome::Appeared
            }
            None => {
                graph.set_target(morph.opacity, 1.0, &self.fade_spec())?;
                MorphOutcome::Faded
            }
        };
        Ok((morph, outcome))
    }

    fn update(
        &self,
        graph: &mut ValueGraph,
        mut morph: Morph,
        element: ElementId,
        measured: Option<LayoutBox>,
        spec: &TransitionSpec,
    ) -> Result<(Morph, MorphOutcome)> {
        let replaced = morph.element != element;
        morph.element = element;
        let previous = morph.snapshot;
        morph.snapshot = measured;

        let Some(current) = measured else {
            if previous.is_none() {
                // Still unmeasurable; let the running fade finish
                return Ok((morph, MorphOutcome::Unchanged));
            }
            // No box to morph into; drop the transform and fade in place
            graph.jump(morph.translate, Point::ZERO)?;
            graph.jump(morph.scale, Point::new(1.0, 1.0))?;
            graph.jump(morph.opacity, 0.0)?;
            graph.set_target(morph.opacity, 1.0, &self.fade_spec())?;
            return Ok((morph, MorphOutcome::Faded));
        };
        let Some(previous) = previous else {
            // Box became measurable again; start from identity
            graph.jump(morph.translate, Point::ZERO)?;
            graph.jump(morph.scale, Point::new(1.0, 1.0))?;
            for (id, r) in morph.radius.iter().zip(current.corner_radius.to_array()) {
                graph.jump(*id, r)?;
            }
            return Ok((morph, MorphOutcome::Unchanged));
        };
        if previous == current && !replaced {
            return Ok((morph, MorphOutcome::Unchanged));
        }

        let visual = self.visual_rect(graph, &morph, previous.rect);
        let translate = visual.center() - current.rect.center();
        let scale = Point::new(
            visual.width() / current.rect.width(),
            visual.height() / current.rect.height(),
        );
        if !(translate.x.is_finite()
            && translate.y.is_finite()
            && scale.x.is_finite()
            && scale.y.is_finite())
        {
            tracing::warn!(element = ?element, "non-finite morph start, snapping");
            graph.jump(morph.translate, Point::ZERO)?;
            graph.jump(morph.scale, Point::new(1.0, 1.0))?;
            return Ok((morph, MorphOutcome::Unchanged));
        }

        graph.reanchor(morph.translate, Point::new(translate.x, translate.y))?;
        graph.set_target(morph.translate, Point::ZERO, spec)?;
        graph.reanchor(morph.scale, scale)?;
        graph.set_target(morph.scale, Point::new(1.0, 1.0), spec)?;

        let radius_now = radius_value(graph, &morph.radius).unwrap_or(previous.corner_radius);
        let targets = current.corner_radius.to_array();
        for ((id, from), to) in morph.radius.iter().zip(radius_now.to_array()).zip(targets) {
            graph.reanchor(*id, from)?;
            graph.set_target(*id, to, spec)?;
        }
        Ok((morph, MorphOutcome::Morphed))
    }

    /// Where the previous box is currently drawn, in-flight transform included
    fn visual_rect(&self, graph: &ValueGraph, morph: &Morph, rect: Rect) -> Rect {
        let translate = point_value(graph, morph.translate).unwrap_or(Point::ZERO);
        let scale = point_value(graph, morph.scale).unwrap_or(Point::new(1.0, 1.0));
        let center = rect.center() + Vec2::new(translate.x, translate.y);
        Rect::from_center(
            center,
            Size::new(rect.width() * scale.x, rect.height() * scale.y),
        )
    }
}

fn point_value(graph: &ValueGraph, id: ValueId) -> Option<Point> {
    graph.get(id)?.as_point()
}

fn radius_value(graph: &ValueGraph, ids: &[ValueId; 4]) -> Option<CornerRadius> {
    let mut radii = [0.0; 4];
    for (slot, id) in radii.iter_mut().zip(ids) {
        *slot = graph.get_scalar(*id)?;
    }
    Some(CornerRadius::from_array(radii))
}

fn divide_by_scale(radius: f32, scale: f32) -> f32 {
    if scale.abs() < 1e-6 {
        radius
    } else {
        radius / scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    const FRAME: f32 = 1.0 / 60.0;

    fn settle(graph: &mut ValueGraph) {
        for _ in 0..600 {
            graph.tick(FRAME);
            if !graph.has_active_animations() {
                return;
            }
        }
        panic!("layout values did not settle");
    }

    fn engine() -> LayoutMorphEngine {
        LayoutMorphEngine::new(LayoutSettings::default())
    }

    fn boxes(entries: &[(u64, Rect)]) -> FxHashMap<ElementId, LayoutBox> {
        entries
            .iter()
            .map(|(id, rect)| (ElementId(*id), LayoutBox::new(*rect)))
            .collect()
    }

    fn nodes(entries: &[(&str, u64)]) -> Vec<(LayoutId, ElementId)> {
        entries
            .iter()
            .map(|(key, id)| (LayoutId::from(*key), ElementId(*id)))
            .collect()
    }

    #[test]
    fn test_first_commit_appears_and_fades_in() {
        let mut graph = ValueGraph::new();
        let mut layout = engine();
        let measured = boxes(&[(1, Rect::new(0.0, 0.0, 100.0, 100.0))]);
        let measurer = |e: ElementId| measured.get(&e).copied();

        let outcomes = layout
            .commit(&mut graph, &nodes(&[("card", 1)]), &measurer)
            .unwrap();
        assert_eq!(outcomes, vec![(LayoutId::from("card"), MorphOutcome::Appeared)]);

        let key = LayoutId::from("card");
        assert_eq!(layout.transform(&graph, &key).unwrap().opacity, 0.0);
        settle(&mut graph);
        let transform = layout.transform(&graph, &key).unwrap();
        assert!((transform.opacity - 1.0).abs() < 0.01);
        assert_eq!(transform.translate, Vec2::ZERO);
        assert_eq!(transform.scale, Vec2::ONE);
    }

    #[test]
    fn test_changed_box_starts_from_previous_box() {
        let mut graph = ValueGraph::new();
        let mut layout = engine();
        let key = LayoutId::from("card");

        let small = boxes(&[(1, Rect::new(0.0, 0.0, 100.0, 100.0))]);
        layout
            .commit(&mut graph, &nodes(&[("card", 1)]), &|e: ElementId| {
                small.get(&e).copied()
            })
            .unwrap();
        settle(&mut graph);

        let large = boxes(&[(2, Rect::new(200.0, 0.0, 200.0, 200.0))]);
        let outcomes = layout
            .commit(&mut graph, &nodes(&[("card", 2)]), &|e: ElementId| {
                large.get(&e).copied()
            })
            .unwrap();
        assert_eq!(outcomes[0].1, MorphOutcome::Morphed);

        graph.update(0.0);
        let start = layout.transform(&graph, &key).unwrap();
        // (50, 50) relative to (300, 100)
        assert!((start.translate.x + 250.0).abs() < 1e-3);
        assert!((start.translate.y + 50.0).abs() < 1e-3);
        assert!((start.scale.x - 0.5).abs() < 1e-5);
        assert!((start.scale.y - 0.5).abs() < 1e-5);

        settle(&mut graph);
        let end = layout.transform(&graph, &key).unwrap();
        assert!(end.translate.length() < 0.05);
        assert!((end.scale.x - 1.0).abs() < 0.01);
        assert!(!layout.is_animating(&graph, &key));
    }

    #[test]
    fn test_interrupted_morph_continues_from_visual_box() {
        let mut graph = ValueGraph::new();
        let mut layout = engine();
        let key = LayoutId::from("panel");
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(300.0, 0.0, 100.0, 100.0);
        let c = Rect::new(0.0, 300.0, 100.0, 100.0);

        for rect in [a, b] {
            let measured = boxes(&[(1, rect)]);
            layout
                .commit(&mut graph, &nodes(&[("panel", 1)]), &|e: ElementId| {
                    measured.get(&e).copied()
                })
                .unwrap();
            graph.update(0.0);
        }
        for _ in 0..6 {
            graph.tick(FRAME);
        }
        let mid = layout.transform(&graph, &key).unwrap();
        let drawn_at = b.center() + mid.translate;

        let measured = boxes(&[(1, c)]);
        layout
            .commit(&mut graph, &nodes(&[("panel", 1)]), &|e: ElementId| {
                measured.get(&e).copied()
            })
            .unwrap();
        graph.update(0.0);
        let restart = layout.transform(&graph, &key).unwrap();
        let drawn_now = c.center() + restart.translate;
        assert!((drawn_now.x - drawn_at.x).abs() < 0.01);
        assert!((drawn_now.y - drawn_at.y).abs() < 0.01);
    }

    #[test]
    fn test_unmeasurable_box_fades() {
        let mut graph = ValueGraph::new();
        let mut layout = engine();
        let outcomes = layout
            .commit(&mut graph, &nodes(&[("ghost", 9)]), &|_: ElementId| None)
            .unwrap();
        assert_eq!(outcomes[0].1, MorphOutcome::Faded);

        settle(&mut graph);

        // A measured box collapsing to zero size fades again
        let measured = boxes(&[(9, Rect::new(10.0, 10.0, 40.0, 40.0))]);
        layout
            .commit(&mut graph, &nodes(&[("ghost", 9)]), &|e: ElementId| {
                measured.get(&e).copied()
            })
            .unwrap();
        let zero = boxes(&[(9, Rect::new(10.0, 10.0, 0.0, 0.0))]);
        let outcomes = layout
            .commit(&mut graph, &nodes(&[("ghost", 9)]), &|e: ElementId| {
                zero.get(&e).copied()
            })
            .unwrap();
        assert_eq!(outcomes[0].1, MorphOutcome::Faded);
        graph.tick(0.0);
        let key = LayoutId::from("ghost");
        assert!(layout.transform(&graph, &key).unwrap().opacity < 1e-3);
        settle(&mut graph);
        let transform = layout.transform(&graph, &key).unwrap();
        assert!((transform.opacity - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_repeated_unmeasurable_commit_keeps_fading() {
        let mut graph = ValueGraph::new();
        let mut layout = engine();
        let key = LayoutId::from("ghost");
        let unmeasured = |_: ElementId| -> Option<LayoutBox> { None };

        let outcomes = layout
            .commit(&mut graph, &nodes(&[("ghost", 9)]), &unmeasured)
            .unwrap();
        assert_eq!(outcomes[0].1, MorphOutcome::Faded);

        // Committed every frame, as a render loop would
        let mut last = 0.0;
        for _ in 0..600 {
            graph.tick(FRAME);
            let outcomes = layout
                .commit(&mut graph, &nodes(&[("ghost", 9)]), &unmeasured)
                .unwrap();
            assert_eq!(outcomes[0].1, MorphOutcome::Unchanged);
            let opacity = layout.transform(&graph, &key).unwrap().opacity;
            assert!(opacity > last);
            last = opacity;
            if !layout.is_animating(&graph, &key) {
                break;
            }
        }
        assert!((last - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_missing_key_vanishes_and_releases_values() {
        let mut graph = ValueGraph::new();
        let mut layout = engine();
        let measured = boxes(&[(1, Rect::new(0.0, 0.0, 50.0, 50.0))]);
        let measurer = |e: ElementId| measured.get(&e).copied();

        layout
            .commit(&mut graph, &nodes(&[("a", 1)]), &measurer)
            .unwrap();
        assert_eq!(graph.len(), 7);

        let outcomes = layout.commit(&mut graph, &[], &measurer).unwrap();
        assert_eq!(outcomes, vec![(LayoutId::from("a"), MorphOutcome::Vanished)]);
        assert!(graph.is_empty());
        assert!(layout.is_empty());

        // Snapshot is gone, so the key appears again rather than morphing
        let outcomes = layout
            .commit(&mut graph, &nodes(&[("a", 1)]), &measurer)
            .unwrap();
        assert_eq!(outcomes[0].1, MorphOutcome::Appeared);
    }

    #[test]
    fn test_same_box_is_unchanged() {
        let mut graph = ValueGraph::new();
        let mut layout = engine();
        let measured = boxes(&[(1, Rect::new(0.0, 0.0, 50.0, 50.0))]);
        let measurer = |e: ElementId| measured.get(&e).copied();
        layout
            .commit(&mut graph, &nodes(&[("a", 1)]), &measurer)
            .unwrap();
        let outcomes = layout
            .commit(&mut graph, &nodes(&[("a", 1)]), &measurer)
            .unwrap();
        assert_eq!(outcomes[0].1, MorphOutcome::Unchanged);
    }

    #[test]
    fn test_corner_radius_corrected_for_scale() {
        let mut graph = ValueGraph::new();
        let mut layout = engine();
        let key = LayoutId::from("avatar");
        let small = Rect::new(0.0, 0.0, 50.0, 100.0);
        let large = Rect::new(0.0, 0.0, 100.0, 100.0);

        let first = [(1, LayoutBox::new(small).with_radius(CornerRadius::uniform(10.0)))];
        let first: FxHashMap<_, _> = first
            .into_iter()
            .map(|(id, b)| (ElementId(id), b))
            .collect();
        layout
            .commit(&mut graph, &nodes(&[("avatar", 1)]), &|e: ElementId| {
                first.get(&e).copied()
            })
            .unwrap();
        settle(&mut graph);

        let second = [(1, LayoutBox::new(large).with_radius(CornerRadius::uniform(10.0)))];
        let second: FxHashMap<_, _> = second
            .into_iter()
            .map(|(id, b)| (ElementId(id), b))
            .collect();
        layout
            .commit(&mut graph, &nodes(&[("avatar", 1)]), &|e: ElementId| {
                second.get(&e).copied()
            })
            .unwrap();
        graph.update(0.0);

        let (rx, ry) = layout.visual_corner_radius(&graph, &key).unwrap();
        // Half as wide, so horizontal radii double
        assert!((rx.top_left - 20.0).abs() < 1e-3);
        assert!((ry.top_left - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_transition_override_applies_to_key() {
        let mut layout = engine();
        let spec = TransitionSpec::spring(0.6, 0.3);
        layout.set_transition("hero", spec).unwrap();
        assert_eq!(layout.transition_for(&LayoutId::from("hero")), spec);
        assert_eq!(
            layout.transition_for(&LayoutId::from("other")),
            LayoutSettings::default().morph
        );
        assert!(layout
            .set_transition("hero", TransitionSpec::spring(0.3, 1.5))
            .is_err());
    }
}
