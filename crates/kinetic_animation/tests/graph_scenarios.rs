//! Integration tests for trajectories driven through the value graph
//!
//! These tests verify that:
//! - A perceptual spring overshoots once by a bounded amount and settles on time
//! - Retargeting mid-flight keeps motion continuous
//! - Derived values follow their sources within the same tick
//! - A diverging value never disturbs its neighbours

use kinetic_animation::{Easing, RangeMap, TransitionSpec, ValueGraph};
use kinetic_core::{Color, Value};
use std::cell::RefCell;
use std::rc::Rc;

const FRAME: f32 = 1.0 / 60.0;

/// Test that a bouncy spring crosses its target once and settles in 2-3 visual durations
#[test]
fn test_perceptual_spring_scenario() {
    let mut graph = ValueGraph::new();
    let x = graph.create_value(0.0);
    graph
        .set_target(x, 100.0, &TransitionSpec::spring(0.3, 0.15))
        .unwrap();

    let mut peak = f32::MIN;
    let mut settled_at = None;
    let mut sides = Vec::new();
    for frame in 1..=240 {
        let report = graph.tick(FRAME);
        let value = graph.get_scalar(x).unwrap();
        peak = peak.max(value);
        if (value - 100.0).abs() > 0.01 && sides.last() != Some(&(value > 100.0)) {
            sides.push(value > 100.0);
        }
        if report.settled.contains(&x) {
            settled_at = Some(frame as f32 * FRAME);
            break;
        }
    }

    let settled_at = settled_at.expect("spring never settled");
    assert!(peak > 100.0, "no overshoot, peak {peak}");
    assert!(peak < 100.0 + 100.0 * 0.15, "overshoot too large, peak {peak}");
    assert_eq!(sides, vec![false, true], "crossed the target more than once");
    assert!(settled_at >= 0.3 && settled_at <= 0.9 + 0.3, "settled at {settled_at}");
    assert_eq!(graph.get_scalar(x), Some(100.0));
    assert_eq!(graph.scalar_velocity(x), Some(0.0));
}

/// Test that retargeting mid-flight keeps position and velocity continuous
#[test]
fn test_retarget_is_continuous() {
    let mut graph = ValueGraph::new();
    let x = graph.create_value(0.0);
    let spec = TransitionSpec::spring(0.4, 0.0);
    graph.set_target(x, 200.0, &spec).unwrap();
    for _ in 0..10 {
        graph.tick(FRAME);
    }
    let before = graph.get_scalar(x).unwrap();
    let velocity = graph.scalar_velocity(x).unwrap();
    assert!(velocity > 0.0);

    // Reverse direction; the first frame still moves forward
    graph.set_target(x, -100.0, &spec).unwrap();
    graph.tick(FRAME);
    let after = graph.get_scalar(x).unwrap();
    assert!(after > before);
    assert!((after - before) < velocity * FRAME * 1.5);
}

/// Test that a derivation chain updates in the same tick as its source
#[test]
fn test_derivations_follow_source() {
    let mut graph = ValueGraph::new();
    let drag = graph.create_value(0.0);
    let rotate = graph
        .derive(&[drag], RangeMap::new(&[-150.0, 0.0, 150.0], &[-15.0, 0.0, 15.0]).unwrap())
        .unwrap();
    let background = graph
        .derive(
            &[drag],
            RangeMap::colors(
                &[-150.0, 0.0, 150.0],
                &[
                    Color::from_hex(0xfecaca),
                    Color::WHITE,
                    Color::from_hex(0xbbf7d0),
                ],
            )
            .unwrap(),
        )
        .unwrap();
    let label = graph
        .derive_with(&[rotate], |inputs| {
            Value::Scalar(inputs[0].as_scalar().unwrap_or(0.0).abs())
        })
        .unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    graph
        .subscribe(label, move |_, value| log.borrow_mut().push(*value))
        .unwrap();

    graph.jump(drag, -75.0).unwrap();
    let report = graph.tick(FRAME);
    assert_eq!(graph.get_scalar(rotate), Some(-7.5));
    assert_eq!(graph.get_scalar(label), Some(7.5));
    assert_eq!(report.derivations_computed, 3);

    let color = graph.get(background).unwrap().as_color().unwrap();
    let expected = Color::from_hex(0xfecaca).lerp(&Color::WHITE, 0.5);
    assert!((color.r - expected.r).abs() < 1e-5);
    assert!((color.g - expected.g).abs() < 1e-5);
    assert_eq!(*seen.borrow(), vec![Value::Scalar(7.5)]);

    // Unchanged sources recompute nothing
    let report = graph.tick(FRAME);
    assert_eq!(report.derivations_computed, 0);
}

/// Test that a diverging trajectory is isolated to its own value
#[test]
fn test_divergence_is_isolated() {
    let mut graph = ValueGraph::new();
    let wild = graph.create_value(-3.0e38);
    let calm = graph.create_value(0.0);
    graph
        .set_target(wild, 3.0e38, &TransitionSpec::physics(400.0, 10.0, 1.0))
        .unwrap();
    graph
        .set_target(calm, 1.0, &TransitionSpec::tween(0.2, Easing::EaseInOut))
        .unwrap();

    let mut failed = false;
    for _ in 0..30 {
        let report = graph.tick(FRAME);
        failed |= report.failed.contains(&wild);
        assert!(!report.failed.contains(&calm));
        assert!(graph.get_scalar(wild).unwrap().is_finite());
    }
    assert!(failed);
    assert_eq!(graph.get_scalar(calm), Some(1.0));
}
