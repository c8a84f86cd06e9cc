//! One-shot trajectory simulations for the `spring`, `tween` and `carousel`
//! commands

use kinetic_motion::{
    CarouselSnap, EngineConfig, MotionEngine, MotionError, Point, ReleaseAction, ReleaseInfo,
    TransitionSpec, Vec2,
};
use serde::Serialize;

/// One sampled frame
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Sample {
    pub t: f64,
    pub value: f32,
    pub velocity: f32,
}

/// A sampled trajectory from `from` to `to`
#[derive(Debug, Serialize)]
pub struct Trace {
    pub spec: TransitionSpec,
    pub from: f32,
    pub to: f32,
    /// Largest distance travelled past the target
    pub overshoot: f32,
    /// Engine time of the settle frame, if it settled within the window
    pub settled_at: Option<f64>,
    pub samples: Vec<Sample>,
}

/// Drive a single value from `from` to `to` at `fps` for at most `max_secs`
pub fn trajectory(
    config: &EngineConfig,
    spec: TransitionSpec,
    from: f32,
    to: f32,
    fps: u32,
    max_secs: f32,
) -> Result<Trace, MotionError> {
    let mut engine = MotionEngine::new(config.clone())?;
    let value = engine.create_motion_value(from);
    engine.set_target(value, to, &spec)?;

    let dt = 1.0 / fps.max(1) as f32;
    let frames = (max_secs / dt).ceil() as usize;
    let direction = if to >= from { 1.0 } else { -1.0 };

    let mut samples = vec![Sample {
        t: 0.0,
        value: from,
        velocity: 0.0,
    }];
    let mut overshoot = 0.0f32;
    let mut settled_at = None;

    for _ in 0..frames {
        let report = engine.tick(dt);
        let current = engine.scalar(value).unwrap_or(to);
        let velocity = engine.graph().scalar_velocity(value).unwrap_or(0.0);
        overshoot = overshoot.max((current - to) * direction);
        samples.push(Sample {
            t: report.time,
            value: current,
            velocity,
        });
        if report.settled.contains(&value) {
            settled_at = Some(report.time);
            break;
        }
        if report.failed.contains(&value) {
            tracing::warn!(frame = report.frame, "trajectory diverged");
            break;
        }
    }

    tracing::debug!(frames = samples.len(), ?settled_at, "simulation finished");

    Ok(Trace {
        spec,
        from,
        to,
        overshoot,
        settled_at,
        samples,
    })
}

/// Carousel release geometry
#[derive(Clone, Copy, Debug)]
pub struct CarouselLayout {
    pub card_width: f32,
    pub gap: f32,
    pub cards: usize,
    pub index: usize,
}

/// Where a carousel release lands
#[derive(Debug, Serialize)]
pub struct CarouselDecision {
    pub from_index: usize,
    pub index: usize,
    pub step: f32,
    pub target: f32,
    pub spec: TransitionSpec,
}

pub fn carousel_release(
    layout: CarouselLayout,
    offset: f32,
    velocity: f32,
) -> Result<CarouselDecision, MotionError> {
    let mut carousel = CarouselSnap::new(layout.card_width, layout.gap, layout.cards)?
        .with_index(layout.index)?;
    let from_index = carousel.index();
    let action = carousel.release(&ReleaseInfo {
        point: Point::new(carousel.target_for(from_index) + offset, 0.0),
        offset: Vec2::new(offset, 0.0),
        velocity: Vec2::new(velocity, 0.0),
    });
    let (target, spec) = match action {
        ReleaseAction::SpringTo { target, spec } => (target.x, spec),
        _ => (carousel.target_for(carousel.index()), carousel.spec()),
    };

    Ok(CarouselDecision {
        from_index,
        index: carousel.index(),
        step: carousel.step(),
        target,
        spec,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinetic_motion::Easing;

    #[test]
    fn test_spring_trace_settles_on_target() {
        let trace = trajectory(
            &EngineConfig::default(),
            TransitionSpec::spring(0.3, 0.15),
            0.0,
            100.0,
            60,
            5.0,
        )
        .unwrap();
        assert!(trace.overshoot > 0.0);
        assert!(trace.settled_at.is_some());
        let last = trace.samples.last().unwrap();
        assert_eq!(last.value, 100.0);
        assert_eq!(last.velocity, 0.0);
    }

    #[test]
    fn test_tween_trace_never_overshoots() {
        let trace = trajectory(
            &EngineConfig::default(),
            TransitionSpec::tween(0.25, Easing::EaseOut),
            50.0,
            -50.0,
            120,
            1.0,
        )
        .unwrap();
        assert_eq!(trace.overshoot, 0.0);
        let settled = trace.settled_at.unwrap();
        assert!((settled - 0.25).abs() < 1.0 / 60.0);
    }

    #[test]
    fn test_invalid_spec_is_rejected() {
        let result = trajectory(
            &EngineConfig::default(),
            TransitionSpec::spring(-1.0, 0.0),
            0.0,
            1.0,
            60,
            1.0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_carousel_release_from_middle_card() {
        let layout = CarouselLayout {
            card_width: 240.0,
            gap: 16.0,
            cards: 5,
            index: 2,
        };
        let decision = carousel_release(layout, 30.0, 700.0).unwrap();
        assert_eq!(decision.from_index, 2);
        assert_eq!(decision.index, 0);
        assert_eq!(decision.target, 0.0);

        let stay = carousel_release(layout, -20.0, -10.0).unwrap();
        assert_eq!(stay.index, 2);
        assert_eq!(stay.target, -512.0);
    }
}
