//! Kinetic Motion Engine
//!
//! Interaction and lifecycle on top of the value graph: drags with momentum,
//! presence enter/exit, shared layout morphs and orchestrated sequences, all
//! advanced by one explicit frame loop.
//!
//! # Example
//!
//! ```rust
//! use kinetic_motion::{EngineConfig, MotionEngine, TransitionSpec};
//!
//! let mut engine = MotionEngine::new(EngineConfig::default()).unwrap();
//! let x = engine.create_motion_value(0.0);
//! engine.set_target(x, 100.0, &TransitionSpec::spring(0.3, 0.15)).unwrap();
//!
//! while engine.is_active() {
//!     engine.tick(1.0 / 60.0);
//! }
//! assert_eq!(engine.scalar(x), Some(100.0));
//! ```

pub mod carousel;
pub mod config;
pub mod engine;
pub mod error;
pub mod gesture;
pub mod layout;
pub mod presence;
pub mod sequence;
pub mod velocity;

pub use carousel::CarouselSnap;
pub use config::{ConfigError, EngineConfig, GestureSettings, LayoutSettings, PresenceSettings};
pub use engine::{FrameReport, FrameSink, MotionEngine, SharedCarousel};
pub use error::{MotionError, Result};
pub use gesture::{
    rubber_band, Constraints, DragAxis, GestureConfig, GestureController, GestureId, GesturePhase,
    ReleaseAction, ReleaseInfo,
};
pub use layout::{
    ElementId, LayoutBox, LayoutId, LayoutMeasurer, LayoutMorphEngine, MorphOutcome,
    MorphTransform,
};
pub use presence::{
    PresenceEvent, PresenceGroup, PresenceGroupId, PresenceMode, PresenceScheduler, PresenceState,
};
pub use sequence::{Sequence, SequenceId, SequenceScheduler, Track};
pub use velocity::VelocityTracker;

pub use kinetic_animation::{
    Bounds, Easing, Orchestration, RangeMap, TransitionSpec, ValueGraph, ValueId, When,
};
pub use kinetic_core::{Color, Point, Rect, Value, Vec2};
