//! Kinetic Animation System
//!
//! Trajectories and the reactive value graph they drive.
//!
//! # Features
//!
//! - **Spring Physics**: closed-form springs, stable for any frame delta
//! - **Tweens**: fixed-duration curves with CSS easings and cubic beziers
//! - **Decay**: momentum that springs back at its bounds
//! - **Value Graph**: motion values, range-mapped derivations and subscribers
//! - **Interruptible**: retargeting keeps the current value and velocity
//! - **Stagger**: per-child start offsets for orchestrated entrances

pub mod decay;
pub mod easing;
pub mod error;
pub mod graph;
pub mod mapping;
pub mod spring;
pub mod stagger;
pub mod trajectory;
pub mod tween;

pub use decay::{Bounds, DecayConfig};
pub use easing::Easing;
pub use error::{AnimationError, GraphCycleError};
pub use graph::{SubscriptionId, TickReport, ValueGraph, ValueId};
pub use mapping::RangeMap;
pub use spring::{Spring, SpringConfig};
pub use stagger::{Orchestration, When};
pub use trajectory::{Step, Tolerance, Trajectory, TransitionSpec};
pub use tween::Tween;
