//! Kinetic Core
//!
//! Foundational types shared by every Kinetic crate:
//!
//! - **Geometry**: points, sizes, rectangles and corner radii
//! - **Colors**: RGBA colors with per-channel interpolation
//! - **Values**: scalar and composite animatable values, flattened to channels
//! - **Errors**: parameter validation shared by trajectories and mappings

pub mod color;
pub mod error;
pub mod geometry;
pub mod value;

pub use color::Color;
pub use error::ConfigurationError;
pub use geometry::{CornerRadius, Point, Rect, Size, Vec2};
pub use value::{Channels, Value, ValueKind};
