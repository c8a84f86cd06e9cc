//! Value graph error types

use crate::graph::ValueId;
use kinetic_core::{ConfigurationError, ValueKind};
use thiserror::Error;

/// A derivation would read, directly or transitively, its own output
#[derive(Error, Debug, Clone, PartialEq)]
#[error("derivation {derived:?} would depend on its own output")]
pub struct GraphCycleError {
    pub derived: ValueId,
}

/// Errors raised by value graph operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimationError {
    /// Invalid trajectory or mapping parameters
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Derivation cycle
    #[error(transparent)]
    GraphCycle(#[from] GraphCycleError),

    /// Handle does not name a live value
    #[error("unknown value {0:?}")]
    UnknownValue(ValueId),

    /// Operation needs an animatable source, not a derived value
    #[error("value {0:?} is derived and cannot be animated directly")]
    NotASource(ValueId),

    /// Operation needs a derived value
    #[error("value {0:?} is not derived")]
    NotDerived(ValueId),

    /// Target value shape differs from the current value
    #[error("expected a {expected:?} value, got {found:?}")]
    KindMismatch { expected: ValueKind, found: ValueKind },
}

/// Result type for value graph operations
pub type Result<T> = std::result::Result<T, AnimationError>;
