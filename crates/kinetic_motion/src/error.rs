//! Motion engine error types

use crate::gesture::GestureId;
use crate::presence::PresenceGroupId;
use crate::sequence::SequenceId;
use kinetic_animation::AnimationError;
use kinetic_core::ConfigurationError;
use thiserror::Error;

/// Errors raised by motion engine operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    /// Value graph failure (unknown value, cycle, kind mismatch, ...)
    #[error(transparent)]
    Animation(#[from] AnimationError),

    /// Invalid gesture, presence or layout parameters
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Gesture handle is not registered
    #[error("unknown gesture {0:?}")]
    UnknownGesture(GestureId),

    /// Presence group handle is not registered
    #[error("unknown presence group {0:?}")]
    UnknownPresenceGroup(PresenceGroupId),

    /// Key was never registered with the presence group
    #[error("unknown presence key {0:?}")]
    UnknownPresenceKey(String),

    /// Sequence handle is not running
    #[error("unknown sequence {0:?}")]
    UnknownSequence(SequenceId),
}

/// Result type for motion engine operations
pub type Result<T> = std::result::Result<T, MotionError>;
