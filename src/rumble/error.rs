//! Error types for the rumble engine

use thiserror::Error;

/// Failures reported back to the application that uploaded or erased an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EffectError {
    /// Every slot of the effect table is taken
    #[error("no free effect slot (capacity {capacity})")]
    NoSpace { capacity: usize },

    /// The effect id does not address a slot of the table
    #[error("effect id {0} is outside the effect table")]
    InvalidId(i32),
}

impl EffectError {
    /// Negative errno handed back to the kernel in the upload reply.
    pub fn errno(&self) -> i32 {
        match self {
            EffectError::NoSpace { .. } => -libc::ENOSPC,
            EffectError::InvalidId(_) => -libc::EINVAL,
        }
    }
}

/// Rejected rumble policy parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("default duration must be greater than zero")]
    ZeroDefaultDuration,

    #[error("maximum duration {max_ms} ms is below the default duration {default_ms} ms")]
    CeilingBelowDefault { default_ms: u32, max_ms: u32 },

    #[error("full-intensity threshold {threshold} must be above the deadzone {deadzone}")]
    ThresholdNotAboveDeadzone { threshold: u32, deadzone: u32 },

    #[error("duty window {0} must be an even number of at least 2 ticks")]
    InvalidDutyWindow(u32),

    #[error("strength {0}% is above 100%")]
    StrengthOutOfRange(u8),
}
