use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::rumble::error::PolicyError;

/// Tunables that turn an effect into an actuator schedule
///
/// Magnitudes here are the combined `strong + weak` value of an effect after
/// scaling by `strength_percent`, so they range over `0..=131070`.
///
/// # Tuning
///
/// - `deadzone`: filters the faint rumbles games use for ambience; too high and
///   light hits are lost entirely
/// - `full_threshold`: above it the motor is held on, below it the motor pulses;
///   lowering it makes weak effects feel as strong as heavy ones
/// - `max_duration_ms`: a safety net for games that start an effect and never
///   stop it
///
/// # Examples
///
/// ```rust
/// use rumble_proxy::rumble::policy::RumblePolicy;
///
/// // Quieter handheld: half strength, ignore anything faint
/// let quiet = RumblePolicy {
///     strength_percent: 50,
///     deadzone: 4000,
///     ..RumblePolicy::default()
/// };
/// assert!(quiet.validate().is_ok());
/// assert_eq!(quiet.scale_magnitude(60000), 30000);
/// ```
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct RumblePolicy {
    /// Combined magnitudes below this are treated as a stop
    ///
    /// Must stay below `full_threshold`.
    pub deadzone: u32,

    /// Combined magnitudes at or above this hold the actuator on
    ///
    /// Weaker effects pulse through the duty cycle instead, which is how a
    /// binary motor approximates half strength.
    pub full_threshold: u32,

    /// Play length in milliseconds when an effect requests a duration of 0
    ///
    /// Many games upload rumble with no length and stop it explicitly; 200ms
    /// keeps a missed stop from buzzing for long.
    pub default_duration_ms: u32,

    /// Upper bound in milliseconds on any single activation
    pub max_duration_ms: u32,

    /// Ticks per pulse period for sub-threshold magnitudes
    ///
    /// Must be even and at least 2. With the 10ms tick the default of 4 gives a
    /// 40ms period, short enough to read as texture rather than separate pulses.
    pub duty_window: u32,

    /// Global scale applied to the combined magnitude, 0-100 (0 disables rumble)
    pub strength_percent: u8,
}

impl Default for RumblePolicy {
    /// Values tuned on the TrimUI Smart Pro's motor
    fn default() -> Self {
        Self {
            deadzone: 2000,
            full_threshold: 40000,
            default_duration_ms: 200,
            max_duration_ms: 5000,
            duty_window: 4,
            strength_percent: 100,
        }
    }
}

impl RumblePolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.default_duration_ms == 0 {
            return Err(PolicyError::ZeroDefaultDuration);
        }
        if self.max_duration_ms < self.default_duration_ms {
            return Err(PolicyError::CeilingBelowDefault {
                default_ms: self.default_duration_ms,
                max_ms: self.max_duration_ms,
            });
        }
        if self.full_threshold <= self.deadzone {
            return Err(PolicyError::ThresholdNotAboveDeadzone {
                threshold: self.full_threshold,
                deadzone: self.deadzone,
            });
        }
        if self.duty_window < 2 || self.duty_window % 2 != 0 {
            return Err(PolicyError::InvalidDutyWindow(self.duty_window));
        }
        if self.strength_percent > 100 {
            return Err(PolicyError::StrengthOutOfRange(self.strength_percent));
        }
        Ok(())
    }

    /// Play length for a requested duration: 0 means default, anything is capped.
    pub fn effective_duration(&self, requested_ms: u16) -> Duration {
        let requested = match u32::from(requested_ms) {
            0 => self.default_duration_ms,
            ms => ms,
        };
        Duration::from_millis(u64::from(requested.min(self.max_duration_ms)))
    }

    pub fn scale_magnitude(&self, combined: u32) -> u32 {
        combined.saturating_mul(u32::from(self.strength_percent)) / 100
    }

    pub fn is_audible(&self, magnitude: u32) -> bool {
        magnitude > 0 && magnitude >= self.deadzone
    }
}
