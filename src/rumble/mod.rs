//! Force-feedback emulation for a single on/off actuator
//!
//! Applications see a regular rumble-capable gamepad. Behind it, effects are kept
//! in a fixed table and played back on one binary output:
//!
//! 1. [`effect_table`] - Uploaded effects, addressed by slot id
//! 2. [`playback`] - Idle/Active state machine with timeouts
//! 3. [`duty_cycle`] - Pulsing for sub-threshold intensities
//! 4. [`actuator`] - Debounced binary output
//!
//! # Architecture
//!
//! ```text
//! upload/erase ──► EffectTable
//!                      │
//! play/stop ─────► Playback ──► DutyCycle ──► DebouncedActuator ──► GPIO
//!                      ▲
//!                    tick
//! ```
//!
//! [`engine::RumbleEngine`] bundles all of it into the one object the forwarding
//! loop owns.

pub mod actuator;
pub mod duty_cycle;
pub mod effect_table;
pub mod engine;
pub mod error;
pub mod playback;
pub mod policy;

#[cfg(test)]
pub(crate) mod testing;
