//! Event proxy between the physical pad and the virtual one
//!
//! 1. [`control`] - Force-feedback requests read back from the virtual pad
//! 2. [`proxy_handle`] - Device lifecycle and the single-threaded forwarding loop
//!
//! # Architecture
//!
//! ```text
//! /dev/input/eventN ──► forward_loop ──► VirtualPad ──► applications
//!                            ▲              │
//!                         control ◄─────────┘ (upload / erase / play)
//!                            │
//!                            ▼
//!                      RumbleEngine ──► GPIO
//! ```
//!
//! Raw input is written to the pad unchanged. Both devices are polled on one task
//! and the rumble engine is ticked once per loop iteration.

pub mod control;
pub mod proxy_handle;

#[cfg(test)]
pub(crate) mod testing;
