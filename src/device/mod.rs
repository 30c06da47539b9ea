//! Kernel-facing devices
//!
//! - [`source`] - the physical gamepad, grabbed for exclusive access
//! - [`virtual_pad`] - the uinput gamepad applications talk to
//! - [`gpio`] - the rumble motor behind a sysfs GPIO
//! - [`ff`] - force-feedback request/reply plumbing on the virtual pad
//! - [`stream`] - the poll traits the forwarding loop drives them through

pub mod ff;
pub mod gpio;
pub mod source;
pub mod stream;
pub mod virtual_pad;

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Failed to open {path}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("Failed to grab {path} for exclusive access: {source}")]
    Grab { path: PathBuf, source: io::Error },

    #[error("uinput setup failed at {step}: {source}")]
    Setup {
        step: &'static str,
        source: io::Error,
    },

    #[error("Failed to register {what} with the reactor: {source}")]
    Register {
        what: &'static str,
        source: io::Error,
    },

    #[error("Device name {0:?} does not fit the uinput name field")]
    NameTooLong(String),
}
