use evdev::raw_stream::{EventStream, RawDevice};
use evdev::InputEvent;
use std::io;
use std::path::{Path, PathBuf};
use std::task::{Context, Poll};
use tracing::{debug, info, warn};

use crate::device::stream::{EventSource, GrabbedSource};
use crate::device::DeviceError;

/// The physical gamepad's evdev node, registered with the Tokio reactor.
///
/// While grabbed no other reader sees its events. The grab is released on
/// [`SourceDevice::release`] or, failing that, on drop.
pub struct SourceDevice {
    path: PathBuf,
    stream: EventStream,
}

impl SourceDevice {
    /// Opens `path` non-blocking. Must be called from within a Tokio runtime.
    pub fn open(path: &Path) -> Result<Self, DeviceError> {
        info!("Opening source device {}", path.display());
        let device = RawDevice::open(path).map_err(|source| DeviceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(
            "Source device {} is '{}'",
            path.display(),
            device.name().unwrap_or("unnamed")
        );

        let stream = device
            .into_event_stream()
            .map_err(|source| DeviceError::Register {
                what: "source device",
                source,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            stream,
        })
    }

    pub fn grab(&mut self) -> Result<(), DeviceError> {
        self.stream
            .device_mut()
            .grab()
            .map_err(|source| DeviceError::Grab {
                path: self.path.clone(),
                source,
            })?;
        info!("Grabbed {} for exclusive access", self.path.display());
        Ok(())
    }

    /// Drops the exclusive grab; safe to call more than once.
    pub fn release(&mut self) {
        if !self.is_grabbed() {
            return;
        }
        match self.stream.device_mut().ungrab() {
            Ok(()) => info!("Released grab on {}", self.path.display()),
            Err(e) => warn!("Failed to release grab on {}: {}", self.path.display(), e),
        }
    }

    pub fn is_grabbed(&self) -> bool {
        self.stream.device().is_grabbed()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSource for SourceDevice {
    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<InputEvent>> {
        self.stream.poll_event(cx)
    }
}

impl GrabbedSource for SourceDevice {
    fn release(&mut self) {
        SourceDevice::release(self);
    }
}

impl std::fmt::Debug for SourceDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDevice")
            .field("path", &self.path)
            .field("grabbed", &self.is_grabbed())
            .finish()
    }
}

impl Drop for SourceDevice {
    fn drop(&mut self) {
        if self.is_grabbed() {
            debug!("Source device dropped while grabbed");
            self.release();
        }
    }
}
