use std::fmt;
use std::io;
use tracing::{debug, warn};

/// A binary output, e.g. a GPIO driving a vibration motor.
pub trait Actuator: fmt::Debug {
    fn write_state(&mut self, on: bool) -> io::Result<()>;
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn write_state(&mut self, on: bool) -> io::Result<()> {
        (**self).write_state(on)
    }
}

/// Debounces writes to an [`Actuator`] against the last requested state.
///
/// The cached state tracks intent, not hardware truth: it is updated even when the
/// backend write fails, and failures never reach the caller.
#[derive(Debug)]
pub struct DebouncedActuator<A: Actuator> {
    backend: A,
    last_requested: Option<bool>,
    writes_issued: u64,
    failed_writes: u64,
}

impl<A: Actuator> DebouncedActuator<A> {
    pub fn new(backend: A) -> Self {
        Self {
            backend,
            last_requested: None,
            writes_issued: 0,
            failed_writes: 0,
        }
    }

    pub fn set_state(&mut self, on: bool) {
        if self.last_requested == Some(on) {
            return;
        }

        self.writes_issued += 1;
        if let Err(e) = self.backend.write_state(on) {
            self.failed_writes += 1;
            if self.failed_writes == 1 {
                warn!("Actuator write failed, continuing without feedback: {}", e);
            } else {
                debug!("Actuator write failed ({} total): {}", self.failed_writes, e);
            }
        }
        self.last_requested = Some(on);
    }

    pub fn last_requested(&self) -> Option<bool> {
        self.last_requested
    }

    pub fn is_on(&self) -> bool {
        self.last_requested == Some(true)
    }

    /// Writes that reached the backend, failed or not.
    pub fn writes_issued(&self) -> u64 {
        self.writes_issued
    }

    pub fn failed_writes(&self) -> u64 {
        self.failed_writes
    }

    pub fn backend(&self) -> &A {
        &self.backend
    }
}
