// Test doubles shared by the rumble and proxy test modules.

use std::io;

use crate::rumble::actuator::Actuator;

#[derive(Debug, Default)]
pub struct RecordingActuator {
    writes: Vec<bool>,
    fail: bool,
}

impl RecordingActuator {
    pub fn failing() -> Self {
        Self {
            writes: Vec::new(),
            fail: true,
        }
    }

    pub fn writes(&self) -> &[bool] {
        &self.writes
    }

    pub fn count(&self, on: bool) -> usize {
        self.writes.iter().filter(|&&state| state == on).count()
    }
}

impl Actuator for RecordingActuator {
    fn write_state(&mut self, on: bool) -> io::Result<()> {
        self.writes.push(on);
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::NotFound, "actuator unplugged"));
        }
        Ok(())
    }
}
