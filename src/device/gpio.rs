use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use tracing::{info, warn};

use crate::rumble::actuator::Actuator;

/// Rumble motor behind a sysfs GPIO `value` file.
///
/// If the file cannot be opened the backend stays disconnected and every write is
/// a silent no-op, so playback logic keeps running without physical feedback.
#[derive(Debug)]
pub struct SysfsGpio {
    file: Option<File>,
}

impl SysfsGpio {
    pub fn open(path: &Path) -> Self {
        let file = match OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
        {
            Ok(file) => {
                info!("Rumble actuator ready at {}", path.display());
                Some(file)
            }
            Err(e) => {
                warn!(
                    "Cannot open rumble actuator {}, rumble disabled: {}",
                    path.display(),
                    e
                );
                None
            }
        };

        Self { file }
    }

    pub fn is_connected(&self) -> bool {
        self.file.is_some()
    }
}

impl Actuator for SysfsGpio {
    fn write_state(&mut self, on: bool) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.write_all(if on { b"1" } else { b"0" }),
            None => Ok(()),
        }
    }
}
