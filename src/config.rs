//! Proxy configuration
//!
//! Loaded from TOML. A path named by `RUMBLE_PROXY_CONFIG` must exist. Otherwise
//! `<config dir>/rumble-proxy/config.toml` is used if present, and built-in defaults
//! (matching the TrimUI Smart Pro) if not. A file that exists but cannot be read or
//! parsed is an error.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use evdev::{AbsoluteAxisCode as Abs, BusType, KeyCode as Key};
use crate::rumble::error::PolicyError;
use crate::rumble::policy::RumblePolicy;

pub const CONFIG_ENV_VAR: &str = "RUMBLE_PROXY_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid rumble policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    pub source: SourceConfig,
    pub actuator: ActuatorConfig,
    pub virtual_device: VirtualDeviceConfig,
    pub rumble: RumblePolicy,
    pub proxy: LoopConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    /// evdev node of the physical gamepad
    pub path: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/dev/input/event3"),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ActuatorConfig {
    /// sysfs value file of the rumble GPIO
    pub path: PathBuf,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/sys/class/gpio/gpio227/value"),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisConfig {
    pub code: u16,
    pub min: i32,
    pub max: i32,
    #[serde(default)]
    pub fuzz: i32,
    #[serde(default)]
    pub flat: i32,
}

impl AxisConfig {
    const fn new(code: u16, min: i32, max: i32, fuzz: i32, flat: i32) -> Self {
        Self {
            code,
            min,
            max,
            fuzz,
            flat,
        }
    }
}

/// Identity and capabilities announced for the virtual gamepad.
///
/// Vendor and product default to 0: a recognised id makes SDL2 apply its own
/// mapping, which inverts the D-pad on this hardware.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct VirtualDeviceConfig {
    pub name: String,
    pub bustype: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
    pub keys: Vec<u16>,
    pub axes: Vec<AxisConfig>,
}

impl Default for VirtualDeviceConfig {
    fn default() -> Self {
        Self {
            name: "TRIMUI Player1 (Proxy FF)".to_string(),
            bustype: BusType::BUS_USB.0,
            vendor: 0x0000,
            product: 0x0000,
            version: 1,
            keys: [
                Key::BTN_SOUTH,
                Key::BTN_EAST,
                Key::BTN_NORTH,
                Key::BTN_WEST,
                Key::BTN_TL,
                Key::BTN_TR,
                Key::BTN_SELECT,
                Key::BTN_START,
                Key::BTN_MODE,
            ]
            .iter()
            .map(|key| key.0)
            .collect(),
            axes: vec![
                AxisConfig::new(Abs::ABS_X.0, -32768, 32767, 16, 128),
                AxisConfig::new(Abs::ABS_Y.0, -32768, 32767, 16, 128),
                AxisConfig::new(Abs::ABS_RX.0, -32768, 32767, 16, 128),
                AxisConfig::new(Abs::ABS_RY.0, -32768, 32767, 16, 128),
                AxisConfig::new(Abs::ABS_Z.0, 0, 255, 0, 0),
                AxisConfig::new(Abs::ABS_RZ.0, 0, 255, 0, 0),
                AxisConfig::new(Abs::ABS_HAT0X.0, -1, 1, 0, 0),
                AxisConfig::new(Abs::ABS_HAT0Y.0, -1, 1, 0, 0),
            ],
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LoopConfig {
    /// Upper bound on the readiness wait, i.e. the tick period
    pub tick_interval_ms: u64,
    /// How often the forwarding loop logs its counters
    pub stats_interval_secs: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 10,
            stats_interval_secs: 10,
        }
    }
}

impl ProxyConfig {
    /// Loads the configuration from `RUMBLE_PROXY_CONFIG` or the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
    }

    /// An `explicit` path is read as-is, so a missing file is an error. Without
    /// one, a missing default file means built-in defaults.
    fn load_from(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            info!(
                "Loading configuration from {} (set by {})",
                path.display(),
                CONFIG_ENV_VAR
            );
            return Self::from_path(&path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                Self::from_path(&path)
            }
            Some(path) => {
                info!(
                    "No configuration at {}, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                info!("No configuration directory available, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rumble-proxy").join("config.toml"))
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rumble.validate()?;

        let name = &self.virtual_device.name;
        if name.is_empty() || name.len() + 1 >= libc::UINPUT_MAX_NAME_SIZE {
            return Err(ConfigError::Invalid(format!(
                "virtual device name must be 1..{} bytes, got {}",
                libc::UINPUT_MAX_NAME_SIZE - 2,
                name.len()
            )));
        }
        if let Some(key) = self
            .virtual_device
            .keys
            .iter()
            .find(|&&key| usize::from(key) >= libc::KEY_CNT)
        {
            return Err(ConfigError::Invalid(format!(
                "key code {:#x} is above KEY_MAX",
                key
            )));
        }
        if let Some(axis) = self
            .virtual_device
            .axes
            .iter()
            .find(|axis| usize::from(axis.code) >= libc::ABS_CNT)
        {
            return Err(ConfigError::Invalid(format!(
                "axis code {:#x} is above ABS_MAX",
                axis.code
            )));
        }
        if let Some(axis) = self.virtual_device.axes.iter().find(|axis| axis.min > axis.max) {
            return Err(ConfigError::Invalid(format!(
                "axis {:#04x} has min {} above max {}",
                axis.code, axis.min, axis.max
            )));
        }
        if self.proxy.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "tick_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
