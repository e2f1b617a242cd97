//! # Bridge Configuration
//!
//! Every setting has a built-in default matching the reference hardware (two
//! sticks at 0x63/0x64 on `/dev/i2c-8`, polled at 20 Hz), so the daemon runs
//! without any file present. A TOML file may override any subset of keys:
//!
//! ```toml
//! i2c_bus = 1
//! poll_interval_ms = 20
//! left_color = { red = 0, green = 0, blue = 15 }
//! ```
//!
//! The file is looked up at `$JOYSTICK_BRIDGE_CONFIG`, falling back to
//! `<config dir>/joystick-bridge/config.toml`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::controller::scaler::{AxisDomain, AxisScaler};
use crate::device::GamepadSpec;
use crate::sensor::IndicatorColor;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "JOYSTICK_BRIDGE_CONFIG";

const CONFIG_DIR: &str = "joystick-bridge";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Bus number, opened as `/dev/i2c-<n>`
    pub i2c_bus: u8,
    pub left_address: u16,
    pub right_address: u16,
    pub left_color: IndicatorColor,
    pub right_color: IndicatorColor,
    pub poll_interval_ms: u64,
    /// Range the sensors report
    pub source_axis: AxisDomain,
    /// Range advertised by the virtual device
    pub device_axis: AxisDomain,
    pub axis_fuzz: i32,
    pub axis_flat: i32,
    pub device_name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub version: u16,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            i2c_bus: 8,
            left_address: 0x63,
            right_address: 0x64,
            left_color: IndicatorColor::GREEN,
            right_color: IndicatorColor::YELLOW,
            poll_interval_ms: 50,
            source_axis: AxisDomain::new(-4095, 4095),
            device_axis: AxisDomain::new(-4096, 4096),
            axis_fuzz: 16,
            axis_flat: 16,
            device_name: "Userspace joystick device".to_string(),
            vendor_id: 0x0021,
            product_id: 0x0021,
            version: 1,
        }
    }
}

impl BridgeConfig {
    /// Load from `$JOYSTICK_BRIDGE_CONFIG` or the user config directory.
    pub fn load() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            let path = PathBuf::from(path);
            debug!("Using config file from {}: {}", CONFIG_ENV, path.display());
            return Self::read(&path);
        }

        match dirs::config_dir() {
            Some(dir) => Self::load_or_default(&dir.join(CONFIG_DIR).join(CONFIG_FILE)),
            None => {
                warn!("No config directory available, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Like [`BridgeConfig::read`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::read(path)
    }

    /// Read, parse and validate the file at `path`.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, domain) in [
            ("source_axis", self.source_axis),
            ("device_axis", self.device_axis),
        ] {
            if !domain.is_valid() {
                return Err(ConfigError::Invalid(format!(
                    "{} must satisfy min < 0 < max, got [{}, {}]",
                    name, domain.min, domain.max
                )));
            }
        }

        for (name, address) in [
            ("left_address", self.left_address),
            ("right_address", self.right_address),
        ] {
            if address > 0x7f {
                return Err(ConfigError::Invalid(format!(
                    "{} 0x{:x} is not a 7-bit address",
                    name, address
                )));
            }
        }

        if self.left_address == self.right_address {
            return Err(ConfigError::Invalid(format!(
                "both sticks share address 0x{:02x}",
                self.left_address
            )));
        }

        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn scaler(&self) -> AxisScaler {
        AxisScaler::new(self.source_axis, self.device_axis)
    }

    pub fn gamepad_spec(&self) -> GamepadSpec {
        GamepadSpec {
            name: self.device_name.clone(),
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            version: self.version,
            axis: self.device_axis,
            fuzz: self.axis_fuzz,
            flat: self.axis_flat,
        }
    }
}
