//! Hardware configuration.

use crate::devices::data::{Resolution, DEFAULT_RESOLUTION};
use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Default logical switch to BCM pin mapping.
pub const DEFAULT_SWITCH_PINS: [(&str, u8); 2] = [("led1", 17), ("led2", 27)];

/// Configuration for the device layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Force fallback backends even when hardware libraries are compiled in
    pub dev_mode: bool,
    /// Index of the generic camera to open
    pub camera_index: u32,
    /// Device node of the camera module
    pub camera_device: PathBuf,
    /// Preview resolution requested from cameras
    pub resolution: Resolution,
    /// Logical switch id -> BCM pin number
    pub switch_pins: BTreeMap<String, u8>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            dev_mode: false,
            camera_index: 0,
            camera_device: PathBuf::from("/dev/video0"),
            resolution: DEFAULT_RESOLUTION,
            switch_pins: DEFAULT_SWITCH_PINS
                .iter()
                .map(|(id, pin)| (id.to_string(), *pin))
                .collect(),
        }
    }
}

impl DeviceConfig {
    /// Enable or disable development mode.
    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    /// Set the generic camera index.
    pub fn with_camera_index(mut self, index: u32) -> Self {
        self.camera_index = index;
        self
    }

    /// Set the camera module device node.
    pub fn with_camera_device(mut self, path: impl Into<PathBuf>) -> Self {
        self.camera_device = path.into();
        self
    }

    /// Replace the switch map.
    pub fn with_switch_pins(mut self, pins: BTreeMap<String, u8>) -> Self {
        self.switch_pins = pins;
        self
    }
}

/// Parse a `name=pin` switch definition as given on the command line.
pub fn parse_switch_pin(spec: &str) -> Result<(String, u8)> {
    let (name, pin) = spec
        .split_once('=')
        .ok_or_else(|| MonitorError::config_error(format!("expected name=pin, got '{spec}'")))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(MonitorError::config_error(format!(
            "switch name is empty in '{spec}'"
        )));
    }
    let pin = pin
        .trim()
        .parse::<u8>()
        .map_err(|e| MonitorError::config_error(format!("invalid pin in '{spec}': {e}")))?;
    Ok((name.to_string(), pin))
}
