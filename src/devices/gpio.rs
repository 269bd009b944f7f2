//! GPIO output drivers for the switch registry.
//!
//! Real pin access needs the `gpio` feature and a Raspberry Pi. Everywhere
//! else the registry runs on [`LoggingPins`], which only records what it
//! would have done.

use crate::devices::traits::PinDriver;
use crate::error::Result;
use std::collections::BTreeMap;
use tracing::{info, warn};

#[cfg(feature = "gpio")]
mod raspberry_pi {
    use super::*;
    use crate::error::MonitorError;
    use rppal::gpio::{Gpio, OutputPin};
    use std::collections::HashMap;

    /// Pin driver backed by rppal.
    pub struct SystemPins {
        gpio: Gpio,
        outputs: HashMap<u8, OutputPin>,
    }

    impl SystemPins {
        /// Open the GPIO character device.
        pub fn new() -> Result<Self> {
            let gpio = Gpio::new()
                .map_err(|e| MonitorError::gpio_error(format!("Failed to initialize GPIO: {}", e)))?;
            Ok(Self {
                gpio,
                outputs: HashMap::new(),
            })
        }
    }

    impl PinDriver for SystemPins {
        fn setup_output(&mut self, pin: u8) -> Result<()> {
            let output = self
                .gpio
                .get(pin)
                .map_err(|e| MonitorError::gpio_error(format!("Failed to access pin {}: {}", pin, e)))?
                .into_output_low();
            self.outputs.insert(pin, output);
            Ok(())
        }

        fn write(&mut self, pin: u8, high: bool) -> Result<()> {
            let output = self
                .outputs
                .get_mut(&pin)
                .ok_or_else(|| MonitorError::gpio_error(format!("Pin {} is not configured", pin)))?;
            if high {
                output.set_high();
            } else {
                output.set_low();
            }
            Ok(())
        }
    }
}

#[cfg(feature = "gpio")]
pub use raspberry_pi::SystemPins;

/// Pin driver that only logs.
#[derive(Debug, Default)]
pub struct LoggingPins {
    levels: BTreeMap<u8, bool>,
}

impl LoggingPins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last level written to `pin`, if it was configured.
    pub fn level(&self, pin: u8) -> Option<bool> {
        self.levels.get(&pin).copied()
    }
}

impl PinDriver for LoggingPins {
    fn setup_output(&mut self, pin: u8) -> Result<()> {
        info!("GPIO not available; would configure pin {} as output", pin);
        self.levels.insert(pin, false);
        Ok(())
    }

    fn write(&mut self, pin: u8, high: bool) -> Result<()> {
        info!(
            "GPIO not available; would set pin {} {}",
            pin,
            if high { "HIGH" } else { "LOW" }
        );
        self.levels.insert(pin, high);
        Ok(())
    }
}

/// Pick the pin driver for this process.
///
/// Development mode always logs. Otherwise real GPIO is used when compiled
/// in and the controller opens.
pub fn open_pins(dev_mode: bool) -> Box<dyn PinDriver> {
    if dev_mode {
        info!("Development mode: GPIO writes are logged only");
        return Box::new(LoggingPins::new());
    }

    #[cfg(feature = "gpio")]
    match SystemPins::new() {
        Ok(pins) => return Box::new(pins),
        Err(e) => warn!("{}; falling back to logged GPIO", e),
    }

    #[cfg(not(feature = "gpio"))]
    warn!("GPIO support not compiled in; falling back to logged GPIO");

    Box::new(LoggingPins::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_pins_track_levels() {
        let mut pins = LoggingPins::new();
        assert_eq!(pins.level(17), None);
        pins.setup_output(17).unwrap();
        assert_eq!(pins.level(17), Some(false));
        pins.write(17, true).unwrap();
        assert_eq!(pins.level(17), Some(true));
    }

    #[test]
    fn test_dev_mode_pins_accept_writes() {
        let mut pins = open_pins(true);
        pins.setup_output(27).unwrap();
        pins.write(27, true).unwrap();
        pins.write(27, false).unwrap();
    }
}
