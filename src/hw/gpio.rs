//! Named GPIO pin bank.
//!
//! # Responsibilities
//! - Validate and register the configured pins
//! - Serve thread-safe reads and writes
//! - Let tests and simulation drive input levels
//!
//! # Design Decisions
//! - Pins are addressed by their board name (`GPIO17`)
//! - Writes are only allowed on outputs; `drive` models the outside world
//!   pulling an input high or low

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

use crate::config::GpioConfig;

/// Error type for GPIO operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpioError {
    #[error("invalid pin name '{0}' (expected GPIO<n>)")]
    InvalidPin(String),

    #[error("pin '{0}' is not registered")]
    UnknownPin(String),

    #[error("pin '{pin}' is configured as {actual:?}")]
    Direction { pin: String, actual: Direction },

    #[error("pin '{0}' registered twice")]
    Duplicate(String),
}

/// Pin direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy)]
struct Pin {
    direction: Direction,
    level: bool,
}

/// Thread-safe controller for the device's GPIO pins.
#[derive(Debug)]
pub struct GpioController {
    pins: Mutex<HashMap<String, Pin>>,
    config: GpioConfig,
}

impl GpioController {
    /// Register the fan output and the tamper sensor inputs.
    ///
    /// Inputs start at their resting levels: case closed, no motion,
    /// supply voltage normal.
    pub fn new(config: &GpioConfig) -> Result<Self, GpioError> {
        let controller = Self {
            pins: Mutex::new(HashMap::new()),
            config: config.clone(),
        };
        controller.register(&config.fan_pin, Direction::Output, false)?;
        controller.register(&config.case_sensor, Direction::Input, false)?;
        controller.register(&config.motion_sensor, Direction::Input, false)?;
        controller.register(&config.voltage_sensor, Direction::Input, true)?;

        tracing::debug!(
            fan = %config.fan_pin,
            case = %config.case_sensor,
            motion = %config.motion_sensor,
            voltage = %config.voltage_sensor,
            "GPIO pins registered"
        );
        Ok(controller)
    }

    /// The pin assignment this controller was built from.
    pub fn config(&self) -> &GpioConfig {
        &self.config
    }

    fn register(&self, name: &str, direction: Direction, level: bool) -> Result<(), GpioError> {
        validate_pin_name(name)?;
        let mut pins = self.pins.lock().unwrap_or_else(PoisonError::into_inner);
        if pins.contains_key(name) {
            return Err(GpioError::Duplicate(name.to_string()));
        }
        pins.insert(name.to_string(), Pin { direction, level });
        Ok(())
    }

    /// Read the current level of any registered pin.
    pub fn read(&self, name: &str) -> Result<bool, GpioError> {
        let pins = self.pins.lock().unwrap_or_else(PoisonError::into_inner);
        pins.get(name)
            .map(|pin| pin.level)
            .ok_or_else(|| GpioError::UnknownPin(name.to_string()))
    }

    /// Set an output pin.
    pub fn write(&self, name: &str, level: bool) -> Result<(), GpioError> {
        self.set(name, level, Direction::Output)
    }

    /// Force the level seen on an input pin.
    pub fn drive(&self, name: &str, level: bool) -> Result<(), GpioError> {
        self.set(name, level, Direction::Input)
    }

    fn set(&self, name: &str, level: bool, expected: Direction) -> Result<(), GpioError> {
        let mut pins = self.pins.lock().unwrap_or_else(PoisonError::into_inner);
        let pin = pins
            .get_mut(name)
            .ok_or_else(|| GpioError::UnknownPin(name.to_string()))?;
        if pin.direction != expected {
            return Err(GpioError::Direction {
                pin: name.to_string(),
                actual: pin.direction,
            });
        }
        pin.level = level;
        Ok(())
    }

    /// Names of every registered pin, sorted.
    pub fn pin_names(&self) -> Vec<String> {
        let pins = self.pins.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = pins.keys().cloned().collect();
        names.sort();
        names
    }
}

fn validate_pin_name(name: &str) -> Result<(), GpioError> {
    let valid = name
        .strip_prefix("GPIO")
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
    if valid {
        Ok(())
    } else {
        Err(GpioError::InvalidPin(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resting_levels() {
        let gpio = GpioController::new(&GpioConfig::default()).unwrap();
        assert!(!gpio.read("GPIO17").unwrap());
        assert!(!gpio.read("GPIO27").unwrap());
        assert!(gpio.read("GPIO22").unwrap());
        assert!(!gpio.read("GPIO18").unwrap());
        assert_eq!(gpio.pin_names().len(), 4);
    }

    #[test]
    fn write_requires_output() {
        let gpio = GpioController::new(&GpioConfig::default()).unwrap();
        gpio.write("GPIO18", true).unwrap();
        assert!(gpio.read("GPIO18").unwrap());

        let err = gpio.write("GPIO17", true).unwrap_err();
        assert_eq!(
            err,
            GpioError::Direction {
                pin: "GPIO17".into(),
                actual: Direction::Input
            }
        );
        assert!(gpio.drive("GPIO18", true).is_err());
    }

    #[test]
    fn rejects_bad_and_duplicate_pins() {
        let mut config = GpioConfig::default();
        config.fan_pin = "PIN9".into();
        assert_eq!(
            GpioController::new(&config).unwrap_err(),
            GpioError::InvalidPin("PIN9".into())
        );

        let mut config = GpioConfig::default();
        config.motion_sensor = config.case_sensor.clone();
        assert_eq!(
            GpioController::new(&config).unwrap_err(),
            GpioError::Duplicate("GPIO17".into())
        );
    }

    #[test]
    fn unknown_pin() {
        let gpio = GpioController::new(&GpioConfig::default()).unwrap();
        assert_eq!(
            gpio.read("GPIO99").unwrap_err(),
            GpioError::UnknownPin("GPIO99".into())
        );
    }
}
