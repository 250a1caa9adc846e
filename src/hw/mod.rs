//! Hardware access primitives.
//!
//! # Data Flow
//! ```text
//! GpioConfig → gpio.rs (GpioController, shared via Arc)
//!     → thermal monitor drives the fan pin
//!     → security monitor reads tamper inputs
//!     → diagnostics self-test reads every pin
//!
//! sysfs node / simulator → adc.rs (AnalogInput)
//!     → power and thermal monitors sample on their interval
//!     → diagnostics self-test range-checks each reading
//! ```
//!
//! # Design Decisions
//! - Constructed first; every manager depends on it
//! - No direct register access: pins are addressed by name

pub mod adc;
pub mod gpio;

pub use adc::{open_input, AnalogInput, SimulatedInput, SysfsInput};
pub use gpio::{Direction, GpioController, GpioError};
