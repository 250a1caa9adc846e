//! Analog inputs (ADC channels, thermal zones).
//!
//! # Responsibilities
//! - Read scaled numeric samples from sysfs
//! - Provide simulated inputs for development boards and tests
//!
//! # Design Decisions
//! - A missing sysfs node fails at construction, not on first read
//! - Reads are synchronous and cheap (single small file)

use std::fs;
use std::io;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use rand::Rng;

/// Raw channel file read when an IIO device directory is configured.
const IIO_RAW_CHANNEL: &str = "in_voltage0_raw";

/// A source of numeric samples.
pub trait AnalogInput: Send + Sync {
    /// Take one sample.
    fn read(&self) -> io::Result<f64>;
}

impl<F> AnalogInput for F
where
    F: Fn() -> io::Result<f64> + Send + Sync,
{
    fn read(&self) -> io::Result<f64> {
        self()
    }
}

/// Input backed by a sysfs file holding a single number.
#[derive(Debug, Clone)]
pub struct SysfsInput {
    path: PathBuf,
    scale: f64,
}

impl SysfsInput {
    /// Open a sysfs node. `scale` converts the raw value into engineering
    /// units (thermal zones report millidegrees, so 0.001).
    pub fn open(path: impl AsRef<Path>, scale: f64) -> io::Result<Self> {
        let mut path = path.as_ref().to_path_buf();
        if fs::metadata(&path)?.is_dir() {
            path.push(IIO_RAW_CHANNEL);
            fs::metadata(&path)?;
        }
        Ok(Self { path, scale })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AnalogInput for SysfsInput {
    fn read(&self) -> io::Result<f64> {
        let raw = fs::read_to_string(&self.path)?;
        let value: f64 = raw.trim().parse().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{}: {}", self.path.display(), e),
            )
        })?;
        Ok(value * self.scale)
    }
}

/// Random-walk input for running without hardware.
#[derive(Debug)]
pub struct SimulatedInput {
    value: Mutex<f64>,
    range: RangeInclusive<f64>,
    step: f64,
}

impl SimulatedInput {
    pub fn new(initial: f64, range: RangeInclusive<f64>, step: f64) -> Self {
        let initial = initial.clamp(*range.start(), *range.end());
        Self {
            value: Mutex::new(initial),
            range,
            step,
        }
    }
}

impl AnalogInput for SimulatedInput {
    fn read(&self) -> io::Result<f64> {
        let mut value = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        let delta = if self.step > 0.0 {
            rand::thread_rng().gen_range(-self.step..=self.step)
        } else {
            0.0
        };
        *value = (*value + delta).clamp(*self.range.start(), *self.range.end());
        Ok(*value)
    }
}

/// Open a sysfs input, or a simulated one when `simulate` is set.
pub fn open_input(
    path: &str,
    scale: f64,
    simulate: bool,
    simulated: impl FnOnce() -> SimulatedInput,
) -> io::Result<Box<dyn AnalogInput>> {
    if simulate {
        Ok(Box::new(simulated()))
    } else {
        Ok(Box::new(SysfsInput::open(path, scale)?))
    }
}
