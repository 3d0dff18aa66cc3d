//! Single digital output line
//!
//! Writes are fire-and-forget: a backend that cannot reach its line logs the
//! failure and carries on, so the dispatcher never sees an error.

use crate::config::{OutputBackend, OutputSection};
use std::fmt;
use std::path::PathBuf;
use tracing::{error, info};

/// Level of the output line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputLevel {
    Off,
    On,
}

impl OutputLevel {
    pub fn is_on(self) -> bool {
        matches!(self, OutputLevel::On)
    }

    /// Value written to a sysfs GPIO `value` file
    pub fn as_gpio_value(self) -> &'static [u8] {
        match self {
            OutputLevel::On => b"1",
            OutputLevel::Off => b"0",
        }
    }
}

impl fmt::Display for OutputLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputLevel::On => write!(f, "ON"),
            OutputLevel::Off => write!(f, "OFF"),
        }
    }
}

/// An output line that can be driven high or low
pub trait Actuator: Send {
    fn set_output(&mut self, level: OutputLevel);
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn set_output(&mut self, level: OutputLevel) {
        (**self).set_output(level)
    }
}

/// Virtual LED that only reports through the log
#[derive(Debug, Default)]
pub struct LogLed;

impl Actuator for LogLed {
    fn set_output(&mut self, level: OutputLevel) {
        info!(target: "led", level = %level, "LED {}", level);
    }
}

/// LED on a Linux sysfs GPIO line
#[derive(Debug)]
pub struct SysfsLed {
    path: PathBuf,
}

impl SysfsLed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Actuator for SysfsLed {
    fn set_output(&mut self, level: OutputLevel) {
        match std::fs::write(&self.path, level.as_gpio_value()) {
            Ok(()) => info!(target: "led", level = %level, "LED {}", level),
            Err(e) => error!(
                path = %self.path.display(),
                "Failed to drive LED {}: {}",
                level,
                e
            ),
        }
    }
}

/// Build the configured backend
pub fn build_actuator(output: &OutputSection) -> Box<dyn Actuator> {
    match (output.backend, output.path.as_ref()) {
        (OutputBackend::Sysfs, Some(path)) => Box::new(SysfsLed::new(path)),
        (OutputBackend::Sysfs, None) => {
            error!("sysfs output backend without a path, falling back to log output");
            Box::new(LogLed)
        }
        (OutputBackend::Log, _) => Box::new(LogLed),
    }
}
