//! detector-led
//!
//! Drives a single LED from a numeric detection signal published on an MQTT
//! topic.
//!
//! # Overview
//!
//! - Network connector that blocks until the link is up
//! - Broker session manager with fixed-delay, unlimited reconnection
//! - Message dispatcher mapping each payload to an output level
//! - Output backends (log-only virtual LED, sysfs GPIO)
//! - A single-task main loop tying them together
//!
//! # Quick Start
//!
//! ```rust
//! use detector_led::actuator::OutputLevel;
//! use detector_led::dispatch::Dispatcher;
//! use detector_led::testing::RecordingLed;
//!
//! let led = RecordingLed::new();
//! let mut dispatcher = Dispatcher::new(led.clone(), 1);
//!
//! assert_eq!(dispatcher.on_message("aha/object_detector/x/person/stat_t", b"2"), OutputLevel::On);
//! assert_eq!(dispatcher.on_message("aha/object_detector/x/person/stat_t", b"abc"), OutputLevel::Off);
//! assert_eq!(led.current(), Some(OutputLevel::Off));
//! ```

pub mod actuator;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod network;
pub mod observability;
pub mod publisher;
pub mod testing;
pub mod transport;

pub use actuator::{Actuator, OutputLevel};
pub use config::*;
pub use device::{Device, LoopState};
pub use dispatch::Dispatcher;
pub use error::{DeviceError, DeviceResult};
pub use network::{HostLink, NetworkLink};
pub use transport::{BrokerSession, MqttSession, SessionManager};
