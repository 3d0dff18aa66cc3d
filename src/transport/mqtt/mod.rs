//! MQTT implementation of the broker session
//!
//! The module separates pure functions from I/O:
//!
//! - [`connection`] - Pure option building and failure classification
//! - [`message_handler`] - Pure routing of client events
//! - [`client`] - Impure I/O on top of the rumqttc event loop
//!
//! # Usage
//!
//! ```rust,no_run
//! use detector_led::config::DeviceConfig;
//! use detector_led::transport::{BrokerSession, MqttSession};
//!
//! # tokio_test::block_on(async {
//! let config = DeviceConfig::default();
//! let mut session = MqttSession::new(&config)?;
//! session.open().await?;
//! session.subscribe(&config.subscription.topic).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::MqttSession;
pub use connection::{configure_mqtt_options, reason, SessionError, TopicBuilder};
pub use message_handler::{EventRoute, MessageHandler};
