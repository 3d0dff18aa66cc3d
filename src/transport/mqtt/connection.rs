//! Pure connection configuration and failure classification for the MQTT session
//!
//! This module contains pure functions for building broker options from the
//! device configuration and for turning client failures into the numeric
//! reason codes reported in the diagnostic log.

use crate::config::{ConfigError, DeviceConfig};
use rumqttc::{ConnectReturnCode, ConnectionError, MqttOptions};
use thiserror::Error;

/// Numeric session state codes, following the classic MQTT 3.1.1 client convention
pub mod reason {
    pub const CONNECTION_TIMEOUT: i8 = -4;
    pub const CONNECTION_LOST: i8 = -3;
    pub const CONNECT_FAILED: i8 = -2;
    pub const DISCONNECTED: i8 = -1;
    pub const CONNECTED: i8 = 0;
    pub const BAD_PROTOCOL: i8 = 1;
    pub const BAD_CLIENT_ID: i8 = 2;
    pub const UNAVAILABLE: i8 = 3;
    pub const BAD_CREDENTIALS: i8 = 4;
    pub const UNAUTHORIZED: i8 = 5;
}

/// Broker session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Connection failed, rc={reason_code}: {message}")]
    ConnectFailed { reason_code: i8, message: String },
    #[error("Subscription to {topic} failed: {message}")]
    SubscribeFailed { topic: String, message: String },
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
    #[error("Not connected")]
    NotConnected,
}

impl SessionError {
    /// Reason code reported for this failure
    pub fn reason_code(&self) -> i8 {
        match self {
            SessionError::ConnectFailed { reason_code, .. } => *reason_code,
            SessionError::SubscribeFailed { .. } => reason::DISCONNECTED,
            SessionError::ConnectionLost(_) => reason::CONNECTION_LOST,
            SessionError::NotConnected => reason::DISCONNECTED,
        }
    }

    /// Classify a failed connection attempt
    pub fn connect_failed(error: &ConnectionError) -> Self {
        SessionError::ConnectFailed {
            reason_code: reason_code_for(error),
            message: error.to_string(),
        }
    }
}

/// Map a refused ConnAck to its reason code
pub fn reason_code_for_return(code: ConnectReturnCode) -> i8 {
    match code {
        ConnectReturnCode::Success => reason::CONNECTED,
        ConnectReturnCode::RefusedProtocolVersion => reason::BAD_PROTOCOL,
        ConnectReturnCode::BadClientId => reason::BAD_CLIENT_ID,
        ConnectReturnCode::ServiceUnavailable => reason::UNAVAILABLE,
        ConnectReturnCode::BadUserNamePassword => reason::BAD_CREDENTIALS,
        ConnectReturnCode::NotAuthorized => reason::UNAUTHORIZED,
    }
}

/// Map a client connection error to its reason code
pub fn reason_code_for(error: &ConnectionError) -> i8 {
    match error {
        ConnectionError::ConnectionRefused(code) => reason_code_for_return(*code),
        ConnectionError::NetworkTimeout | ConnectionError::FlushTimeout => {
            reason::CONNECTION_TIMEOUT
        }
        ConnectionError::MqttState(_) => reason::CONNECTION_LOST,
        _ => reason::CONNECT_FAILED,
    }
}

/// Pure function to configure MQTT options from the device configuration
///
/// The client identifier is fixed so the broker always sees the same device.
pub fn configure_mqtt_options(config: &DeviceConfig) -> Result<MqttOptions, ConfigError> {
    let endpoint = config.broker_endpoint()?;

    let mut mqtt_options = MqttOptions::new(
        config.device.client_id.clone(),
        endpoint.host,
        endpoint.port,
    );

    if let Some((username, password)) = config.broker_credentials() {
        mqtt_options.set_credentials(username, password);
    }

    mqtt_options.set_keep_alive(config.timing.keep_alive());
    mqtt_options.set_clean_session(true);

    Ok(mqtt_options)
}

/// Topic construction for the object detector feed
pub struct TopicBuilder;

impl TopicBuilder {
    /// Build a detector state topic: `aha/object_detector/{unique_id}/{label}/stat_t`
    pub fn build_detection_topic(unique_id: &str, label: &str) -> String {
        format!("aha/object_detector/{unique_id}/{label}/stat_t")
    }

    /// Build the retained Home Assistant discovery topic for a detector
    pub fn build_discovery_topic(unique_id: &str) -> String {
        format!("homeassistant/device/object_detector/{unique_id}/config")
    }

    /// Build the retained availability topic for a device
    pub fn build_availability_topic(device_id: &str) -> String {
        format!("aha/{device_id}/avty_t")
    }
}
