//! Device configuration
//!
//! The device identity is an immutable structure built once at startup and
//! handed to every component at construction. Every section defaults to the
//! compiled-in constants, so a TOML file only needs to carry the fields it
//! overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Compiled-in defaults for the reference board
pub const DEFAULT_WIFI_SSID: &str = "Wokwi-GUEST";
pub const DEFAULT_BROKER_URL: &str = "mqtt://192.168.0.150:1883";
pub const DEFAULT_BROKER_USERNAME: &str = "usermqtt";
pub const DEFAULT_BROKER_PASSWORD: &str = "passmqtt";
pub const DEFAULT_CLIENT_ID: &str = "ESP32_Wokwi_01";
pub const DEFAULT_TOPIC: &str =
    "aha/object_detector/d6287655-7211-46b9-8fb2-1118f38512ed/person/stat_t";
pub const DEFAULT_THRESHOLD: i64 = 1;

const REDACTED: &str = "********";

/// Full device configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeviceConfig {
    #[serde(default)]
    pub device: DeviceSection,
    #[serde(default)]
    pub wifi: WifiSection,
    #[serde(default)]
    pub broker: BrokerSection,
    #[serde(default)]
    pub subscription: SubscriptionSection,
    #[serde(default)]
    pub timing: TimingSection,
    #[serde(default)]
    pub output: OutputSection,
}

/// Device identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSection {
    /// MQTT client identifier (must match [a-zA-Z0-9._-]+)
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            client_id: default_client_id(),
        }
    }
}

/// Network credentials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WifiSection {
    #[serde(default = "default_ssid")]
    pub ssid: String,
    #[serde(default)]
    pub password: String,
}

impl Default for WifiSection {
    fn default() -> Self {
        Self {
            ssid: default_ssid(),
            password: String::new(),
        }
    }
}

/// Broker address and credentials
///
/// An empty `username` connects without credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrokerSection {
    /// Broker URL, `mqtt://host[:port]`
    #[serde(default = "default_broker_url")]
    pub url: String,
    #[serde(default = "default_username")]
    pub username: Option<String>,
    #[serde(default = "default_password")]
    pub password: Option<String>,
    /// Environment variable holding the password; wins over `password` when set
    #[serde(default)]
    pub password_env: Option<String>,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self {
            url: default_broker_url(),
            username: default_username(),
            password: default_password(),
            password_env: None,
        }
    }
}

/// The single subscribed topic and its actuation threshold
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionSection {
    #[serde(default = "default_topic")]
    pub topic: String,
    /// Parsed values at or above this turn the output on
    #[serde(default = "default_threshold")]
    pub threshold: i64,
}

impl Default for SubscriptionSection {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Fixed retry delays and protocol timing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingSection {
    /// Delay between network association attempts (default: 500ms)
    #[serde(default = "default_wifi_retry_ms")]
    pub wifi_retry_ms: u64,
    /// Delay between broker session attempts (default: 5s)
    #[serde(default = "default_session_retry_secs")]
    pub session_retry_secs: u64,
    /// MQTT keep alive interval (default: 15s)
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Upper bound on a single session open attempt (default: 15s)
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Longest one servicing round waits for protocol activity (default: 100ms)
    #[serde(default = "default_service_wait_ms")]
    pub service_wait_ms: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            wifi_retry_ms: default_wifi_retry_ms(),
            session_retry_secs: default_session_retry_secs(),
            keep_alive_secs: default_keep_alive_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            service_wait_ms: default_service_wait_ms(),
        }
    }
}

impl TimingSection {
    pub fn wifi_retry_delay(&self) -> Duration {
        Duration::from_millis(self.wifi_retry_ms)
    }

    pub fn session_retry_delay(&self) -> Duration {
        Duration::from_secs(self.session_retry_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn service_wait(&self) -> Duration {
        Duration::from_millis(self.service_wait_ms)
    }
}

/// Output line backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputSection {
    #[serde(default)]
    pub backend: OutputBackend,
    /// GPIO value file, required by the sysfs backend
    pub path: Option<String>,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            backend: OutputBackend::Log,
            path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputBackend {
    #[default]
    Log,
    Sysfs,
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

fn default_ssid() -> String {
    DEFAULT_WIFI_SSID.to_string()
}

fn default_broker_url() -> String {
    DEFAULT_BROKER_URL.to_string()
}

fn default_username() -> Option<String> {
    Some(DEFAULT_BROKER_USERNAME.to_string())
}

fn default_password() -> Option<String> {
    Some(DEFAULT_BROKER_PASSWORD.to_string())
}

fn default_topic() -> String {
    DEFAULT_TOPIC.to_string()
}

fn default_threshold() -> i64 {
    DEFAULT_THRESHOLD
}

fn default_wifi_retry_ms() -> u64 {
    500
}

fn default_session_retry_secs() -> u64 {
    5
}

fn default_keep_alive_secs() -> u64 {
    15
}

fn default_connect_timeout_secs() -> u64 {
    15
}

fn default_service_wait_ms() -> u64 {
    100
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
    #[error("Invalid client ID format: {0}")]
    InvalidClientId(String),
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Broker endpoint resolved from the configured URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
}

impl DeviceConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: DeviceConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field formats that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_client_id(&self.device.client_id)?;
        validate_topic(&self.subscription.topic)?;
        self.broker_endpoint()?;

        if self.output.backend == OutputBackend::Sysfs && self.output.path.is_none() {
            return Err(ConfigError::InvalidConfig(
                "sysfs output backend requires [output] path".to_string(),
            ));
        }

        Ok(())
    }

    /// Parse the broker URL into host and port (1883 when omitted)
    pub fn broker_endpoint(&self) -> Result<BrokerEndpoint, ConfigError> {
        let url = Url::parse(&self.broker.url)
            .map_err(|_| ConfigError::InvalidBrokerUrl(self.broker.url.clone()))?;

        if url.scheme() != "mqtt" {
            return Err(ConfigError::InvalidBrokerUrl(format!(
                "{} (only mqtt:// is supported)",
                self.broker.url
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::InvalidBrokerUrl(self.broker.url.clone()))?;

        Ok(BrokerEndpoint {
            host: host.to_string(),
            port: url.port().unwrap_or(1883),
        })
    }

    /// Broker password, preferring the environment variable when configured
    pub fn broker_password(&self) -> Option<String> {
        self.broker
            .password_env
            .as_ref()
            .and_then(|name| std::env::var(name).ok())
            .or_else(|| self.broker.password.clone())
    }

    /// Username and password to present, or `None` for an anonymous session
    pub fn broker_credentials(&self) -> Option<(String, String)> {
        let username = self.broker.username.as_deref().filter(|u| !u.is_empty())?;
        Some((username.to_string(), self.broker_password().unwrap_or_default()))
    }

    /// Copy safe to print: the broker password is masked
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if let Some(password) = config.broker.password.as_mut() {
            if !password.is_empty() {
                *password = REDACTED.to_string();
            }
        }
        config
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[device]
client_id = "test-device"

[broker]
url = "mqtt://localhost:1883"

[subscription]
topic = "test/detections/person"
threshold = 1

[timing]
wifi_retry_ms = 1
session_retry_secs = 0
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

/// Validate client ID format
fn validate_client_id(client_id: &str) -> Result<(), ConfigError> {
    let valid_chars = client_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if client_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidClientId(format!(
            "Client ID '{client_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

/// A subscription topic must name exactly one topic
fn validate_topic(topic: &str) -> Result<(), ConfigError> {
    if topic.is_empty() {
        return Err(ConfigError::InvalidTopic("topic is empty".to_string()));
    }
    if topic.contains(['+', '#']) {
        return Err(ConfigError::InvalidTopic(format!(
            "'{topic}' contains wildcards"
        )));
    }
    Ok(())
}
