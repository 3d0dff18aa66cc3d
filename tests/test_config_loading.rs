//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading, validation, and error handling.

use detector_led::config::{
    ConfigError, DeviceConfig, OutputBackend, DEFAULT_CLIENT_ID, DEFAULT_THRESHOLD,
    DEFAULT_TOPIC,
};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{content}").unwrap();
    temp_file
}

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let temp_file = write_config(
        r#"
[device]
client_id = "kitchen-led"

[wifi]
ssid = "home"
password = "secret"

[broker]
url = "mqtt://broker.local:1884"
username = "device"
password = "devpass"

[subscription]
topic = "aha/object_detector/cam-1/person/stat_t"
threshold = 2

[timing]
wifi_retry_ms = 250
session_retry_secs = 3

[output]
backend = "sysfs"
path = "/sys/class/gpio/gpio2/value"
"#,
    );

    let config = DeviceConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.device.client_id, "kitchen-led");
    assert_eq!(config.wifi.ssid, "home");
    assert_eq!(config.broker.username.as_deref(), Some("device"));
    assert_eq!(config.subscription.threshold, 2);
    assert_eq!(config.timing.wifi_retry_delay(), Duration::from_millis(250));
    assert_eq!(config.timing.session_retry_delay(), Duration::from_secs(3));
    assert_eq!(config.output.backend, OutputBackend::Sysfs);

    let endpoint = config.broker_endpoint().unwrap();
    assert_eq!(endpoint.host, "broker.local");
    assert_eq!(endpoint.port, 1884);
}

#[test]
fn test_partial_config_falls_back_to_defaults() {
    let temp_file = write_config(
        r#"
[broker]
url = "mqtt://localhost"
"#,
    );

    let config = DeviceConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.device.client_id, DEFAULT_CLIENT_ID);
    assert_eq!(config.subscription.topic, DEFAULT_TOPIC);
    assert_eq!(config.subscription.threshold, DEFAULT_THRESHOLD);
    assert_eq!(config.timing.wifi_retry_delay(), Duration::from_millis(500));
    assert_eq!(config.timing.session_retry_delay(), Duration::from_secs(5));
    assert_eq!(config.output.backend, OutputBackend::Log);
    assert_eq!(config.broker_endpoint().unwrap().port, 1883);
}

#[test]
fn test_empty_file_is_the_default_configuration() {
    let temp_file = write_config("");
    let config = DeviceConfig::load_from_file(temp_file.path()).unwrap();
    assert_eq!(config, DeviceConfig::default());
}

#[test]
fn test_invalid_broker_url_is_rejected() {
    let temp_file = write_config(
        r#"
[broker]
url = "http://localhost:1883"
"#,
    );

    let result = DeviceConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::InvalidBrokerUrl(_))));
}

#[test]
fn test_wildcard_topic_is_rejected() {
    let temp_file = write_config(
        r#"
[subscription]
topic = "aha/object_detector/+/person/stat_t"
"#,
    );

    let result = DeviceConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::InvalidTopic(_))));
}

#[test]
fn test_invalid_client_id_is_rejected() {
    let temp_file = write_config(
        r#"
[device]
client_id = "has spaces"
"#,
    );

    let result = DeviceConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::InvalidClientId(_))));
}

#[test]
fn test_sysfs_backend_requires_path() {
    let temp_file = write_config(
        r#"
[output]
backend = "sysfs"
"#,
    );

    let result = DeviceConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_malformed_toml_is_a_parse_error() {
    let temp_file = write_config("[broker\nurl = ");
    let result = DeviceConfig::load_from_file(temp_file.path());
    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_missing_file_is_a_read_error() {
    let result = DeviceConfig::load_from_file(Path::new("/nonexistent/device.toml"));
    assert!(matches!(result, Err(ConfigError::FileRead(_))));
}

#[test]
fn test_shown_configuration_loads_back() {
    let config = DeviceConfig::default();
    let rendered = toml::to_string_pretty(&config).unwrap();
    let temp_file = write_config(&rendered);

    let reloaded = DeviceConfig::load_from_file(temp_file.path()).unwrap();
    assert_eq!(reloaded, config);
}

#[test]
fn test_empty_username_connects_anonymously() {
    let temp_file = write_config(
        r#"
[broker]
url = "mqtt://localhost:1883"
username = ""
"#,
    );

    let config = DeviceConfig::load_from_file(temp_file.path()).unwrap();
    assert_eq!(config.broker_credentials(), None);
}

#[test]
fn test_shown_configuration_hides_password() {
    let temp_file = write_config(
        r#"
[broker]
password = "hunter2"
"#,
    );

    let config = DeviceConfig::load_from_file(temp_file.path()).unwrap();
    let rendered = toml::to_string_pretty(&config.redacted()).unwrap();

    assert!(!rendered.contains("hunter2"));
    assert!(rendered.contains("usermqtt"));
}
