//! Detection publisher planning
//!
//! Pure logic behind the `inject-detection` tool. Given a detection for a
//! label, it decides which messages go to the broker: the Home Assistant
//! discovery config before a label's first value, then the count itself.
//! A count equal to the last one sent for its label is skipped.

use crate::transport::mqtt::TopicBuilder;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

const MANUFACTURER: &str = "IoT PPGTI";
const MODEL: &str = "EdgeCamera v1";
const SOFTWARE_VERSION: &str = "1.0.0";

/// A message ready to be published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// Publisher availability, published retained on the device availability topic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Online,
    Offline,
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Availability::Online => write!(f, "online"),
            Availability::Offline => write!(f, "offline"),
        }
    }
}

impl Availability {
    /// Retained availability message for `device_id`
    pub fn message(self, device_id: &str) -> OutboundMessage {
        OutboundMessage {
            topic: TopicBuilder::build_availability_topic(device_id),
            payload: self.to_string(),
            retain: true,
        }
    }
}

/// One sensor component in a device discovery config
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComponentEntry {
    pub platform: String,
    pub name: String,
    pub stat_t: String,
    pub val_tpl: String,
    pub unit_of_meas: String,
    pub uniq_id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeviceEntry {
    pub ids: Vec<String>,
    pub name: String,
    pub mf: String,
    pub mdl: String,
    pub sw: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OriginEntry {
    pub name: String,
    pub sw: String,
}

/// Home Assistant device discovery payload (abbreviated keys)
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DiscoveryConfig {
    pub cmps: HashMap<String, ComponentEntry>,
    pub o: OriginEntry,
    pub dev: DeviceEntry,
}

impl DiscoveryConfig {
    /// Discovery config announcing one detection label as a sensor
    pub fn for_label(unique_id: &str, label: &str) -> Self {
        let component = ComponentEntry {
            platform: "sensor".to_string(),
            name: label.to_string(),
            stat_t: TopicBuilder::build_detection_topic(unique_id, label),
            val_tpl: "{{ value }}".to_string(),
            unit_of_meas: label.to_string(),
            uniq_id: format!("{unique_id}_{label}"),
        };

        Self {
            cmps: HashMap::from([(label.to_string(), component)]),
            o: OriginEntry {
                name: "Object Detector".to_string(),
                sw: SOFTWARE_VERSION.to_string(),
            },
            dev: DeviceEntry {
                ids: vec![unique_id.to_string()],
                name: format!("Object Detector {unique_id}"),
                mf: MANUFACTURER.to_string(),
                mdl: MODEL.to_string(),
                sw: SOFTWARE_VERSION.to_string(),
            },
        }
    }
}

/// Tracks what was already sent for each label of one detector
#[derive(Debug)]
pub struct DetectionPublisher {
    unique_id: String,
    discovery: bool,
    dedupe: bool,
    last_sent: HashMap<String, String>,
    configured: HashSet<String>,
}

impl DetectionPublisher {
    pub fn new(unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            discovery: false,
            dedupe: true,
            last_sent: HashMap::new(),
            configured: HashSet::new(),
        }
    }

    /// Announce each label through Home Assistant discovery before its first value
    pub fn with_discovery(mut self, enabled: bool) -> Self {
        self.discovery = enabled;
        self
    }

    /// Skip values equal to the last one sent for the same label
    pub fn with_dedupe(mut self, enabled: bool) -> Self {
        self.dedupe = enabled;
        self
    }

    /// Messages to publish for `payload` on `label`, in order
    ///
    /// Empty when the payload repeats the last value sent for the label.
    pub fn plan(&mut self, label: &str, payload: &str) -> Result<Vec<OutboundMessage>, serde_json::Error> {
        if self.dedupe && self.last_sent.get(label).map(String::as_str) == Some(payload) {
            debug!(label, payload, "Repeated value, skipping");
            return Ok(Vec::new());
        }

        let mut messages = Vec::with_capacity(2);

        if self.discovery && !self.configured.contains(label) {
            let config = DiscoveryConfig::for_label(&self.unique_id, label);
            messages.push(OutboundMessage {
                topic: TopicBuilder::build_discovery_topic(&self.unique_id),
                payload: serde_json::to_string(&config)?,
                retain: true,
            });
            self.configured.insert(label.to_string());
        }

        messages.push(OutboundMessage {
            topic: TopicBuilder::build_detection_topic(&self.unique_id, label),
            payload: payload.to_string(),
            retain: false,
        });
        self.last_sent.insert(label.to_string(), payload.to_string());

        Ok(messages)
    }
}
