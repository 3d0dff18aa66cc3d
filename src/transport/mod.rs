//! Transport layer for the broker session
//!
//! This module provides the session abstraction the device drives, the MQTT
//! implementation of it, and the manager that keeps a session alive.

pub mod mqtt;
pub mod session;

pub use mqtt::{MqttSession, SessionError};
pub use session::SessionManager;

/// A message delivered on the subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: bytes::Bytes,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<bytes::Bytes>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Broker session trait
///
/// This trait provides an abstraction over the broker client so the
/// reconnect and dispatch logic can be driven without a live broker.
#[async_trait::async_trait]
pub trait BrokerSession: Send {
    /// Open a new session; succeeds only once the broker accepted it
    async fn open(&mut self) -> Result<(), SessionError>;

    /// Subscribe the open session to a topic
    async fn subscribe(&mut self, topic: &str) -> Result<(), SessionError>;

    /// Run one round of protocol I/O, returning a message if one arrived
    ///
    /// A failure here means the session is gone; `is_connected` reports
    /// false afterwards.
    async fn service(&mut self) -> Result<Option<InboundMessage>, SessionError>;

    /// Close the session, best effort
    async fn close(&mut self) -> Result<(), SessionError>;

    /// Check if the session is currently connected
    fn is_connected(&self) -> bool;
}
