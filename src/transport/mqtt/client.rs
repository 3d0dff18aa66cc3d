//! Impure I/O operations for the MQTT session
//!
//! This module owns the rumqttc client and event loop. A fresh pair is
//! created for every session so a reconnect never inherits state from the
//! connection that was lost.

use super::connection::{configure_mqtt_options, reason, SessionError};
use super::message_handler::{EventRoute, MessageHandler};
use crate::config::{ConfigError, DeviceConfig};
use crate::transport::{BrokerSession, InboundMessage};
use async_trait::async_trait;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Capacity of the client request channel
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// MQTT broker session for a single device
pub struct MqttSession {
    options: MqttOptions,
    client: Option<AsyncClient>,
    event_loop: Option<EventLoop>,
    connected: bool,
    connect_timeout: Duration,
    service_wait: Duration,
}

impl MqttSession {
    pub fn new(config: &DeviceConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            options: configure_mqtt_options(config)?,
            client: None,
            event_loop: None,
            connected: false,
            connect_timeout: config.timing.connect_timeout(),
            service_wait: config.timing.service_wait(),
        })
    }

    /// Poll a fresh event loop until the broker answers the CONNECT
    async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), SessionError> {
        loop {
            match event_loop.poll().await {
                Ok(event) => match MessageHandler::route_mqtt_event(&event) {
                    EventRoute::ConnectionAcknowledged => return Ok(()),
                    EventRoute::Disconnected => {
                        return Err(SessionError::ConnectFailed {
                            reason_code: reason::CONNECTION_LOST,
                            message: "broker closed the connection before ConnAck".to_string(),
                        });
                    }
                    _ => continue,
                },
                Err(e) => return Err(SessionError::connect_failed(&e)),
            }
        }
    }

    /// Drop the client and event loop of a session that is gone
    fn mark_disconnected(&mut self) {
        self.connected = false;
        self.client = None;
        self.event_loop = None;
    }
}

#[async_trait]
impl BrokerSession for MqttSession {
    async fn open(&mut self) -> Result<(), SessionError> {
        self.mark_disconnected();

        let (client, mut event_loop) =
            AsyncClient::new(self.options.clone(), REQUEST_CHANNEL_CAPACITY);

        match tokio::time::timeout(self.connect_timeout, Self::wait_for_connack(&mut event_loop))
            .await
        {
            Ok(Ok(())) => {
                self.client = Some(client);
                self.event_loop = Some(event_loop);
                self.connected = true;
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SessionError::ConnectFailed {
                reason_code: reason::CONNECTION_TIMEOUT,
                message: format!("no ConnAck within {:?}", self.connect_timeout),
            }),
        }
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), SessionError> {
        let client = self.client.as_ref().ok_or(SessionError::NotConnected)?;
        client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(|e| SessionError::SubscribeFailed {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }

    async fn service(&mut self) -> Result<Option<InboundMessage>, SessionError> {
        let event_loop = self.event_loop.as_mut().ok_or(SessionError::NotConnected)?;

        let event = match tokio::time::timeout(self.service_wait, event_loop.poll()).await {
            Err(_) => return Ok(None),
            Ok(Err(e)) => {
                error!("MQTT event loop error: {}", e);
                self.mark_disconnected();
                return Err(SessionError::ConnectionLost(e.to_string()));
            }
            Ok(Ok(event)) => event,
        };

        match MessageHandler::route_mqtt_event(&event) {
            EventRoute::MessageReceived { topic, payload } => {
                Ok(Some(InboundMessage { topic, payload }))
            }
            EventRoute::Disconnected => {
                info!("MQTT broker disconnected device");
                self.mark_disconnected();
                Err(SessionError::ConnectionLost(
                    "broker sent DISCONNECT".to_string(),
                ))
            }
            EventRoute::SubscriptionConfirmed { granted } => {
                if granted {
                    debug!(target: "mqtt_transport", "Subscription confirmed");
                } else {
                    warn!("Broker refused the subscription");
                }
                Ok(None)
            }
            EventRoute::ConnectionAcknowledged => Ok(None),
            EventRoute::InfrastructureEvent(event_str) => {
                debug!(target: "mqtt_transport", "MQTT event: {}", event_str);
                Ok(None)
            }
            EventRoute::OutgoingEvent => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if let Some(client) = self.client.as_ref() {
            if let Err(e) = client.disconnect().await {
                warn!("Failed to queue DISCONNECT: {}", e);
            } else if let Some(event_loop) = self.event_loop.as_mut() {
                // One flush so the DISCONNECT actually leaves the socket
                let _ = tokio::time::timeout(self.service_wait, event_loop.poll()).await;
            }
        }
        self.mark_disconnected();
        info!("MQTT session closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
