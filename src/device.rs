//! Main loop driver
//!
//! Startup drives the output off and brings the network up. After that every
//! iteration makes sure a subscribed session exists, then runs one round of
//! protocol I/O and dispatches whatever message it produced.

use crate::actuator::{Actuator, OutputLevel};
use crate::config::{DeviceConfig, WifiSection};
use crate::dispatch::Dispatcher;
use crate::network::{connect_network, LinkInfo, NetworkLink};
use crate::transport::{BrokerSession, SessionManager};
use std::time::Duration;
use tracing::warn;

/// Where the driver is within an iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingSession,
    Servicing,
}

/// The device: network link, broker session and output, driven by one task
pub struct Device<L, S, A> {
    link: L,
    wifi: WifiSection,
    wifi_retry_delay: Duration,
    sessions: SessionManager<S>,
    dispatcher: Dispatcher<A>,
    state: LoopState,
}

impl<L, S, A> Device<L, S, A>
where
    L: NetworkLink,
    S: BrokerSession,
    A: Actuator,
{
    pub fn new(config: &DeviceConfig, link: L, session: S, actuator: A) -> Self {
        Self {
            link,
            wifi: config.wifi.clone(),
            wifi_retry_delay: config.timing.wifi_retry_delay(),
            sessions: SessionManager::from_config(session, config),
            dispatcher: Dispatcher::new(actuator, config.subscription.threshold),
            state: LoopState::AwaitingSession,
        }
    }

    /// Startup sequence: output off, then block until the network is up
    pub async fn start(&mut self) -> LinkInfo {
        self.dispatcher.initialize_output();
        connect_network(&mut self.link, &self.wifi, self.wifi_retry_delay).await
    }

    /// One loop iteration
    ///
    /// Returns the level set if a message was dispatched.
    pub async fn run_iteration(&mut self) -> Option<OutputLevel> {
        if !self.sessions.is_connected() {
            self.state = LoopState::AwaitingSession;
            self.sessions.ensure_connected().await;
        }
        self.state = LoopState::Servicing;

        match self.sessions.service().await {
            Ok(Some(message)) => Some(self.dispatcher.on_message(&message.topic, &message.payload)),
            Ok(None) => None,
            Err(e) => {
                warn!(rc = e.reason_code(), "MQTT session lost: {}", e);
                None
            }
        }
    }

    /// Run iterations forever
    pub async fn run_forever(&mut self) {
        loop {
            self.run_iteration().await;
        }
    }

    /// Close the broker session, best effort
    pub async fn shutdown(&mut self) {
        self.sessions.shutdown().await;
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn sessions(&self) -> &SessionManager<S> {
        &self.sessions
    }

    pub fn dispatcher(&self) -> &Dispatcher<A> {
        &self.dispatcher
    }
}
