//! Mock implementations for testing
//!
//! Provides a scripted broker session, a scripted network link and a
//! recording LED so the connect/dispatch loop can be exercised without a
//! broker, a radio or a GPIO line.

use crate::actuator::{Actuator, OutputLevel};
use crate::config::WifiSection;
use crate::network::{LinkError, NetworkLink};
use crate::transport::{BrokerSession, InboundMessage, SessionError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};

/// Calls observed by a [`ScriptedSession`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    Open,
    OpenFailed(i8),
    Subscribe(String),
    SubscribeFailed(String),
    Service,
    Close,
    CloseFailed,
}

/// Shared, cloneable view of the calls a scripted session received
#[derive(Debug, Clone, Default)]
pub struct SessionJournal {
    calls: Arc<Mutex<Vec<SessionCall>>>,
}

impl SessionJournal {
    fn record(&self, call: SessionCall) {
        self.calls
            .lock()
            .expect("journal lock poisoned")
            .push(call);
    }

    pub fn calls(&self) -> Vec<SessionCall> {
        self.calls.lock().expect("journal lock poisoned").clone()
    }

    pub fn clear(&self) {
        self.calls.lock().expect("journal lock poisoned").clear();
    }

    /// Number of successful opens
    pub fn opens(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, SessionCall::Open))
            .count()
    }
}

/// What one `service()` round yields
#[derive(Debug, Clone)]
pub enum ServiceStep {
    Message(InboundMessage),
    Idle,
    ConnectionLost,
}

/// Mock broker session driven by a script
#[derive(Debug, Default)]
pub struct ScriptedSession {
    connected: bool,
    open_failures: VecDeque<i8>,
    subscribe_failures: u32,
    close_failures: u32,
    steps: VecDeque<ServiceStep>,
    journal: SessionJournal,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` opens fail with `reason_code`
    pub fn fail_opens(mut self, count: usize, reason_code: i8) -> Self {
        self.open_failures.extend(std::iter::repeat(reason_code).take(count));
        self
    }

    /// The next `count` subscribes fail
    pub fn fail_subscribes(mut self, count: u32) -> Self {
        self.subscribe_failures = count;
        self
    }

    /// The next `count` closes fail, leaving the session marked disconnected
    pub fn fail_closes(mut self, count: u32) -> Self {
        self.close_failures = count;
        self
    }

    pub fn with_message(mut self, topic: &str, payload: &[u8]) -> Self {
        self.steps.push_back(ServiceStep::Message(InboundMessage::new(
            topic.to_string(),
            payload.to_vec(),
        )));
        self
    }

    pub fn with_idle(mut self) -> Self {
        self.steps.push_back(ServiceStep::Idle);
        self
    }

    pub fn with_connection_drop(mut self) -> Self {
        self.steps.push_back(ServiceStep::ConnectionLost);
        self
    }

    pub fn journal(&self) -> SessionJournal {
        self.journal.clone()
    }
}

#[async_trait]
impl BrokerSession for ScriptedSession {
    async fn open(&mut self) -> Result<(), SessionError> {
        if let Some(reason_code) = self.open_failures.pop_front() {
            self.journal.record(SessionCall::OpenFailed(reason_code));
            return Err(SessionError::ConnectFailed {
                reason_code,
                message: "Mock connection failure".to_string(),
            });
        }
        self.journal.record(SessionCall::Open);
        self.connected = true;
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), SessionError> {
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        if self.subscribe_failures > 0 {
            self.subscribe_failures -= 1;
            self.journal
                .record(SessionCall::SubscribeFailed(topic.to_string()));
            return Err(SessionError::SubscribeFailed {
                topic: topic.to_string(),
                message: "Mock subscribe failure".to_string(),
            });
        }
        self.journal.record(SessionCall::Subscribe(topic.to_string()));
        Ok(())
    }

    async fn service(&mut self) -> Result<Option<InboundMessage>, SessionError> {
        if !self.connected {
            return Err(SessionError::NotConnected);
        }
        self.journal.record(SessionCall::Service);
        match self.steps.pop_front() {
            Some(ServiceStep::Message(message)) => Ok(Some(message)),
            Some(ServiceStep::ConnectionLost) => {
                self.connected = false;
                Err(SessionError::ConnectionLost("Mock connection drop".to_string()))
            }
            Some(ServiceStep::Idle) | None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.connected = false;
        if self.close_failures > 0 {
            self.close_failures -= 1;
            self.journal.record(SessionCall::CloseFailed);
            return Err(SessionError::ConnectionLost("Mock close failure".to_string()));
        }
        self.journal.record(SessionCall::Close);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Mock network link that fails a fixed number of times
#[derive(Debug, Clone)]
pub struct ScriptedLink {
    failures_left: u32,
    attempts: Arc<Mutex<u32>>,
    address: IpAddr,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self {
            failures_left: 0,
            attempts: Arc::new(Mutex::new(0)),
            address: IpAddr::V4(Ipv4Addr::new(192, 168, 0, 42)),
        }
    }

    pub fn failing(mut self, failures: u32) -> Self {
        self.failures_left = failures;
        self
    }

    pub fn attempts(&self) -> u32 {
        *self.attempts.lock().expect("attempt lock poisoned")
    }
}

impl Default for ScriptedLink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkLink for ScriptedLink {
    async fn associate(&mut self, wifi: &WifiSection) -> Result<IpAddr, LinkError> {
        *self.attempts.lock().expect("attempt lock poisoned") += 1;
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(LinkError::Down(format!("{} not in range", wifi.ssid)));
        }
        Ok(self.address)
    }
}

/// LED that records every level it is set to
#[derive(Debug, Clone, Default)]
pub struct RecordingLed {
    levels: Arc<Mutex<Vec<OutputLevel>>>,
}

impl RecordingLed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every level written, oldest first
    pub fn history(&self) -> Vec<OutputLevel> {
        self.levels.lock().expect("led lock poisoned").clone()
    }

    /// Most recent level, if any was written
    pub fn current(&self) -> Option<OutputLevel> {
        self.levels.lock().expect("led lock poisoned").last().copied()
    }
}

impl Actuator for RecordingLed {
    fn set_output(&mut self, level: OutputLevel) {
        self.levels.lock().expect("led lock poisoned").push(level);
    }
}
