//! Broker session manager
//!
//! Keeps one session alive with a fixed-delay, unlimited retry policy and
//! re-subscribes the single device topic every time a new session opens.

use super::{BrokerSession, InboundMessage, SessionError};
use crate::config::DeviceConfig;
use std::time::Duration;
use tracing::{debug, info, warn, Instrument};

/// Owns the broker session and its reconnect policy
pub struct SessionManager<S> {
    session: S,
    topic: String,
    retry_delay: Duration,
    sessions_opened: u64,
}

impl<S: BrokerSession> SessionManager<S> {
    pub fn new(session: S, topic: impl Into<String>, retry_delay: Duration) -> Self {
        Self {
            session,
            topic: topic.into(),
            retry_delay,
            sessions_opened: 0,
        }
    }

    pub fn from_config(session: S, config: &DeviceConfig) -> Self {
        Self::new(
            session,
            config.subscription.topic.clone(),
            config.timing.session_retry_delay(),
        )
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Block until a session is live and subscribed
    ///
    /// Returns immediately when the session is already connected. Otherwise
    /// retries forever at a constant interval, logging each failure's
    /// reason code.
    pub async fn ensure_connected(&mut self) {
        if self.session.is_connected() {
            return;
        }

        let span = crate::session_span!(topic = %self.topic);
        async {
            let mut attempt: u64 = 0;
            loop {
                attempt += 1;
                info!(attempt, "Attempting MQTT connection...");

                match self.open_and_subscribe().await {
                    Ok(()) => {
                        self.sessions_opened += 1;
                        info!(
                            attempt,
                            topic = %self.topic,
                            "MQTT connected and subscribed"
                        );
                        return;
                    }
                    Err(e) => {
                        warn!(
                            rc = e.reason_code(),
                            error = %e,
                            "MQTT connection failed, try again in {:?}",
                            self.retry_delay
                        );
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// One connection attempt; a session is only usable once subscribed
    async fn open_and_subscribe(&mut self) -> Result<(), SessionError> {
        self.session.open().await?;

        if let Err(e) = self.session.subscribe(&self.topic).await {
            if let Err(close_error) = self.session.close().await {
                debug!("Error closing half-open MQTT session: {}", close_error);
            }
            return Err(e);
        }

        Ok(())
    }

    /// One round of protocol servicing on the current session
    pub async fn service(&mut self) -> Result<Option<InboundMessage>, SessionError> {
        self.session.service().await
    }

    /// Close the session, best effort
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.session.close().await {
            warn!("Error closing MQTT session: {}", e);
        }
    }

    /// Number of sessions opened so far
    pub fn sessions_opened(&self) -> u64 {
        self.sessions_opened
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn session(&self) -> &S {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedSession, SessionCall};

    fn manager(session: ScriptedSession) -> SessionManager<ScriptedSession> {
        SessionManager::new(session, "test/topic", Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_connected_session_is_left_alone() {
        let session = ScriptedSession::new();
        let journal = session.journal();
        let mut manager = manager(session);

        manager.ensure_connected().await;
        journal.clear();
        manager.ensure_connected().await;

        assert!(journal.calls().is_empty());
        assert_eq!(manager.sessions_opened(), 1);
    }

    #[tokio::test]
    async fn test_close_failure_after_refused_subscribe_still_retries() {
        let session = ScriptedSession::new().fail_subscribes(1).fail_closes(1);
        let journal = session.journal();
        let mut manager = manager(session);

        manager.ensure_connected().await;

        assert!(manager.is_connected());
        assert_eq!(
            journal.calls(),
            vec![
                SessionCall::Open,
                SessionCall::SubscribeFailed("test/topic".to_string()),
                SessionCall::CloseFailed,
                SessionCall::Open,
                SessionCall::Subscribe("test/topic".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_subscribes_after_open() {
        let session = ScriptedSession::new();
        let journal = session.journal();
        let mut manager = manager(session);

        manager.ensure_connected().await;

        assert_eq!(
            journal.calls(),
            vec![
                SessionCall::Open,
                SessionCall::Subscribe("test/topic".to_string())
            ]
        );
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_retries_until_open_succeeds() {
        let session = ScriptedSession::new().fail_opens(3, 4);
        let journal = session.journal();
        let mut manager = manager(session);

        manager.ensure_connected().await;

        let opens = journal
            .calls()
            .iter()
            .filter(|c| matches!(c, SessionCall::Open | SessionCall::OpenFailed(_)))
            .count();
        assert_eq!(opens, 4);
        assert_eq!(
            journal.calls()[..3],
            [
                SessionCall::OpenFailed(4),
                SessionCall::OpenFailed(4),
                SessionCall::OpenFailed(4)
            ]
        );
        assert!(manager.is_connected());
        assert_eq!(manager.sessions_opened(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_failure_counts_as_failed_attempt() {
        let session = ScriptedSession::new().fail_subscribes(1);
        let journal = session.journal();
        let mut manager = manager(session);

        manager.ensure_connected().await;

        assert_eq!(
            journal.calls(),
            vec![
                SessionCall::Open,
                SessionCall::SubscribeFailed("test/topic".to_string()),
                SessionCall::Close,
                SessionCall::Open,
                SessionCall::Subscribe("test/topic".to_string()),
            ]
        );
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn test_retry_waits_fixed_delay() {
        let session = ScriptedSession::new().fail_opens(2, -2);
        let mut manager = SessionManager::new(session, "t", Duration::from_millis(20));

        let start = tokio::time::Instant::now();
        manager.ensure_connected().await;

        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
