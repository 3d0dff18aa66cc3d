//! Network connector
//!
//! Brings the network link up before anything talks to the broker. There is
//! no failure path: association is retried at a fixed short interval until
//! the link reports an address.

use crate::config::{BrokerEndpoint, WifiSection};
use async_trait::async_trait;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::net::{lookup_host, UdpSocket};
use tracing::{debug, info};

/// Failure of a single association attempt
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Cannot resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("No address found for {0}")]
    NoAddress(String),
    #[error("No route to {addr}: {source}")]
    NoRoute {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("Link down: {0}")]
    Down(String),
}

/// Outcome of a successful association
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkInfo {
    pub ssid: String,
    pub local_ip: IpAddr,
    pub attempts: u32,
}

/// A network link the device can bring up
#[async_trait]
pub trait NetworkLink: Send {
    /// Try once to associate, returning the local address on success
    async fn associate(&mut self, wifi: &WifiSection) -> Result<IpAddr, LinkError>;
}

/// Host network link
///
/// The host's network stack is managed by the OS, so the link counts as
/// associated once the broker host resolves and a route toward it exists.
/// The local address of that route is the address the broker will see.
pub struct HostLink {
    endpoint: BrokerEndpoint,
}

impl HostLink {
    pub fn new(endpoint: BrokerEndpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl NetworkLink for HostLink {
    async fn associate(&mut self, _wifi: &WifiSection) -> Result<IpAddr, LinkError> {
        let host = self.endpoint.host.clone();
        let addr = lookup_host((host.as_str(), self.endpoint.port))
            .await
            .map_err(|source| LinkError::Resolve {
                host: host.clone(),
                source,
            })?
            .next()
            .ok_or_else(|| LinkError::NoAddress(host.clone()))?;

        let bind_addr: SocketAddr = if addr.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };

        // Connecting a datagram socket sends nothing; it only selects a route
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|source| LinkError::NoRoute { addr, source })?;
        socket
            .connect(addr)
            .await
            .map_err(|source| LinkError::NoRoute { addr, source })?;
        let local = socket
            .local_addr()
            .map_err(|source| LinkError::NoRoute { addr, source })?;

        if local.ip().is_unspecified() {
            return Err(LinkError::Down(format!("no local address toward {addr}")));
        }

        Ok(local.ip())
    }
}

/// Block until the link is associated
///
/// Retries forever at `retry_delay`, logging progress on every attempt.
pub async fn connect_network<L>(link: &mut L, wifi: &WifiSection, retry_delay: Duration) -> LinkInfo
where
    L: NetworkLink + ?Sized,
{
    info!(ssid = %wifi.ssid, "Connecting to network");

    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match link.associate(wifi).await {
            Ok(local_ip) => {
                info!(ssid = %wifi.ssid, ip = %local_ip, attempts, "Network connected");
                return LinkInfo {
                    ssid: wifi.ssid.clone(),
                    local_ip,
                    attempts,
                };
            }
            Err(e) => {
                info!(attempts, "Waiting for network link");
                debug!(error = %e, "Association attempt failed");
                tokio::time::sleep(retry_delay).await;
            }
        }
    }
}
