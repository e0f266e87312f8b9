//! Datagram transports
//!
//! A transport delivers one finished packet to a daemon. Sends are
//! fire-and-forget: nothing is read back.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::net::UdpSocket;

/// Transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not resolve host: {0}")]
    Resolve(String),

    #[error("Short send: {sent} of {expected} bytes")]
    ShortSend { sent: usize, expected: usize },
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Sends a packet to `host:port`
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, packet: &[u8], host: &str, port: u16) -> TransportResult<()>;
}

/// Resolve a hostname to an IPv4 socket address
pub async fn resolve_host(host: &str, port: u16) -> TransportResult<SocketAddr> {
    let addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|_| TransportError::Resolve(host.to_string()))?;

    addrs
        .into_iter()
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| TransportError::Resolve(host.to_string()))
}

/// UDP transport over a single unconnected IPv4 socket
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind an ephemeral local port
    pub async fn bind() -> TransportResult<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        tracing::debug!("UDP transport bound to {}", socket.local_addr()?);
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&self, packet: &[u8], host: &str, port: u16) -> TransportResult<()> {
        let addr = resolve_host(host, port).await?;
        let sent = self.socket.send_to(packet, addr).await?;

        if sent != packet.len() {
            return Err(TransportError::ShortSend {
                sent,
                expected: packet.len(),
            });
        }

        tracing::trace!("Sent {} bytes to {}", sent, addr);
        Ok(())
    }
}

/// A packet captured by [`RecordingTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPacket {
    pub host: String,
    pub port: u16,
    pub bytes: Vec<u8>,
}

/// Transport that keeps packets in memory instead of sending them
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<SentPacket>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every packet recorded so far, in send order
    pub fn packets(&self) -> Vec<SentPacket> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain the recorded packets
    pub fn take(&self) -> Vec<SentPacket> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, packet: &[u8], host: &str, port: u16) -> TransportResult<()> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentPacket {
                host: host.to_string(),
                port,
                bytes: packet.to_vec(),
            });
        Ok(())
    }
}
