//! Connection handling for a single Growl daemon
//!
//! Tracks:
//! - Where the daemon lives and the shared password
//! - The roster of notification types and whether it is registered
//! - Send statistics

use std::sync::Arc;
use thiserror::Error;

use super::transport::{Transport, TransportError};
use crate::protocol::{encode_notify, encode_registration, CodecError, Notification};

/// Connection errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("All notifications have not been registered")]
    NotRegistered,

    #[error("Encoding error: {0}")]
    Encoding(#[from] CodecError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Resolved per-daemon settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub address: String,
    pub port: u16,
    pub password: String,
    pub app_name: String,
}

/// Connection statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Packets handed to the transport
    pub packets_sent: u64,
    /// Bytes handed to the transport
    pub bytes_sent: u64,
    /// Registration packets sent
    pub registrations: u64,
    /// Notification packets sent
    pub notifications: u64,
}

/// A connection to one Growl daemon
pub struct ServerConnection {
    settings: ConnectionSettings,
    /// Notification types, in registration order
    notifications: Vec<String>,
    /// Whether the daemon has seen the current roster
    registered: bool,
    transport: Arc<dyn Transport>,
    stats: ConnectionStats,
}

impl ServerConnection {
    pub fn new(settings: ConnectionSettings, transport: Arc<dyn Transport>) -> Self {
        Self {
            settings,
            notifications: Vec::new(),
            registered: false,
            transport,
            stats: ConnectionStats::default(),
        }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn notification_types(&self) -> &[String] {
        &self.notifications
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Add a notification type. The daemon must be registered again before
    /// the next notification goes out.
    pub fn add_notification_type(&mut self, name: impl Into<String>) -> &mut Self {
        self.notifications.push(name.into());
        self.registered = false;
        self
    }

    pub fn set_address(&mut self, address: impl Into<String>) {
        self.settings.address = address.into();
    }

    pub fn set_port(&mut self, port: u16) {
        self.settings.port = port;
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.settings.password = password.into();
    }

    pub fn set_app_name(&mut self, app_name: impl Into<String>) {
        self.settings.app_name = app_name.into();
    }

    /// Send the full roster to the daemon
    pub async fn register(&mut self) -> ConnectionResult<()> {
        let packet = encode_registration(
            &self.settings.app_name,
            self.notifications.as_slice(),
            &self.settings.password,
        )?;
        self.send(&packet).await?;

        self.registered = true;
        self.stats.registrations += 1;

        tracing::info!(
            "Registered {} notification type(s) for '{}' with {}:{}",
            self.notifications.len(),
            self.settings.app_name,
            self.settings.address,
            self.settings.port
        );

        Ok(())
    }

    /// Send a notification
    pub async fn notify(&mut self, notification: &Notification) -> ConnectionResult<()> {
        if !self.registered {
            return Err(ConnectionError::NotRegistered);
        }

        let packet = encode_notify(notification, &self.settings.app_name, &self.settings.password)?;
        self.send(&packet).await?;
        self.stats.notifications += 1;

        tracing::debug!(
            "Sent '{}' notification to {}:{}",
            notification.name,
            self.settings.address,
            self.settings.port
        );

        Ok(())
    }

    async fn send(&mut self, packet: &[u8]) -> ConnectionResult<()> {
        self.transport
            .send(packet, &self.settings.address, self.settings.port)
            .await?;

        self.stats.packets_sent += 1;
        self.stats.bytes_sent += packet.len() as u64;
        Ok(())
    }
}

impl std::fmt::Debug for ServerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConnection")
            .field("address", &self.settings.address)
            .field("port", &self.settings.port)
            .field("app_name", &self.settings.app_name)
            .field("notifications", &self.notifications)
            .field("registered", &self.registered)
            .finish_non_exhaustive()
    }
}
