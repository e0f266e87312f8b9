//! Notification hub
//!
//! Owns one [`ServerConnection`] per configured daemon, registers each of
//! them as it is built, and fans notifications out by server name.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use super::connection::{ConnectionError, ConnectionStats, ServerConnection};
use super::transport::{Transport, TransportError, UdpTransport};
use crate::config::{Config, ConnectionDefaults, ServerConfig};
use crate::protocol::Notification;

/// A single server that could not be reached
#[derive(Debug)]
pub struct DeliveryFailure {
    pub server: String,
    pub error: ConnectionError,
}

impl fmt::Display for DeliveryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.server, self.error)
    }
}

/// Hub errors
#[derive(Error, Debug)]
pub enum HubError {
    #[error("Unknown server: {0}")]
    UnknownServer(String),

    #[error("Duplicate server name: {0}")]
    DuplicateServer(String),

    #[error("Registration with '{server}' failed: {source}")]
    Registration {
        server: String,
        #[source]
        source: ConnectionError,
    },

    #[error("Delivery failed for {} server(s): {}", .0.len(), join_failures(.0))]
    Delivery(Vec<DeliveryFailure>),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

fn join_failures(failures: &[DeliveryFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type HubResult<T> = Result<T, HubError>;

/// Fan-out point for every configured daemon
pub struct NotificationHub {
    /// Connections in configuration order
    connections: Vec<(String, Mutex<ServerConnection>)>,
}

impl NotificationHub {
    /// Build and register a connection per server over a fresh UDP socket
    pub async fn new(servers: &[ServerConfig], defaults: &ConnectionDefaults) -> HubResult<Self> {
        let transport = UdpTransport::bind().await?;
        Self::with_transport(servers, defaults, Arc::new(transport)).await
    }

    /// Build the hub described by a loaded configuration
    pub async fn from_config(config: &Config) -> HubResult<Self> {
        Self::new(&config.servers, &config.defaults).await
    }

    /// Build and register a connection per server over the given transport.
    ///
    /// Stops at the first server that fails to register.
    pub async fn with_transport(
        servers: &[ServerConfig],
        defaults: &ConnectionDefaults,
        transport: Arc<dyn Transport>,
    ) -> HubResult<Self> {
        let mut connections: Vec<(String, Mutex<ServerConnection>)> =
            Vec::with_capacity(servers.len());

        for server in servers {
            if connections.iter().any(|(name, _)| *name == server.name) {
                return Err(HubError::DuplicateServer(server.name.clone()));
            }

            let (settings, notifications) = defaults.merge(server);
            let mut conn = ServerConnection::new(settings, transport.clone());
            for notification in notifications {
                conn.add_notification_type(notification);
            }

            conn.register().await.map_err(|source| HubError::Registration {
                server: server.name.clone(),
                source,
            })?;

            connections.push((server.name.clone(), Mutex::new(conn)));
        }

        tracing::debug!("Notification hub ready with {} server(s)", connections.len());
        Ok(Self { connections })
    }

    /// Server names in configuration order
    pub fn server_names(&self) -> impl Iterator<Item = &str> {
        self.connections.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn contains(&self, server: &str) -> bool {
        self.connection(server).is_some()
    }

    fn entry(&self, server: &str) -> Option<(&str, &Mutex<ServerConnection>)> {
        self.connections
            .iter()
            .find(|(name, _)| name == server)
            .map(|(name, conn)| (name.as_str(), conn))
    }

    fn connection(&self, server: &str) -> Option<&Mutex<ServerConnection>> {
        self.entry(server).map(|(_, conn)| conn)
    }

    fn require(&self, server: &str) -> HubResult<&Mutex<ServerConnection>> {
        self.connection(server)
            .ok_or_else(|| HubError::UnknownServer(server.to_string()))
    }

    /// Resolve targets to connections. No targets means every server.
    fn resolve<S: AsRef<str>>(
        &self,
        targets: &[S],
    ) -> HubResult<Vec<(&str, &Mutex<ServerConnection>)>> {
        if targets.is_empty() {
            return Ok(self
                .connections
                .iter()
                .map(|(name, conn)| (name.as_str(), conn))
                .collect());
        }

        let mut resolved: Vec<(&str, &Mutex<ServerConnection>)> = Vec::new();
        for target in targets {
            let target = target.as_ref();
            let (name, conn) = self
                .entry(target)
                .ok_or_else(|| HubError::UnknownServer(target.to_string()))?;
            if !resolved.iter().any(|(seen, _)| *seen == name) {
                resolved.push((name, conn));
            }
        }
        Ok(resolved)
    }

    /// Send a notification to the given servers, or to all of them when
    /// `targets` is empty.
    ///
    /// Every target is attempted; failures are collected into
    /// [`HubError::Delivery`].
    pub async fn notify<S: AsRef<str>>(
        &self,
        notification: &Notification,
        targets: &[S],
    ) -> HubResult<()> {
        let targets = self.resolve(targets)?;
        let mut failures = Vec::new();

        for (server, conn) in targets {
            if let Err(error) = conn.lock().await.notify(notification).await {
                tracing::warn!("Notification to '{}' failed: {}", server, error);
                failures.push(DeliveryFailure {
                    server: server.to_string(),
                    error,
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(HubError::Delivery(failures))
        }
    }

    /// Add a notification type to one server. It stays unregistered until
    /// [`register`](Self::register) is called.
    pub async fn add_notification_type(
        &self,
        server: &str,
        notification_type: impl Into<String>,
    ) -> HubResult<()> {
        self.require(server)?
            .lock()
            .await
            .add_notification_type(notification_type);
        Ok(())
    }

    /// Re-send one server's registration
    pub async fn register(&self, server: &str) -> HubResult<()> {
        self.require(server)?
            .lock()
            .await
            .register()
            .await
            .map_err(|source| HubError::Registration {
                server: server.to_string(),
                source,
            })
    }

    /// Re-send every server's registration, collecting failures
    pub async fn register_all(&self) -> HubResult<()> {
        let mut failures = Vec::new();

        for (server, conn) in &self.connections {
            if let Err(error) = conn.lock().await.register().await {
                tracing::warn!("Registration with '{}' failed: {}", server, error);
                failures.push(DeliveryFailure {
                    server: server.clone(),
                    error,
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(HubError::Delivery(failures))
        }
    }

    /// Whether a server's current roster has been registered
    pub async fn is_registered(&self, server: &str) -> HubResult<bool> {
        Ok(self.require(server)?.lock().await.is_registered())
    }

    /// Send statistics for one server
    pub async fn stats(&self, server: &str) -> HubResult<ConnectionStats> {
        Ok(self.require(server)?.lock().await.stats().clone())
    }
}

impl fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationHub")
            .field("servers", &self.server_names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::transport::{RecordingTransport, SentPacket};
    use crate::protocol::{TYPE_NOTIFICATION, TYPE_REGISTRATION};
    use async_trait::async_trait;
    use tokio_test::assert_ok;

    const NO_TARGETS: &[&str] = &[];

    fn be16(buf: &[u8], at: usize) -> u16 {
        u16::from_be_bytes([buf[at], buf[at + 1]])
    }

    fn servers() -> Vec<ServerConfig> {
        vec![
            ServerConfig::new("home").address("10.0.0.1").notifications(["Alert"]),
            ServerConfig::new("office").address("10.0.0.2").notifications(["Alert"]),
            ServerConfig::new("laptop").address("10.0.0.3").notifications(["Alert"]),
        ]
    }

    async fn hub() -> (NotificationHub, RecordingTransport) {
        let transport = RecordingTransport::new();
        let hub = NotificationHub::with_transport(
            &servers(),
            &ConnectionDefaults::default(),
            Arc::new(transport.clone()),
        )
        .await
        .unwrap();
        transport.take();
        (hub, transport)
    }

    fn hosts(packets: &[SentPacket]) -> Vec<&str> {
        packets.iter().map(|p| p.host.as_str()).collect()
    }

    /// Refuses to send to one host
    struct RejectingTransport {
        inner: RecordingTransport,
        reject: String,
    }

    #[async_trait]
    impl Transport for RejectingTransport {
        async fn send(&self, packet: &[u8], host: &str, port: u16) -> Result<(), TransportError> {
            if host == self.reject {
                return Err(TransportError::Resolve(host.to_string()));
            }
            self.inner.send(packet, host, port).await
        }
    }

    #[tokio::test]
    async fn test_round_trip_scenario() {
        let transport = RecordingTransport::new();
        let servers = vec![ServerConfig::new("home")
            .address("127.0.0.1")
            .port(9887)
            .app_name("Test")
            .notifications(["Alert"])];
        let hub = NotificationHub::with_transport(
            &servers,
            &ConnectionDefaults::default(),
            Arc::new(transport.clone()),
        )
        .await
        .unwrap();

        let registrations = transport.take();
        assert_eq!(registrations.len(), 1);
        let reg = &registrations[0].bytes;
        assert_eq!(reg[1], TYPE_REGISTRATION);
        assert_eq!(be16(reg, 2), 4);
        assert_eq!(reg[4], 1);
        assert!(reg.windows(5).any(|w| w == b"Alert"));
        assert_eq!(registrations[0].host, "127.0.0.1");
        assert_eq!(registrations[0].port, 9887);

        assert_ok!(hub.notify(&Notification::new("Alert", "Hi", "Body"), NO_TARGETS).await);

        let notifications = transport.take();
        assert_eq!(notifications.len(), 1);
        let packet = &notifications[0].bytes;
        assert_eq!(packet[1], TYPE_NOTIFICATION);
        assert_eq!(be16(packet, 2), 0);
        assert_eq!(be16(packet, 4), 5);
        assert_eq!(be16(packet, 6), 2);
        assert_eq!(be16(packet, 8), 4);
    }

    #[tokio::test]
    async fn test_defaults_applied() {
        let transport = RecordingTransport::new();
        let hub = NotificationHub::with_transport(
            &[ServerConfig::new("local")],
            &ConnectionDefaults::default(),
            Arc::new(transport.clone()),
        )
        .await
        .unwrap();

        let packets = transport.take();
        assert_eq!(packets[0].host, "localhost");
        assert_eq!(packets[0].port, 9887);
        assert_eq!(&packets[0].bytes[6..15], b"PHP_Growl");
        assert_eq!(packets[0].bytes[4], 0);
        assert!(assert_ok!(hub.is_registered("local").await));
    }

    #[tokio::test]
    async fn test_empty_targets_means_all_in_order() {
        let (hub, transport) = hub().await;
        assert_ok!(hub.notify(&Notification::new("Alert", "Hi", "Body"), NO_TARGETS).await);

        let packets = transport.take();
        assert_eq!(hosts(&packets), ["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        assert_eq!(hub.server_names().collect::<Vec<_>>(), ["home", "office", "laptop"]);
    }

    #[tokio::test]
    async fn test_selected_targets() {
        let (hub, transport) = hub().await;
        let n = Notification::new("Alert", "Hi", "Body");
        assert_ok!(hub.notify(&n, &["laptop", "home", "laptop"]).await);

        let packets = transport.take();
        assert_eq!(hosts(&packets), ["10.0.0.3", "10.0.0.1"]);
    }

    #[tokio::test]
    async fn test_unknown_target() {
        let (hub, transport) = hub().await;
        let n = Notification::new("Alert", "Hi", "Body");

        let err = hub.notify(&n, &["home", "attic"]).await.unwrap_err();
        assert!(matches!(err, HubError::UnknownServer(ref name) if name == "attic"));
        assert!(transport.take().is_empty());
    }

    #[tokio::test]
    async fn test_construction_stops_at_failed_registration() {
        let inner = RecordingTransport::new();
        let transport = Arc::new(RejectingTransport {
            inner: inner.clone(),
            reject: "10.0.0.2".to_string(),
        });
        let hub = NotificationHub::with_transport(
            &servers()[..1],
            &ConnectionDefaults::default(),
            transport.clone(),
        )
        .await
        .unwrap();
        assert_eq!(hub.len(), 1);

        let err = NotificationHub::with_transport(&servers(), &ConnectionDefaults::default(), transport)
            .await
            .unwrap_err();
        match err {
            HubError::Registration { server, source } => {
                assert_eq!(server, "office");
                assert!(matches!(source, ConnectionError::Transport(_)));
            }
            other => panic!("unexpected error: {other}"),
        }

        // "home" registered twice, "laptop" never attempted
        assert_eq!(hosts(&inner.packets()), ["10.0.0.1", "10.0.0.1"]);
    }

    #[tokio::test]
    async fn test_notify_reports_every_failure() {
        let (hub, transport) = hub().await;
        assert_ok!(hub.add_notification_type("home", "Info").await);
        assert_ok!(hub.add_notification_type("laptop", "Info").await);

        let err = hub
            .notify(&Notification::new("Alert", "Hi", "Body"), NO_TARGETS)
            .await
            .unwrap_err();
        match err {
            HubError::Delivery(failures) => {
                let names: Vec<_> = failures.iter().map(|f| f.server.as_str()).collect();
                assert_eq!(names, ["home", "laptop"]);
                assert!(failures
                    .iter()
                    .all(|f| matches!(f.error, ConnectionError::NotRegistered)));
            }
            other => panic!("unexpected error: {other}"),
        }

        // The healthy server still got its notification
        assert_eq!(hosts(&transport.take()), ["10.0.0.2"]);

        assert_ok!(hub.register_all().await);
        assert_ok!(hub.notify(&Notification::new("Info", "Hi", "Body"), NO_TARGETS).await);
        assert_eq!(transport.take().len(), 6);
    }

    #[tokio::test]
    async fn test_register_single_server() {
        let (hub, transport) = hub().await;
        assert_ok!(hub.add_notification_type("office", "Info").await);
        assert!(!assert_ok!(hub.is_registered("office").await));

        assert_ok!(hub.register("office").await);
        assert!(assert_ok!(hub.is_registered("office").await));

        let packets = transport.take();
        assert_eq!(hosts(&packets), ["10.0.0.2"]);
        assert_eq!(packets[0].bytes[4], 2);

        let stats = assert_ok!(hub.stats("office").await);
        assert_eq!(stats.registrations, 2);

        assert!(matches!(
            hub.register("attic").await,
            Err(HubError::UnknownServer(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_server_names() {
        let transport = RecordingTransport::new();
        let servers = vec![ServerConfig::new("home"), ServerConfig::new("home")];
        let err = NotificationHub::with_transport(
            &servers,
            &ConnectionDefaults::default(),
            Arc::new(transport),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, HubError::DuplicateServer(ref name) if name == "home"));
    }

    #[tokio::test]
    async fn test_hub_over_udp() {
        let receiver = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();
        let servers = vec![ServerConfig::new("loopback")
            .address("127.0.0.1")
            .port(port)
            .notifications(["Alert"])];

        let hub = NotificationHub::new(&servers, &ConnectionDefaults::default())
            .await
            .unwrap();
        assert!(hub.contains("loopback"));

        let mut buf = [0u8; 1024];
        let (n, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(buf[1], TYPE_REGISTRATION);
        assert!(n > 16);

        assert_ok!(hub.notify(&Notification::new("Alert", "Hi", "Body"), &["loopback"]).await);
        let (_, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(buf[1], TYPE_NOTIFICATION);
    }
}
