//! GrowlNet - Growl Network Transport client
//!
//! Registers notification types with one or more Growl daemons over UDP and
//! sends them notifications.
//!
//! ```no_run
//! use growlnet::config::{ConnectionDefaults, ServerConfig};
//! use growlnet::network::NotificationHub;
//! use growlnet::protocol::{Notification, Priority};
//!
//! # async fn run() -> Result<(), growlnet::network::HubError> {
//! let servers = vec![ServerConfig::new("home")
//!     .address("127.0.0.1")
//!     .notifications(["Alert"])];
//! let hub = NotificationHub::new(&servers, &ConnectionDefaults::default()).await?;
//!
//! let alert = Notification::new("Alert", "Build finished", "All green")
//!     .with_priority(Priority::High);
//! hub.notify(&alert, &[] as &[&str]).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod network;
pub mod protocol;
