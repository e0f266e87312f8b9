//! Configuration module
//!
//! Handles loading and saving GrowlNet configuration, and merging each
//! server entry onto the connection defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::network::ConnectionSettings;
use crate::protocol::DEFAULT_PORT;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Values used for any field a server entry leaves out
    #[serde(default)]
    pub defaults: ConnectionDefaults,

    /// Servers, in the order notifications fan out to them
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

/// General configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
}

/// Connection defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDefaults {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default)]
    pub notifications: Vec<String>,
}

fn default_address() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_app_name() -> String {
    "PHP_Growl".to_string()
}

impl Default for ConnectionDefaults {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            password: String::new(),
            app_name: default_app_name(),
            notifications: Vec::new(),
        }
    }
}

/// One daemon entry. Absent fields fall back to [`ConnectionDefaults`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Unique server name used to target notifications
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications: Option<Vec<String>>,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn notifications<I, S>(mut self, notifications: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.notifications = Some(notifications.into_iter().map(Into::into).collect());
        self
    }
}

impl ConnectionDefaults {
    /// Merge a server entry onto these defaults. Fields set on the server
    /// win; a server's notification list replaces the default list.
    pub fn merge(&self, server: &ServerConfig) -> (ConnectionSettings, Vec<String>) {
        let settings = ConnectionSettings {
            address: server.address.clone().unwrap_or_else(|| self.address.clone()),
            port: server.port.unwrap_or(self.port),
            password: server.password.clone().unwrap_or_else(|| self.password.clone()),
            app_name: server.app_name.clone().unwrap_or_else(|| self.app_name.clone()),
        };
        let notifications = server
            .notifications
            .clone()
            .unwrap_or_else(|| self.notifications.clone());
        (settings, notifications)
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("growlnet/config.toml")),
            Some(PathBuf::from("./growlnet.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                return Self::load(path);
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Look up a server entry by name
    pub fn server(&self, name: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.name == name)
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    let config = Config {
        defaults: ConnectionDefaults {
            app_name: "GrowlNet".to_string(),
            notifications: vec!["Alert".to_string(), "Info".to_string()],
            ..Default::default()
        },
        servers: vec![
            ServerConfig::new("home").address("127.0.0.1"),
            ServerConfig::new("office")
                .address("office.example.com")
                .password("changeme")
                .notifications(["Alert"]),
        ],
        ..Default::default()
    };

    Ok(toml::to_string_pretty(&config)?)
}
