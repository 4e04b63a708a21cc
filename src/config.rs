//! Server and client configuration.
//!
//! Values come from an optional TOML file with `[server]` and `[client]`
//! tables; command-line flags override whatever the file sets.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 4999
//! drain_timeout_secs = 30
//!
//! [client]
//! host = "127.0.0.1"
//! port = 4999
//! poll_interval_ms = 1000
//! ```

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Default N3TP service port.
pub const DEFAULT_PORT: u16 = 4999;

/// Clients never poll faster than this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[instrument]
fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

#[instrument]
fn default_client_host() -> String {
    "127.0.0.1".to_string()
}

#[instrument]
fn default_port() -> u16 {
    DEFAULT_PORT
}

#[instrument]
fn default_drain_timeout_secs() -> u64 {
    30
}

#[instrument]
fn default_poll_interval_ms() -> u64 {
    1000
}

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_", into)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_server_host")]
    host: String,

    /// Port to bind; `0` lets the OS choose.
    #[serde(default = "default_port")]
    port: u16,

    /// How long running handlers may keep going after the listener closes.
    #[serde(default = "default_drain_timeout_secs")]
    drain_timeout_secs: u64,
}

impl ServerConfig {
    /// `host:port` string to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Drain timeout as a duration.
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_port(),
            drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

/// Interactive client settings.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_", into)]
pub struct ClientConfig {
    /// Server host.
    #[serde(default = "default_client_host")]
    host: String,

    /// Server port.
    #[serde(default = "default_port")]
    port: u16,

    /// Delay between PLAYERTURN polls.
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,
}

impl ClientConfig {
    /// `host:port` string to connect to.
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Poll interval, never shorter than [`MIN_POLL_INTERVAL`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).max(MIN_POLL_INTERVAL)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_client_host(),
            port: default_port(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// Contents of a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ConfigFile {
    /// `[server]` table.
    #[serde(default)]
    server: ServerConfig,

    /// `[client]` table.
    #[serde(default)]
    client: ClientConfig,
}

impl ConfigFile {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(port = config.server.port, "Config loaded successfully");
        Ok(config)
    }

    /// Loads `path` if given, otherwise returns defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        path.map_or_else(|| Ok(Self::default()), Self::from_file)
    }

    /// Splits into the two sections.
    pub fn into_parts(self) -> (ServerConfig, ClientConfig) {
        (self.server, self.client)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let server = ServerConfig::default();
        assert_eq!(server.bind_address(), "0.0.0.0:4999");
        assert_eq!(server.drain_timeout(), Duration::from_secs(30));

        let client = ClientConfig::default();
        assert_eq!(client.server_address(), "127.0.0.1:4999");
        assert_eq!(client.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_poll_interval_is_clamped() {
        let client = ClientConfig::default().with_poll_interval_ms(10u64);
        assert_eq!(client.poll_interval(), MIN_POLL_INTERVAL);
        let client = ClientConfig::default().with_poll_interval_ms(2500u64);
        assert_eq!(client.poll_interval(), Duration::from_millis(2500));
    }

    #[test]
    fn test_setters_override() {
        let server = ServerConfig::default().with_host("127.0.0.1").with_port(0u16);
        assert_eq!(server.bind_address(), "127.0.0.1:0");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ConfigFile = toml::from_str("[server]\nport = 5000\n").unwrap();
        assert_eq!(*config.server().port(), 5000);
        assert_eq!(config.server().host(), "0.0.0.0");
        assert_eq!(config.client(), &ClientConfig::default());
    }
}
