//! FanHub configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::hub::HubConfig;

/// Main FanHub configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Listener configuration
    pub server: ServerConfig,

    /// Hub intake and mailbox sizing
    pub hub: HubConfig,

    /// Per-connection behavior
    pub connection: ConnectionConfig,

    /// Interactive client defaults
    pub client: ClientConfig,
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if !self.server.path.starts_with('/') {
            return Err(eyre::eyre!(
                "server.path must start with '/', got '{}'",
                self.server.path
            ));
        }
        if self.hub.mailbox_capacity == 0 {
            return Err(eyre::eyre!("hub.mailbox-capacity must be at least 1"));
        }
        if self.connection.read_timeout_ms == Some(0) {
            return Err(eyre::eyre!("connection.read-timeout-ms must be positive when set"));
        }
        if self.connection.write_timeout_ms == 0 {
            return Err(eyre::eyre!("connection.write-timeout-ms must be positive"));
        }
        if self.server.handshake_timeout_ms == 0 {
            return Err(eyre::eyre!("server.handshake-timeout-ms must be positive"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .fanhub.yml
        let local_config = PathBuf::from(".fanhub.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/fanhub/fanhub.yml
        if let Some(user_config) = user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed; the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => [Some(PathBuf::from(".fanhub.yml")), user_config_path()]
                .into_iter()
                .flatten()
                .collect(),
        };

        candidates
            .iter()
            .find(|p| p.exists())
            .and_then(|p| Self::load_from_file(p).ok())
            .and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fanhub").join("fanhub.yml"))
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind, host:port
    pub listen: String,

    /// Request path accepted for the WebSocket upgrade
    pub path: String,

    /// Largest inbound message accepted, in bytes
    #[serde(rename = "max-message-size")]
    pub max_message_size: usize,

    /// Drop a client that has not completed the upgrade within this long
    #[serde(rename = "handshake-timeout-ms")]
    pub handshake_timeout_ms: u64,
}

impl ServerConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:12345".to_string(),
            path: "/ws".to_string(),
            max_message_size: 64 * 1024,
            handshake_timeout_ms: 10_000,
        }
    }
}

/// Per-connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Drop a peer that sends nothing for this long (unset = never)
    #[serde(rename = "read-timeout-ms")]
    pub read_timeout_ms: Option<u64>,

    /// Drop a peer whose stream accepts no write for this long
    #[serde(rename = "write-timeout-ms")]
    pub write_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_timeout_ms: None,
            write_timeout_ms: 10_000,
        }
    }
}

impl ConnectionConfig {
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Interactive client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Hub URL to connect to
    pub url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:12345/ws".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.listen, "127.0.0.1:12345");
        assert_eq!(config.server.path, "/ws");
        assert_eq!(config.hub.mailbox_capacity, 256);
        assert_eq!(config.connection.read_timeout(), None);
        assert_eq!(config.connection.write_timeout(), Duration::from_secs(10));
        assert_eq!(config.server.handshake_timeout(), Duration::from_secs(10));
        assert_eq!(config.client.url, "ws://127.0.0.1:12345/ws");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: debug

server:
  listen: 0.0.0.0:9000
  path: /chat
  max-message-size: 4096
  handshake-timeout-ms: 2000

hub:
  intake-buffer: 50
  mailbox-capacity: 8

connection:
  read-timeout-ms: 30000
  write-timeout-ms: 500

client:
  url: ws://example.com:9000/chat
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.server.listen, "0.0.0.0:9000");
        assert_eq!(config.server.path, "/chat");
        assert_eq!(config.server.max_message_size, 4096);
        assert_eq!(config.hub.intake_buffer, 50);
        assert_eq!(config.hub.mailbox_capacity, 8);
        assert_eq!(config.connection.read_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.connection.write_timeout(), Duration::from_millis(500));
        assert_eq!(config.server.handshake_timeout(), Duration::from_secs(2));
        assert_eq!(config.client.url, "ws://example.com:9000/chat");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
hub:
  mailbox-capacity: 16
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.hub.mailbox_capacity, 16);
        assert_eq!(config.hub.intake_buffer, 1000);
        assert_eq!(config.server.path, "/ws");
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.server.path = "ws".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.hub.mailbox_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.connection.read_timeout_ms = Some(0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.connection.write_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.handshake_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("fanhub.yml");
        std::fs::write(&path, "log-level: warn\nserver:\n  listen: 127.0.0.1:0\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:0");
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("warn"));
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.yml");
        assert!(Config::load(Some(&path)).is_err());
        assert!(Config::load_log_level(Some(&path)).is_none());
    }
}
