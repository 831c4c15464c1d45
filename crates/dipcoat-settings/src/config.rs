//! Configuration for the dipcoat controller
//!
//! Supports JSON and TOML files, chosen by extension. The default file lives
//! in the platform configuration directory as `dipcoat/config.toml`.
//!
//! Configuration is organized into sections:
//! - Connection settings (port, baud rate, reconnection)
//! - Command timeouts
//! - Event channel sizing
//!
//! Missing keys and sections take their defaults, so a partial file is valid.

use crate::error::{SettingsError, SettingsResult};
use dipcoat_communication::{ConnectionConfig, ControllerConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Port value that selects the port by discovery
pub const AUTO_PORT: &str = "Auto";

/// Serial connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Port name, or "Auto" to discover the board
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Reconnect after the link drops unexpectedly
    pub auto_reconnect: bool,
    /// Delay between reconnection attempts in milliseconds
    pub reconnect_delay_ms: u64,
    /// Wait after opening for the board to reboot, in milliseconds
    pub settle_delay_ms: u64,
    /// Serial read timeout in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: AUTO_PORT.to_string(),
            baud_rate: 9600,
            auto_reconnect: true,
            reconnect_delay_ms: 5000,
            settle_delay_ms: 2000,
            read_timeout_ms: 10,
        }
    }
}

impl ConnectionSettings {
    /// Explicit port, or `None` when discovery should pick one
    pub fn port(&self) -> Option<String> {
        let port = self.port.trim();
        if port.is_empty() || port.eq_ignore_ascii_case(AUTO_PORT) {
            None
        } else {
            Some(port.to_string())
        }
    }
}

/// How long operations wait for the firmware
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandSettings {
    /// Mode changes and version requests
    pub response_timeout_ms: u64,
    /// Status requests
    pub status_timeout_ms: u64,
    /// Home requests
    pub home_timeout_ms: u64,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            response_timeout_ms: 5000,
            status_timeout_ms: 2000,
            home_timeout_ms: 30000,
        }
    }
}

/// Event channel settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSettings {
    /// Events buffered per subscriber before it lags
    pub channel_capacity: usize,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Command timeouts
    pub commands: CommandSettings,
    /// Event channel
    pub events: EventSettings,
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location of the configuration file
    pub fn default_path() -> SettingsResult<PathBuf> {
        let mut path = dirs::config_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no configuration directory".to_string())
            })?;
        path.push("dipcoat");
        path.push("config.toml");
        Ok(path)
    }

    /// Load `path` if given, else the default file if it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> SettingsResult<Self> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        match Self::default_path() {
            Ok(path) if path.exists() => Self::load_from_file(&path),
            Ok(_) => Ok(Self::default()),
            Err(e) => {
                tracing::debug!("Using default configuration: {}", e);
                Ok(Self::default())
            }
        }
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path)?;

        let config: Self = match Format::of(path)? {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Save config to file (JSON or TOML), creating parent directories
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| SettingsError::ConfigDirectory(e.to_string()))?;
        }
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        let positive = [
            ("connection.baud_rate", u64::from(self.connection.baud_rate)),
            (
                "connection.reconnect_delay_ms",
                self.connection.reconnect_delay_ms,
            ),
            ("connection.read_timeout_ms", self.connection.read_timeout_ms),
            (
                "commands.response_timeout_ms",
                self.commands.response_timeout_ms,
            ),
            ("commands.status_timeout_ms", self.commands.status_timeout_ms),
            ("commands.home_timeout_ms", self.commands.home_timeout_ms),
            ("events.channel_capacity", self.events.channel_capacity as u64),
        ];

        for (key, value) in positive {
            if value == 0 {
                return Err(SettingsError::invalid(key, "must be > 0"));
            }
        }

        Ok(())
    }

    /// Controller configuration described by these settings
    pub fn controller_config(&self) -> ControllerConfig {
        let connection = &self.connection;
        ControllerConfig {
            connection: ConnectionConfig {
                baud_rate: connection.baud_rate,
                settle_delay: Duration::from_millis(connection.settle_delay_ms),
                reconnect_delay: Duration::from_millis(connection.reconnect_delay_ms),
                auto_reconnect: connection.auto_reconnect,
                read_timeout: Duration::from_millis(connection.read_timeout_ms),
                ..ConnectionConfig::default()
            },
            response_timeout: Duration::from_millis(self.commands.response_timeout_ms),
            status_timeout: Duration::from_millis(self.commands.status_timeout_ms),
            home_timeout: Duration::from_millis(self.commands.home_timeout_ms),
            event_capacity: self.events.channel_capacity,
        }
    }
}

enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Self::Toml),
            other => Err(SettingsError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}
