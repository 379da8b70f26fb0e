//! Configuration for the exporter.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Locations probed (in order) when no `--config` flag is given.
pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "/etc/wut-temperature-exporter/config.json5",
    "config.json5",
];

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("No config file found in the fixed search path")]
    NotFound,
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// SNMP community string shared by all targets.
    #[serde(default = "default_community")]
    pub community: String,

    /// Devices that can be scraped.
    #[serde(default)]
    pub targets: Vec<TargetConfig>,

    /// SNMP protocol settings.
    #[serde(default)]
    pub snmp: SnmpConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_community() -> String {
    "public".to_string()
}

/// One pollable temperature sensor device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Device address, host or IP without port (e.g., "192.168.1.20").
    pub address: String,

    /// Room the device sits in; doubles as its lookup name.
    pub room: String,
}

/// SNMP protocol settings shared by every walk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnmpConfig {
    /// Agent UDP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport timeout per attempt, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Walk attempts before giving up (each bounded by `timeout_secs`).
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// OID subtree holding the sensor value array.
    #[serde(default = "default_oid_root")]
    pub oid_root: String,
}

fn default_port() -> u16 {
    161
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_oid_root() -> String {
    // W&T Web-Thermometer sensor value table.
    "1.3.6.1.4.1.5040.1.2.6.1.3.1.1".to_string()
}

impl Default for SnmpConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            oid_root: default_oid_root(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address to listen on (default: "0.0.0.0:9191").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// How long in-flight scrapes may run after a termination signal.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_listen() -> String {
    "0.0.0.0:9191".to_string()
}

fn default_shutdown_grace_secs() -> u64 {
    5
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ExporterConfig = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the first existing search path entry.
    pub fn load_default() -> Result<Self, ConfigError> {
        for path in CONFIG_SEARCH_PATHS {
            if Path::new(path).exists() {
                return Self::load_from_file(path);
            }
        }
        Err(ConfigError::NotFound)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.targets.is_empty() {
            return Err(ConfigError::Validation(
                "at least one target must be configured".to_string(),
            ));
        }

        for target in &self.targets {
            if target.address.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "target '{}' has no address",
                    target.room
                )));
            }
            if target.room.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "target '{}' has no room",
                    target.address
                )));
            }
        }

        if self.snmp.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "snmp.timeout_secs must be > 0".to_string(),
            ));
        }

        if self.snmp.retries == 0 {
            return Err(ConfigError::Validation(
                "snmp.retries must be > 0".to_string(),
            ));
        }

        if crate::walker::parse_oid(&self.snmp.oid_root).is_err() {
            return Err(ConfigError::Validation(format!(
                "snmp.oid_root is not a valid OID: {}",
                self.snmp.oid_root
            )));
        }

        if self.http.shutdown_grace_secs == 0 {
            return Err(ConfigError::Validation(
                "http.shutdown_grace_secs must be > 0".to_string(),
            ));
        }

        if self.http.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "invalid listen address: {}",
                self.http.listen
            )));
        }

        Ok(())
    }
}
