//! Configuration for GatiBridge
//!
//! Loads configuration from a TOML file. Every field has a default, so a
//! partial file (or no file at all) is valid.

use crate::codec::DecodeMode;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level bridge configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub peripheral: PeripheralConfig,
    #[serde(default)]
    pub handshake: HandshakeConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Planning-host listener settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// TCP bind address for the planning host
    ///
    /// Examples:
    /// - `0.0.0.0:12345` - All interfaces on port 12345
    /// - `127.0.0.1:12345` - Localhost only
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Acknowledgement sent back to the host (newline appended on the wire)
    #[serde(default = "default_ack_token")]
    pub ack_token: String,

    /// Read timeout on the client socket, bounds each receive poll
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// Motor-controller peripheral settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PeripheralConfig {
    /// Serial port used by the networked session
    #[serde(default = "default_port")]
    pub port: String,

    /// Serial port used by the local fallback session
    #[serde(default = "default_fallback_port")]
    pub fallback_port: String,

    /// UART baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
}

/// Request/confirm polling settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HandshakeConfig {
    /// Sleep between consecutive line reads
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Reads allowed while awaiting a single token
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
}

/// Session loop settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Throttle sleep at the end of every loop iteration
    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,

    /// Cross-check goal message labels against their positions
    #[serde(default)]
    pub strict_labels: bool,
}

/// Local fallback session settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackConfig {
    /// Goal message executed once when the networked session fails
    #[serde(default = "default_fallback_goal")]
    pub goal: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter (trace, debug, info, warn, error); RUST_LOG overrides it
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:12345".to_string()
}
fn default_ack_token() -> String {
    "ACK".to_string()
}
fn default_read_timeout_ms() -> u64 {
    500
}
fn default_port() -> String {
    "/dev/ttyACM0".to_string()
}
fn default_fallback_port() -> String {
    "COM6".to_string()
}
fn default_baud_rate() -> u32 {
    115_200
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_max_polls() -> u32 {
    600
} // 60s at the default poll interval
fn default_idle_interval_ms() -> u64 {
    10_000
}
fn default_fallback_goal() -> String {
    "x:0.1,y:0.0,o:0.0,dt:0.1,t_max:1.0".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            ack_token: default_ack_token(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            fallback_port: default_fallback_port(),
            baud_rate: default_baud_rate(),
        }
    }
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_interval_ms: default_idle_interval_ms(),
            strict_labels: false,
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            goal: default_fallback_goal(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl HandshakeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl SessionConfig {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    /// Codec mode selected by `strict_labels`
    pub fn decode_mode(&self) -> DecodeMode {
        if self.strict_labels {
            DecodeMode::Strict
        } else {
            DecodeMode::Positional
        }
    }
}

impl NetworkConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: BridgeConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values that would make the session unusable
    pub fn validate(&self) -> Result<()> {
        if self.handshake.max_polls == 0 {
            return Err(Error::Config("handshake.max_polls must be at least 1".into()));
        }
        if self.peripheral.port == self.peripheral.fallback_port {
            log::warn!(
                "Fallback port equals networked port ({}); fallback reuses the same device",
                self.peripheral.port
            );
        }
        Ok(())
    }
}
