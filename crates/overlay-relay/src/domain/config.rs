//! Relay configuration types.
//!
//! [`RelayConfig`] is the single source of truth for all runtime settings of
//! the WebSocket server.  It is built once at startup from three layers, each
//! overriding the previous one:
//!
//! 1. Built-in defaults ([`RelayConfig::default`]).
//! 2. An optional TOML file ([`RelayFileConfig::load`]).
//! 3. Command-line flags and `OVERLAY_*` environment variables (see `main.rs`).
//!
//! # Example TOML file
//!
//! Every key is optional; missing keys keep their default value.
//!
//! ```toml
//! bind_address = "127.0.0.1"
//! port = 5000
//! ws_path = "/ws"
//! heartbeat_interval_ms = 1000
//! max_message_size = 256
//! outbound_queue_capacity = 64
//! event_queue_capacity = 1024
//! source = "stdin"
//! ```

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `bind_address` is not an IP address.
    #[error("invalid bind address '{0}'")]
    InvalidAddress(String),

    /// The input source name is not one of `stdin` / `none`.
    #[error("unknown input source '{0}' (expected 'stdin' or 'none')")]
    UnknownSource(String),

    /// A value is out of range.
    #[error("invalid setting {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

// ── Runtime configuration ─────────────────────────────────────────────────────

/// All runtime configuration for the relay server.
///
/// Build this struct once at startup and then wrap it in an `Arc` so it can be
/// shared cheaply across all session tasks.
///
/// # Example
///
/// ```rust
/// use overlay_relay::domain::RelayConfig;
///
/// let cfg = RelayConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 5000);
/// assert_eq!(cfg.ws_path, "/ws");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// The address and port the WebSocket server binds to.
    pub bind_addr: SocketAddr,

    /// The only request path accepted for the WebSocket upgrade.
    pub ws_path: String,

    /// Time between heartbeat pings.  A subscriber that has not echoed the
    /// previous nonce when the next tick fires is disconnected.
    pub heartbeat_interval: Duration,

    /// Largest inbound message accepted, in bytes.
    pub max_message_size: usize,

    /// Frames queued for one subscriber before new samples are dropped for it.
    pub outbound_queue_capacity: usize,

    /// Events queued between the input source and the broadcaster.
    pub event_queue_capacity: usize,
}

impl Default for RelayConfig {
    /// | Field                   | Default        |
    /// |-------------------------|----------------|
    /// | bind_addr               | `0.0.0.0:5000` |
    /// | ws_path                 | `/ws`          |
    /// | heartbeat_interval      | 1000 ms        |
    /// | max_message_size        | 256 bytes      |
    /// | outbound_queue_capacity | 64             |
    /// | event_queue_capacity    | 1024           |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), default_port()),
            ws_path: default_ws_path(),
            heartbeat_interval: Duration::from_millis(default_heartbeat_interval_ms()),
            max_message_size: default_max_message_size(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
            event_queue_capacity: default_event_queue_capacity(),
        }
    }
}

impl RelayConfig {
    /// Checks the values that would otherwise panic or misbehave at runtime
    /// (zero-length timers and queues, relative upgrade paths).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.ws_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                field: "ws_path",
                reason: "must start with '/'",
            });
        }
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::Invalid {
                field: "heartbeat_interval",
                reason: "must be greater than zero",
            });
        }
        if self.max_message_size == 0 {
            return Err(ConfigError::Invalid {
                field: "max_message_size",
                reason: "must be greater than zero",
            });
        }
        if self.outbound_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "outbound_queue_capacity",
                reason: "must be greater than zero",
            });
        }
        if self.event_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "event_queue_capacity",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }
}

// ── Input source selection ────────────────────────────────────────────────────

/// Which producer feeds the broadcaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Newline-delimited JSON event records on standard input.
    #[default]
    Stdin,
    /// No producer; the relay only serves heartbeats and subscriptions.
    None,
}

impl FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdin" => Ok(SourceKind::Stdin),
            "none" => Ok(SourceKind::None),
            _ => Err(ConfigError::UnknownSource(s.to_string())),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceKind::Stdin => "stdin",
            SourceKind::None => "none",
        })
    }
}

// ── File configuration ────────────────────────────────────────────────────────

/// On-disk configuration.  Every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayFileConfig {
    /// IP address to bind to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_ws_path")]
    pub ws_path: String,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
    #[serde(default)]
    pub source: SourceKind,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_ws_path() -> String {
    "/ws".to_string()
}
fn default_heartbeat_interval_ms() -> u64 {
    1000
}
fn default_max_message_size() -> usize {
    256
}
fn default_outbound_queue_capacity() -> usize {
    64
}
fn default_event_queue_capacity() -> usize {
    1024
}

impl Default for RelayFileConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            ws_path: default_ws_path(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            max_message_size: default_max_message_size(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
            event_queue_capacity: default_event_queue_capacity(),
            source: SourceKind::default(),
        }
    }
}

impl RelayFileConfig {
    /// Reads and parses a TOML config file.
    ///
    /// Unlike a platform config directory, an explicitly named file must
    /// exist: a missing file is an error, not a silent fallback to defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if the TOML is malformed or has unknown keys.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the TOML is malformed.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Resolves the file settings into a validated [`RelayConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if `bind_address` is not an IP
    /// address, or any error from [`RelayConfig::validate`].
    pub fn to_relay_config(&self) -> Result<RelayConfig, ConfigError> {
        let ip: IpAddr = self
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.bind_address.clone()))?;

        let config = RelayConfig {
            bind_addr: SocketAddr::new(ip, self.port),
            ws_path: self.ws_path.clone(),
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            max_message_size: self.max_message_size,
            outbound_queue_capacity: self.outbound_queue_capacity,
            event_queue_capacity: self.event_queue_capacity,
        };
        config.validate()?;
        Ok(config)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
