//! Gateway configuration.
//!
//! [`GatewayConfig`] is loaded from a TOML file and then overridden by CLI
//! flags in `main.rs`.  Every field has a default, so an empty file (or no
//! file at all) yields a working gateway:
//!
//! ```toml
//! idle_timeout_secs = 15
//! websocket_envelope = true
//! file_grab_path = "/jaggrab"
//! resource_root = "./data/fs"
//!
//! [[listeners]]
//! bind_addr = "0.0.0.0:43594"
//! protocol = "detect"
//!
//! [[listeners]]
//! bind_addr = "0.0.0.0:43595"
//! protocol = "file-grab"
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` take the value of
//! `some_fn()` when absent from the file, which keeps older config files valid
//! when new fields are added.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::protocol::ProtocolFamily;

/// Error type for configuration loading.
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

    /// The values parsed but make no sense together.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Schema ────────────────────────────────────────────────────────────────────

/// All runtime configuration for the gateway.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GatewayConfig {
    /// Addresses to accept connections on.
    #[serde(default = "default_listeners")]
    pub listeners: Vec<ListenerConfig>,

    /// Seconds without inbound activity before a connection is closed.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Wrap outbound bytes in WebSocket binary frames on upgraded connections.
    #[serde(default = "default_true")]
    pub websocket_envelope: bool,

    /// Upgrade requests whose target starts with this path carry file-grab
    /// traffic; every other upgrade carries the game protocol.
    #[serde(default = "default_file_grab_path")]
    pub file_grab_path: String,

    /// Directory file-grab requests are served from.
    #[serde(default = "default_resource_root")]
    pub resource_root: PathBuf,
}

/// One listening socket.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ListenerConfig {
    pub bind_addr: SocketAddr,
    #[serde(default)]
    pub protocol: ListenerProtocol,
}

/// What a listener expects its connections to speak.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ListenerProtocol {
    /// Classify each connection from its first bytes.
    #[default]
    Detect,
    Game,
    FileGrab,
    #[serde(rename = "file-grab-websocket")]
    FileGrabWebSocket,
    #[serde(rename = "game-websocket")]
    GameWebSocket,
}

impl ListenerProtocol {
    /// The family every connection on this listener is pinned to, if any.
    pub fn pinned(self) -> Option<ProtocolFamily> {
        match self {
            ListenerProtocol::Detect => None,
            ListenerProtocol::Game => Some(ProtocolFamily::Game),
            ListenerProtocol::FileGrab => Some(ProtocolFamily::FileGrab),
            ListenerProtocol::FileGrabWebSocket => Some(ProtocolFamily::FileGrabWebSocket),
            ListenerProtocol::GameWebSocket => Some(ProtocolFamily::GameWebSocket),
        }
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_listeners() -> Vec<ListenerConfig> {
    vec![
        ListenerConfig {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 43594)),
            protocol: ListenerProtocol::Detect,
        },
        ListenerConfig {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 43595)),
            protocol: ListenerProtocol::FileGrab,
        },
    ]
}
fn default_idle_timeout_secs() -> u64 {
    15
}
fn default_true() -> bool {
    true
}
fn default_file_grab_path() -> String {
    "/jaggrab".to_string()
}
fn default_resource_root() -> PathBuf {
    PathBuf::from("./data/fs")
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listeners: default_listeners(),
            idle_timeout_secs: default_idle_timeout_secs(),
            websocket_envelope: default_true(),
            file_grab_path: default_file_grab_path(),
            resource_root: default_resource_root(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl GatewayConfig {
    /// Reads and validates the config file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Parse`] if the TOML is malformed, and
    /// [`ConfigError::Invalid`] if [`validate`](Self::validate) fails.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parses and validates config text.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: GatewayConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the cross-field rules serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first broken rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listeners.is_empty() {
            return Err(ConfigError::Invalid("at least one listener is required".into()));
        }
        if self.idle_timeout_secs == 0 {
            return Err(ConfigError::Invalid("idle_timeout_secs must be positive".into()));
        }
        if !self.file_grab_path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "file_grab_path must start with '/': {:?}",
                self.file_grab_path
            )));
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
