//! gate-server — entry point.
//!
//! Accepts game client connections on the configured listeners, detects which
//! protocol each one speaks (raw game protocol, file-grab, or either of those
//! behind a WebSocket upgrade) and runs the matching pipeline.
//!
//! # Usage
//!
//! ```text
//! gate-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>            TOML config file
//!   --idle-timeout <SECS>      Close connections idle for this long
//!   --no-websocket-envelope    Send raw bytes to upgraded clients
//!   --file-grab-path <PATH>    Upgrade path that carries file-grab traffic
//!   --resource-root <DIR>      Directory file-grab requests are served from
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                     | Flag                      |
//! |------------------------------|---------------------------|
//! | `GATE_CONFIG`                | `--config`                |
//! | `GATE_IDLE_TIMEOUT`          | `--idle-timeout`          |
//! | `GATE_NO_WEBSOCKET_ENVELOPE` | `--no-websocket-envelope` |
//! | `GATE_FILE_GRAB_PATH`        | `--file-grab-path`        |
//! | `GATE_RESOURCE_ROOT`         | `--resource-root`         |
//!
//! Flags win over the config file; the config file wins over built-in
//! defaults.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use gate_core::FailureCounters;
use gate_server::domain::GatewayConfig;
use gate_server::infrastructure::{run_server, GameInbound, GatewayHandler};

/// Capacity of the channel carrying game frames to the game world.
const GAME_SINK_CAPACITY: usize = 1024;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Multi-protocol ingress gateway for the game world server.
#[derive(Debug, Parser)]
#[command(
    name = "gate-server",
    about = "Multi-protocol ingress gateway for the game world server",
    version
)]
struct Cli {
    /// TOML config file.  Built-in defaults are used when omitted.
    #[arg(long, env = "GATE_CONFIG")]
    config: Option<PathBuf>,

    /// Seconds without inbound activity before a connection is closed.
    #[arg(long, env = "GATE_IDLE_TIMEOUT")]
    idle_timeout: Option<u64>,

    /// Do not wrap responses to upgraded clients in WebSocket frames.
    #[arg(long, env = "GATE_NO_WEBSOCKET_ENVELOPE")]
    no_websocket_envelope: bool,

    /// Upgrade path that carries file-grab traffic.
    #[arg(long, env = "GATE_FILE_GRAB_PATH")]
    file_grab_path: Option<String>,

    /// Directory file-grab requests are served from.
    #[arg(long, env = "GATE_RESOURCE_ROOT")]
    resource_root: Option<PathBuf>,
}

impl Cli {
    /// Loads the config file (if any) and applies the CLI overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or the final
    /// configuration is invalid.
    fn into_gateway_config(self) -> anyhow::Result<GatewayConfig> {
        let mut config = match &self.config {
            Some(path) => GatewayConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => GatewayConfig::default(),
        };

        if let Some(secs) = self.idle_timeout {
            config.idle_timeout_secs = secs;
        }
        if self.no_websocket_envelope {
            config.websocket_envelope = false;
        }
        if let Some(path) = self.file_grab_path {
            config.file_grab_path = path;
        }
        if let Some(root) = self.resource_root {
            config.resource_root = root;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_gateway_config()?;

    info!(
        "gate-server starting: {} listener(s), idle timeout {}s, resources at {}",
        config.listeners.len(),
        config.idle_timeout_secs,
        config.resource_root.display()
    );

    // ── Game frame sink ───────────────────────────────────────────────────────
    let (game_tx, mut game_rx) = mpsc::channel::<GameInbound>(GAME_SINK_CAPACITY);
    tokio::spawn(async move {
        while let Some(inbound) = game_rx.recv().await {
            debug!(
                session = %inbound.session_id,
                opcode = inbound.frame.opcode,
                len = inbound.frame.payload.len(),
                "game frame"
            );
        }
    });
    let handler = Arc::new(GatewayHandler::new(config.resource_root.clone(), game_tx));

    // ── Graceful shutdown flag ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, handler, Arc::new(FailureCounters::new()), running).await?;

    info!("gate-server stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cli_defaults_leave_config_defaults() {
        // Arrange: no arguments
        let cli = Cli::parse_from(["gate-server"]);

        // Act
        let config = cli.into_gateway_config().unwrap();

        // Assert
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn test_cli_idle_timeout_override() {
        let cli = Cli::parse_from(["gate-server", "--idle-timeout", "30"]);
        let config = cli.into_gateway_config().unwrap();
        assert_eq!(config.idle_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_cli_disables_envelope() {
        let cli = Cli::parse_from(["gate-server", "--no-websocket-envelope"]);
        let config = cli.into_gateway_config().unwrap();
        assert!(!config.websocket_envelope);
    }

    #[test]
    fn test_cli_path_overrides() {
        let cli = Cli::parse_from([
            "gate-server",
            "--file-grab-path",
            "/files",
            "--resource-root",
            "/srv/cache",
        ]);
        let config = cli.into_gateway_config().unwrap();
        assert_eq!(config.file_grab_path, "/files");
        assert_eq!(config.resource_root, PathBuf::from("/srv/cache"));
    }

    #[test]
    fn test_cli_zero_idle_timeout_is_rejected() {
        // Arrange
        let cli = Cli::parse_from(["gate-server", "--idle-timeout", "0"]);

        // Act
        let result = cli.into_gateway_config();

        // Assert: must return an error, not panic
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_missing_config_file_is_an_error() {
        let cli = Cli::parse_from(["gate-server", "--config", "/nonexistent/gate.toml"]);
        assert!(cli.into_gateway_config().is_err());
    }
}
