//! TCP accept loops.
//!
//! [`run_server`] binds every configured listener and runs one [`serve`] loop
//! per socket.  Each accepted connection is handed to its own Tokio task
//! right away, so a slow client never delays the next `accept()`.
//!
//! # Shutdown
//!
//! `accept()` is polled with a 200 ms timeout so each loop can notice when the
//! shared `running` flag is cleared.  Connections already in flight are left
//! to finish on their own.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{error, info};

use gate_core::FailureCounters;

use crate::application::{PipelineAssembler, PipelineOptions, RequestHandler};
use crate::domain::{GatewayConfig, ProtocolFamily, SessionId};
use crate::infrastructure::connection::{handle_connection, ConnectionContext};

const ACCEPT_POLL: Duration = Duration::from_millis(200);

/// Accepts connections on `listener` until `running` is cleared.
///
/// `pinned` skips protocol detection for every connection on this listener.
pub async fn serve(
    listener: TcpListener,
    pinned: Option<ProtocolFamily>,
    ctx: Arc<ConnectionContext>,
    running: Arc<AtomicBool>,
) {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                let session_id = SessionId::new();
                info!("new connection from {peer_addr} (session {session_id})");
                if let Err(e) = stream.set_nodelay(true) {
                    error!("failed to set TCP_NODELAY for {peer_addr}: {e}");
                }
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    handle_connection(stream, peer_addr, session_id, pinned, ctx).await;
                });
            }
            Ok(Err(e)) => {
                // Transient, e.g. out of file descriptors.
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }
}

/// Binds every listener in `config` and serves them until `running` is
/// cleared.
///
/// # Errors
///
/// Returns an error if the pipeline specifications are malformed or a
/// listener cannot be bound.
pub async fn run_server(
    config: GatewayConfig,
    handler: Arc<dyn RequestHandler>,
    counters: Arc<FailureCounters>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let assembler = PipelineAssembler::new(PipelineOptions::from(&config))
        .context("invalid pipeline specification")?;
    let ctx = Arc::new(ConnectionContext {
        assembler,
        handler,
        counters: Arc::clone(&counters),
        file_grab_path: config.file_grab_path.clone(),
    });

    let mut tasks = Vec::with_capacity(config.listeners.len());
    for listener_config in &config.listeners {
        let listener = TcpListener::bind(listener_config.bind_addr)
            .await
            .with_context(|| format!("failed to bind listener on {}", listener_config.bind_addr))?;
        let pinned = listener_config.protocol.pinned();
        match pinned {
            Some(family) => info!("listening on {} ({family})", listener_config.bind_addr),
            None => info!("listening on {} (detect)", listener_config.bind_addr),
        }
        tasks.push(tokio::spawn(serve(
            listener,
            pinned,
            Arc::clone(&ctx),
            Arc::clone(&running),
        )));
    }

    for task in tasks {
        task.await.context("accept loop panicked")?;
    }

    for (kind, count) in counters.snapshot() {
        info!(failure = %kind, count, "connection failures");
    }
    Ok(())
}
