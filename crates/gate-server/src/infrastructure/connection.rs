//! The per-connection driver.
//!
//! One Tokio task runs [`handle_connection`] for each accepted socket.  It:
//!
//! 1. sniffs the first bytes to pick a [`ProtocolFamily`] (unless the
//!    listener pins one),
//! 2. assembles that family's pipeline,
//! 3. loops reading from the socket, feeding each read through the pipeline,
//!    writing back whatever the stages produced, and dispatching decoded
//!    requests to the [`RequestHandler`] one at a time,
//! 4. closes the socket on EOF, on any [`PipelineError`], or when no inbound
//!    activity reaches the idle-timeout stage before the read deadline.
//!
//! # Streaming reads
//!
//! TCP is a *stream* protocol: one `read()` may carry part of a request or
//! several of them.  The pipeline's stages buffer partial input, so the driver
//! only ever hands them whatever the last `read()` returned.
//!
//! The driver is generic over `AsyncRead + AsyncWrite` so that tests can run it
//! over an in-memory duplex stream.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn, Instrument};

use gate_core::protocol::http::ResponseHead;
use gate_core::{FailureCounters, FailureKind, PipelineError};

use crate::application::{
    detect, Detection, Dispatch, PipelineAssembler, RequestHandler, SessionContext,
};
use crate::application::stages::encode_response;
use crate::domain::{ProtocolFamily, SessionId};

/// Size of the temporary buffer for each individual `read()` call.
const READ_CHUNK: usize = 4096;

/// Everything a connection task needs, shared by all connections.
pub struct ConnectionContext {
    pub assembler: PipelineAssembler,
    pub handler: Arc<dyn RequestHandler>,
    pub counters: Arc<FailureCounters>,
    /// Upgrade targets under this path are file-grab traffic.
    pub file_grab_path: String,
}

impl ConnectionContext {
    fn idle_timeout(&self) -> Duration {
        self.assembler.options().idle_timeout
    }
}

/// Runs one connection to completion and logs how it ended.
///
/// Failures are counted in `ctx.counters` before the socket is closed.  A
/// rejected upgrade handshake gets a `400 Bad Request` first.
pub async fn handle_connection<S>(
    mut stream: S,
    peer_addr: SocketAddr,
    session_id: SessionId,
    pinned: Option<ProtocolFamily>,
    ctx: Arc<ConnectionContext>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let span = tracing::info_span!("connection", session = %session_id, peer = %peer_addr);

    async move {
        let mut session = None;
        let result = run_connection(&mut stream, peer_addr, session_id, pinned, &ctx, &mut session).await;

        let failure = match &result {
            Ok(()) => {
                info!("connection closed by peer");
                None
            }
            Err(e) => {
                let kind = e.kind();
                ctx.counters.record(kind);
                warn!(failure = %kind, "connection closed: {e}");
                if kind == FailureKind::HandshakeRejected {
                    if let Err(e) = send_bad_request(&mut stream).await {
                        debug!("could not send 400 to rejected client: {e}");
                    }
                }
                Some(kind)
            }
        };

        if let Some(session) = &session {
            ctx.handler.on_close(session, failure).await;
        }
        // The peer may already be gone; nothing useful to do with this error.
        let _ = stream.shutdown().await;
    }
    .instrument(span)
    .await;
}

/// Runs the complete lifecycle of a single connection.
///
/// `session` is filled in once the protocol family is known, so the caller
/// can notify the handler on close even when this returns an error.
///
/// # Errors
///
/// Returns the [`PipelineError`] that ended the connection.
async fn run_connection<S>(
    stream: &mut S,
    peer_addr: SocketAddr,
    session_id: SessionId,
    pinned: Option<ProtocolFamily>,
    ctx: &ConnectionContext,
    session: &mut Option<SessionContext>,
) -> Result<(), PipelineError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let accepted_at = Instant::now();
    let idle_timeout = ctx.idle_timeout();
    let mut read_tmp = vec![0u8; READ_CHUNK];

    // ── Step 1: Pick the protocol ─────────────────────────────────────────────
    let (family, mut carried) = match pinned {
        Some(family) => (family, Vec::new()),
        None => {
            let deadline = accepted_at + idle_timeout;
            match sniff(stream, &mut read_tmp, deadline, idle_timeout, &ctx.file_grab_path).await? {
                Some(detected) => detected,
                None => return Ok(()),
            }
        }
    };
    debug!(protocol = %family, "protocol selected");

    let current = SessionContext {
        session_id,
        peer_addr,
        protocol: family,
    };
    *session = Some(current.clone());

    // ── Step 2: Assemble the pipeline ─────────────────────────────────────────
    let mut pipeline = ctx.assembler.assemble(family, session_id, accepted_at);

    // ── Step 3: Read / decode / dispatch until EOF or failure ─────────────────
    loop {
        let bytes = if carried.is_empty() {
            match read_before(stream, &mut read_tmp, pipeline.read_deadline(), idle_timeout).await? {
                Some(n) => read_tmp[..n].to_vec(),
                None => return Ok(()),
            }
        } else {
            std::mem::take(&mut carried)
        };

        let transfer = pipeline.fire_read(bytes, Instant::now());

        for chunk in &transfer.writes {
            stream.write_all(chunk).await?;
        }
        for dispatch in transfer.dispatches {
            match dispatch {
                Dispatch::Event(event) => ctx.handler.on_event(&current, event).await,
                Dispatch::Request(request) => {
                    if let Some(response) = ctx.handler.handle(&current, request).await {
                        let encoded = pipeline.write(response)?;
                        stream.write_all(&encoded).await?;
                    }
                }
            }
        }
        stream.flush().await?;

        // Requests decoded ahead of a failure in the same read were served
        // above; now the failure closes the connection.
        if let Some(failure) = transfer.failure {
            return Err(failure);
        }
    }
}

async fn send_bad_request<S>(stream: &mut S) -> Result<(), PipelineError>
where
    S: AsyncWrite + Unpin,
{
    let bytes = encode_response(&ResponseHead::bad_request())?;
    stream.write_all(&bytes).await?;
    Ok(())
}

/// Reads until the buffered prefix identifies a protocol family.
///
/// Returns the family and every byte read so far, or `None` on EOF.
async fn sniff<S>(
    stream: &mut S,
    read_tmp: &mut [u8],
    deadline: Instant,
    idle_timeout: Duration,
    file_grab_path: &str,
) -> Result<Option<(ProtocolFamily, Vec<u8>)>, PipelineError>
where
    S: AsyncRead + Unpin,
{
    let mut prefix = Vec::new();
    loop {
        match read_before(stream, read_tmp, deadline, idle_timeout).await? {
            Some(n) => prefix.extend_from_slice(&read_tmp[..n]),
            None => return Ok(None),
        }
        if let Detection::Detected(family) = detect(&prefix, file_grab_path)? {
            return Ok(Some((family, prefix)));
        }
    }
}

/// One `read()` bounded by `deadline`.
///
/// Returns `Ok(None)` on EOF and [`PipelineError::IdleTimeout`] if the
/// deadline passes first.
async fn read_before<S>(
    stream: &mut S,
    read_tmp: &mut [u8],
    deadline: Instant,
    idle_timeout: Duration,
) -> Result<Option<usize>, PipelineError>
where
    S: AsyncRead + Unpin,
{
    let deadline = tokio::time::Instant::from_std(deadline);
    match tokio::time::timeout_at(deadline, stream.read(read_tmp)).await {
        Err(_elapsed) => Err(PipelineError::IdleTimeout(idle_timeout)),
        Ok(Ok(0)) => Ok(None),
        Ok(Ok(n)) => Ok(Some(n)),
        Ok(Err(e)) => Err(e.into()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
