//! The terminal request handler seam.
//!
//! The pipeline decodes bytes into [`Request`]s; what to do with them is up to
//! the application.  [`RequestHandler`] is the trait the connection driver
//! calls for each decoded request, with an explicit [`SessionContext`] instead
//! of any global lookup.

use std::net::SocketAddr;

use async_trait::async_trait;

use gate_core::{ConnectionEvent, FailureKind, Request, Response};

use crate::domain::{ProtocolFamily, SessionId};

/// Who a request came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: SessionId,
    pub peer_addr: SocketAddr,
    pub protocol: ProtocolFamily,
}

/// Application logic at the end of every pipeline.
///
/// For each connection the driver guarantees:
///
/// - every decoded request reaches [`handle`](Self::handle) exactly once, in
///   wire order, interleaved in order with [`on_event`](Self::on_event);
/// - a returned response is encoded and written before the next request is
///   handled;
/// - [`on_close`](Self::on_close) is called once after the protocol is known,
///   with the failure kind if the connection failed.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Handles one request, producing zero or one response.
    async fn handle(&self, session: &SessionContext, request: Request) -> Option<Response>;

    async fn on_event(&self, _session: &SessionContext, _event: ConnectionEvent) {}

    async fn on_close(&self, _session: &SessionContext, _failure: Option<FailureKind>) {}
}
