//! The stage abstraction every connection pipeline is built from.
//!
//! A stage sees messages in two directions:
//!
//! - **Inbound** (socket → handler): a stage receives one [`Inbound`] message
//!   and may forward any number of messages to the next stage, write
//!   responses back toward the socket, or fail the connection.
//! - **Outbound** (handler → socket): a stage transforms one [`Outbound`]
//!   message into another.  Stages that do not care about a message return it
//!   unchanged.
//!
//! Stages run synchronously and own all their buffered state, so a pipeline
//! can be driven from a unit test without sockets or a runtime.

use std::time::{Duration, Instant};

use gate_core::protocol::http::{RequestHead, ResponseHead};
use gate_core::{ConnectionEvent, PipelineError, Request, Response};

use crate::domain::{ProtocolFamily, SessionId, Transport};

/// A message travelling from the socket toward the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Bytes(Vec<u8>),
    Text(String),
    Http(RequestHead),
    Event(ConnectionEvent),
    Request(Request),
}

/// A message travelling from the handler toward the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Response(Response),
    Http(ResponseHead),
    Bytes(Vec<u8>),
}

/// Per-connection state shared by every stage of one pipeline.
#[derive(Debug, Clone)]
pub struct ConnectionState {
    pub session_id: SessionId,
    pub protocol: ProtocolFamily,
    pub transport: Transport,
    /// When the idle-timeout stage last saw inbound activity.
    pub last_read: Instant,
    pub idle_timeout: Duration,
}

impl ConnectionState {
    /// The instant after which the connection is idle.
    pub fn read_deadline(&self) -> Instant {
        self.last_read + self.idle_timeout
    }
}

/// What a stage may do while handling one inbound message.
pub struct StageContext<'a> {
    pub state: &'a mut ConnectionState,
    /// Time the current read was observed.
    pub now: Instant,
    forwarded: Vec<Inbound>,
    writes: Vec<Outbound>,
}

impl<'a> StageContext<'a> {
    pub fn new(state: &'a mut ConnectionState, now: Instant) -> Self {
        Self {
            state,
            now,
            forwarded: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// Passes `message` to the next stage.
    pub fn forward(&mut self, message: Inbound) {
        self.forwarded.push(message);
    }

    /// Sends `message` back toward the socket through the stages before this
    /// one.
    pub fn write(&mut self, message: Outbound) {
        self.writes.push(message);
    }

    /// Consumes the context, returning `(forwarded, writes)`.
    pub fn finish(self) -> (Vec<Inbound>, Vec<Outbound>) {
        (self.forwarded, self.writes)
    }
}

/// One link in a connection pipeline.
pub trait Stage: Send {
    /// Short name used in logs and pipeline descriptions.
    fn name(&self) -> &'static str;

    /// Handles one inbound message.
    ///
    /// # Errors
    ///
    /// Any error closes the connection.
    fn inbound(&mut self, message: Inbound, ctx: &mut StageContext<'_>) -> Result<(), PipelineError> {
        ctx.forward(message);
        Ok(())
    }

    /// Transforms one outbound message.
    ///
    /// # Errors
    ///
    /// Any error closes the connection.
    fn outbound(
        &mut self,
        message: Outbound,
        _state: &ConnectionState,
    ) -> Result<Outbound, PipelineError> {
        Ok(message)
    }
}
