//! Messages exchanged between a connection pipeline and its request handler.

use crate::protocol::file_grab::{FileRequest, FileResponse};
use crate::protocol::game::GameFrame;

/// A fully decoded inbound request, ready for the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    File(FileRequest),
    Game(GameFrame),
}

/// An outbound response produced by the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    File(FileResponse),
    Game(GameFrame),
}

/// Connection lifecycle notifications delivered to the handler in order with
/// requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The HTTP upgrade handshake completed for `target`.
    Upgraded { target: String },
}

impl From<FileRequest> for Request {
    fn from(request: FileRequest) -> Self {
        Self::File(request)
    }
}

impl From<GameFrame> for Request {
    fn from(frame: GameFrame) -> Self {
        Self::Game(frame)
    }
}

impl From<FileResponse> for Response {
    fn from(response: FileResponse) -> Self {
        Self::File(response)
    }
}

impl From<GameFrame> for Response {
    fn from(frame: GameFrame) -> Self {
        Self::Game(frame)
    }
}
