//! Protocol families and transports.

use std::fmt;

/// The protocol a connection speaks once it has been classified.
///
/// Each family maps to exactly one stage chain (see
/// [`PipelineSpec`](crate::application::pipeline::PipelineSpec)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolFamily {
    /// Raw game protocol over TCP.
    Game,
    /// Game protocol behind an HTTP WebSocket upgrade.
    GameWebSocket,
    /// Line-delimited file-grab requests over TCP.
    FileGrab,
    /// File-grab requests behind an HTTP WebSocket upgrade.
    FileGrabWebSocket,
}

impl ProtocolFamily {
    pub const COUNT: usize = 4;

    pub const ALL: [ProtocolFamily; ProtocolFamily::COUNT] = [
        ProtocolFamily::Game,
        ProtocolFamily::GameWebSocket,
        ProtocolFamily::FileGrab,
        ProtocolFamily::FileGrabWebSocket,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// `true` if the connection starts with an HTTP upgrade handshake.
    pub const fn is_upgrade(self) -> bool {
        matches!(
            self,
            ProtocolFamily::GameWebSocket | ProtocolFamily::FileGrabWebSocket
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ProtocolFamily::Game => "game",
            ProtocolFamily::GameWebSocket => "game-websocket",
            ProtocolFamily::FileGrab => "file-grab",
            ProtocolFamily::FileGrabWebSocket => "file-grab-websocket",
        }
    }
}

impl fmt::Display for ProtocolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What currently carries the protocol's bytes.
///
/// Every connection starts as [`Transport::Raw`]; a completed upgrade
/// handshake switches it to [`Transport::WebSocket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    Raw,
    WebSocket,
}
