//! The gateway's own terminal handler.
//!
//! [`GatewayHandler`] answers file-grab requests from a directory on disk and
//! passes decoded game frames to the game world over an mpsc channel.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use gate_core::protocol::file_grab::{FileRequest, FileResponse};
use gate_core::protocol::game::GameFrame;
use gate_core::{ConnectionEvent, FailureKind, Request, Response};

use crate::application::{RequestHandler, SessionContext};
use crate::domain::SessionId;

/// A game frame on its way to the game world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameInbound {
    pub session_id: SessionId,
    pub frame: GameFrame,
}

/// Serves file-grab requests from `resource_root` and forwards game frames to
/// `game_sink`.
pub struct GatewayHandler {
    resource_root: PathBuf,
    game_sink: mpsc::Sender<GameInbound>,
}

impl GatewayHandler {
    pub fn new(resource_root: impl Into<PathBuf>, game_sink: mpsc::Sender<GameInbound>) -> Self {
        Self {
            resource_root: resource_root.into(),
            game_sink,
        }
    }

    async fn serve_file(&self, path: &str) -> Option<Response> {
        let Some(file) = resolve(&self.resource_root, path) else {
            warn!(path, "rejected file-grab path");
            return None;
        };
        match tokio::fs::read(&file).await {
            Ok(data) => {
                debug!(path, bytes = data.len(), "serving resource");
                Some(Response::File(FileResponse::new(data)))
            }
            Err(e) => {
                warn!(path, "resource unavailable: {e}");
                None
            }
        }
    }
}

/// Maps a request path onto a file under `root`.
///
/// Returns `None` for empty paths and for anything that is not a plain
/// sequence of normal components, such as `..`.
fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = Path::new(request_path.trim_start_matches('/'));
    if relative.as_os_str().is_empty() {
        return None;
    }
    if !relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
    {
        return None;
    }
    Some(root.join(relative))
}

#[async_trait]
impl RequestHandler for GatewayHandler {
    async fn handle(&self, session: &SessionContext, request: Request) -> Option<Response> {
        match request {
            Request::File(FileRequest::Resource { path }) => self.serve_file(&path).await,
            Request::File(FileRequest::Line(line)) => {
                debug!(session = %session.session_id, "ignoring non-resource request {line:?}");
                None
            }
            Request::Game(frame) => {
                let inbound = GameInbound {
                    session_id: session.session_id,
                    frame,
                };
                if self.game_sink.send(inbound).await.is_err() {
                    warn!("game sink closed; dropping frame");
                }
                None
            }
        }
    }

    async fn on_event(&self, session: &SessionContext, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Upgraded { target } => {
                info!(session = %session.session_id, protocol = %session.protocol, "upgraded on {target}");
            }
        }
    }

    async fn on_close(&self, session: &SessionContext, failure: Option<FailureKind>) {
        match failure {
            Some(kind) => debug!(session = %session.session_id, failure = %kind, "session closed"),
            None => debug!(session = %session.session_id, "session closed"),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
