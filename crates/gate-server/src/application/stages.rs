//! The concrete stages pipelines are assembled from.
//!
//! Each stage wraps one codec from `gate_core::protocol` and does exactly one
//! job.  Messages a stage does not understand pass through untouched, which is
//! what lets the same stage sit in several different chains.

use std::io;

use tokio_tungstenite::tungstenite::handshake::server::{create_response, write_response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::{Data, OpCode};
use tokio_tungstenite::tungstenite::protocol::frame::Frame;
use tracing::{debug, trace};

use gate_core::protocol::file_grab::{self, FileRequest};
use gate_core::protocol::framing::{DelimiterFramer, DOUBLE_LINE_FEED};
use gate_core::protocol::game::{self, GameFrameDecoder};
use gate_core::protocol::http::{HttpHeadDecoder, ResponseHead};
use gate_core::protocol::text::decode_ascii;
use gate_core::protocol::MAX_FRAME_LENGTH;
use gate_core::{ConnectionEvent, PipelineError, Request, Response};

use crate::application::stage::{ConnectionState, Inbound, Outbound, Stage, StageContext};
use crate::domain::Transport;

// ── HTTP ──────────────────────────────────────────────────────────────────────

/// Parses the upgrade request head, then steps aside.
///
/// Until a head has been parsed, inbound bytes are HTTP.  Once an upgrade
/// request is seen, every later byte (including any that arrived in the same
/// read as the head) is forwarded as-is.  Outbound, it serializes
/// [`Outbound::Http`] responses.
#[derive(Debug, Default)]
pub struct HttpCodecStage {
    decoder: HttpHeadDecoder,
    switched: bool,
}

impl Stage for HttpCodecStage {
    fn name(&self) -> &'static str {
        "http-codec"
    }

    fn inbound(&mut self, message: Inbound, ctx: &mut StageContext<'_>) -> Result<(), PipelineError> {
        let bytes = match message {
            Inbound::Bytes(bytes) if !self.switched => bytes,
            other => {
                ctx.forward(other);
                return Ok(());
            }
        };

        if let Some(request) = self.decoder.decode(&bytes)? {
            let upgrade = request.is_websocket_upgrade();
            ctx.forward(Inbound::Http(request));
            if upgrade {
                self.switched = true;
                let remainder = self.decoder.take_remainder();
                if !remainder.is_empty() {
                    ctx.forward(Inbound::Bytes(remainder));
                }
            }
        }
        Ok(())
    }

    fn outbound(
        &mut self,
        message: Outbound,
        _state: &ConnectionState,
    ) -> Result<Outbound, PipelineError> {
        Ok(match message {
            Outbound::Http(response) => Outbound::Bytes(encode_response(&response)?),
            other => other,
        })
    }
}

/// Turns the upgrade request into a `101` response and a
/// [`ConnectionEvent::Upgraded`]; rejects anything else.
#[derive(Debug, Default)]
pub struct HttpUpgradeStage;

impl Stage for HttpUpgradeStage {
    fn name(&self) -> &'static str {
        "http-upgrade"
    }

    fn inbound(&mut self, message: Inbound, ctx: &mut StageContext<'_>) -> Result<(), PipelineError> {
        let request = match message {
            Inbound::Http(request) => request,
            other => {
                ctx.forward(other);
                return Ok(());
            }
        };

        let response = create_response(request.as_request()).map_err(|e| {
            PipelineError::HandshakeRejected(format!(
                "{} {}: {e}",
                request.method(),
                request.target()
            ))
        })?;

        ctx.write(Outbound::Http(ResponseHead::from(response)));
        ctx.state.transport = Transport::WebSocket;
        debug!(target_path = %request.target(), "WebSocket upgrade accepted");
        ctx.forward(Inbound::Event(ConnectionEvent::Upgraded {
            target: request.target().to_string(),
        }));
        Ok(())
    }
}

/// Serializes a response head the way tungstenite writes its own handshake
/// replies.
pub(crate) fn encode_response(response: &ResponseHead) -> Result<Vec<u8>, PipelineError> {
    let mut out = Vec::new();
    write_response(&mut out, response.as_response())
        .map_err(|e| PipelineError::Transport(io::Error::new(io::ErrorKind::Other, e)))?;
    Ok(out)
}

// ── File-grab ─────────────────────────────────────────────────────────────────

/// Cuts inbound bytes into `\n\n`-terminated frames.
#[derive(Debug)]
pub struct FramerStage {
    framer: DelimiterFramer,
}

impl Default for FramerStage {
    fn default() -> Self {
        Self {
            framer: DelimiterFramer::new(DOUBLE_LINE_FEED, MAX_FRAME_LENGTH),
        }
    }
}

impl Stage for FramerStage {
    fn name(&self) -> &'static str {
        "framer"
    }

    fn inbound(&mut self, message: Inbound, ctx: &mut StageContext<'_>) -> Result<(), PipelineError> {
        match message {
            Inbound::Bytes(bytes) => {
                let mut frames = Vec::new();
                let result = self.framer.decode_into(&bytes, &mut frames);
                for frame in frames {
                    ctx.forward(Inbound::Bytes(frame));
                }
                result
            }
            other => {
                ctx.forward(other);
                Ok(())
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct AsciiTextStage;

impl Stage for AsciiTextStage {
    fn name(&self) -> &'static str {
        "ascii-text"
    }

    fn inbound(&mut self, message: Inbound, ctx: &mut StageContext<'_>) -> Result<(), PipelineError> {
        match message {
            Inbound::Bytes(frame) => ctx.forward(Inbound::Text(decode_ascii(frame)?)),
            other => ctx.forward(other),
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FileRequestStage;

impl Stage for FileRequestStage {
    fn name(&self) -> &'static str {
        "file-request-decoder"
    }

    fn inbound(&mut self, message: Inbound, ctx: &mut StageContext<'_>) -> Result<(), PipelineError> {
        match message {
            Inbound::Text(line) => {
                let request: FileRequest = file_grab::decode_request(&line)?;
                trace!(request = %request, "file-grab request decoded");
                ctx.forward(Inbound::Request(Request::File(request)));
            }
            other => ctx.forward(other),
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FileResponseEncodeStage;

impl Stage for FileResponseEncodeStage {
    fn name(&self) -> &'static str {
        "file-response-encoder"
    }

    fn outbound(
        &mut self,
        message: Outbound,
        _state: &ConnectionState,
    ) -> Result<Outbound, PipelineError> {
        match message {
            Outbound::Response(Response::File(response)) => {
                Ok(Outbound::Bytes(file_grab::encode_response(&response)))
            }
            Outbound::Response(other) => Err(PipelineError::ProtocolDecode(format!(
                "file-grab connection cannot carry {other:?}"
            ))),
            other => Ok(other),
        }
    }
}

// ── Game ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct GameFrameDecodeStage {
    decoder: GameFrameDecoder,
}

impl Stage for GameFrameDecodeStage {
    fn name(&self) -> &'static str {
        "game-frame-decoder"
    }

    fn inbound(&mut self, message: Inbound, ctx: &mut StageContext<'_>) -> Result<(), PipelineError> {
        match message {
            Inbound::Bytes(bytes) => {
                let mut frames = Vec::new();
                let result = self.decoder.decode_into(&bytes, &mut frames);
                for frame in frames {
                    ctx.forward(Inbound::Request(Request::Game(frame)));
                }
                result
            }
            other => {
                ctx.forward(other);
                Ok(())
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct GameFrameEncodeStage;

impl Stage for GameFrameEncodeStage {
    fn name(&self) -> &'static str {
        "game-frame-encoder"
    }

    fn outbound(
        &mut self,
        message: Outbound,
        _state: &ConnectionState,
    ) -> Result<Outbound, PipelineError> {
        match message {
            Outbound::Response(Response::Game(frame)) => {
                Ok(Outbound::Bytes(game::encode_frame(&frame)?))
            }
            Outbound::Response(other) => Err(PipelineError::ProtocolDecode(format!(
                "game connection cannot carry {other:?}"
            ))),
            other => Ok(other),
        }
    }
}

// ── Connection supervision ────────────────────────────────────────────────────

/// Marks inbound activity.
///
/// Every message that reaches this stage moves the connection's read deadline
/// to `now + idle_timeout`.  The connection driver enforces the deadline.
#[derive(Debug, Default)]
pub struct IdleTimeoutStage;

impl Stage for IdleTimeoutStage {
    fn name(&self) -> &'static str {
        "idle-timeout"
    }

    fn inbound(&mut self, message: Inbound, ctx: &mut StageContext<'_>) -> Result<(), PipelineError> {
        ctx.state.last_read = ctx.now;
        ctx.forward(message);
        Ok(())
    }
}

// ── WebSocket envelope ────────────────────────────────────────────────────────

/// Wraps outbound bytes in one final, unmasked binary frame once the
/// connection has been upgraded.  Before the upgrade, bytes pass through.
#[derive(Debug, Default)]
pub struct WebSocketEnvelopeStage;

impl Stage for WebSocketEnvelopeStage {
    fn name(&self) -> &'static str {
        "websocket-envelope"
    }

    fn outbound(
        &mut self,
        message: Outbound,
        state: &ConnectionState,
    ) -> Result<Outbound, PipelineError> {
        match message {
            Outbound::Bytes(payload) if state.transport == Transport::WebSocket => {
                Ok(Outbound::Bytes(binary_frame(payload)?))
            }
            other => Ok(other),
        }
    }
}

fn binary_frame(payload: Vec<u8>) -> Result<Vec<u8>, PipelineError> {
    let frame = Frame::message(payload, OpCode::Data(Data::Binary), true);
    let mut out = Vec::with_capacity(frame.len());
    frame
        .format(&mut out)
        .map_err(|e| PipelineError::Transport(io::Error::new(io::ErrorKind::Other, e)))?;
    Ok(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use gate_core::protocol::file_grab::FileResponse;
    use gate_core::protocol::game::GameFrame;
    use gate_core::protocol::http::RequestHead;

    use crate::domain::{ProtocolFamily, SessionId};

    const UPGRADE: &[u8] = b"GET /jaggrab HTTP/1.1\r\n\
Host: localhost\r\n\
Upgrade: websocket\r\n\
Connection: Upgrade\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
Sec-WebSocket-Version: 13\r\n\r\n";

    fn head(bytes: &[u8]) -> RequestHead {
        HttpHeadDecoder::new().decode(bytes).unwrap().unwrap()
    }

    fn state() -> ConnectionState {
        ConnectionState {
            session_id: SessionId::new(),
            protocol: ProtocolFamily::FileGrabWebSocket,
            transport: Transport::Raw,
            last_read: Instant::now(),
            idle_timeout: Duration::from_secs(15),
        }
    }

    /// Feeds one message to `stage` and returns `(forwarded, writes)`.
    fn run(
        stage: &mut dyn Stage,
        state: &mut ConnectionState,
        message: Inbound,
    ) -> Result<(Vec<Inbound>, Vec<Outbound>), PipelineError> {
        let mut ctx = StageContext::new(state, Instant::now());
        stage.inbound(message, &mut ctx)?;
        Ok(ctx.finish())
    }

    #[test]
    fn test_http_codec_forwards_head_then_trailing_bytes() {
        // Arrange
        let mut stage = HttpCodecStage::default();
        let mut state = state();
        let mut bytes = UPGRADE.to_vec();
        bytes.extend_from_slice(b"JAGGRAB /crc\n\n");

        // Act
        let (forwarded, writes) = run(&mut stage, &mut state, Inbound::Bytes(bytes)).unwrap();

        // Assert
        assert!(writes.is_empty());
        assert_eq!(forwarded.len(), 2);
        assert!(matches!(&forwarded[0], Inbound::Http(req) if req.target() == "/jaggrab"));
        assert_eq!(forwarded[1], Inbound::Bytes(b"JAGGRAB /crc\n\n".to_vec()));
    }

    #[test]
    fn test_http_codec_passes_bytes_through_after_upgrade() {
        let mut stage = HttpCodecStage::default();
        let mut state = state();
        run(&mut stage, &mut state, Inbound::Bytes(UPGRADE.to_vec())).unwrap();

        let (forwarded, _) =
            run(&mut stage, &mut state, Inbound::Bytes(b"\r\n\r\n".to_vec())).unwrap();

        assert_eq!(forwarded, vec![Inbound::Bytes(b"\r\n\r\n".to_vec())]);
    }

    #[test]
    fn test_http_codec_encodes_responses() {
        let mut stage = HttpCodecStage::default();

        let out = stage
            .outbound(Outbound::Http(ResponseHead::bad_request()), &state())
            .unwrap();

        let Outbound::Bytes(bytes) = out else {
            panic!("expected bytes, got {out:?}");
        };
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{text}");
        assert!(text.contains("content-length: 0\r\n"), "{text}");
        assert!(text.ends_with("\r\n\r\n"), "{text}");
    }

    #[test]
    fn test_upgrade_writes_101_and_switches_transport() {
        // Arrange
        let request = head(UPGRADE);
        let mut state = state();

        // Act
        let (forwarded, writes) =
            run(&mut HttpUpgradeStage, &mut state, Inbound::Http(request)).unwrap();

        // Assert: RFC 6455 §1.3 sample key and accept value
        let [Outbound::Http(response)] = writes.as_slice() else {
            panic!("expected one response head, got {writes:?}");
        };
        assert_eq!(response.status().as_u16(), 101);
        assert_eq!(
            response.header("Sec-WebSocket-Accept"),
            Some("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=")
        );
        assert_eq!(response.header("Upgrade"), Some("websocket"));
        assert_eq!(state.transport, Transport::WebSocket);
        assert_eq!(
            forwarded,
            vec![Inbound::Event(ConnectionEvent::Upgraded {
                target: "/jaggrab".into()
            })]
        );
    }

    #[test]
    fn test_switching_protocols_serializes_without_body() {
        let mut state = state();
        let (_, writes) = run(&mut HttpUpgradeStage, &mut state, Inbound::Http(head(UPGRADE))).unwrap();

        let bytes = match HttpCodecStage::default().outbound(writes[0].clone(), &state).unwrap() {
            Outbound::Bytes(bytes) => bytes,
            other => panic!("expected bytes, got {other:?}"),
        };
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with("HTTP/1.1 101 Switching Protocols\r\n"), "{text}");
        assert!(
            text.contains("sec-websocket-accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"),
            "{text}"
        );
        assert!(!text.contains("content-length"), "{text}");
        assert!(text.ends_with("\r\n\r\n"), "{text}");
    }

    #[test]
    fn test_plain_request_is_rejected() {
        let request = head(b"GET /jaggrab HTTP/1.1\r\nHost: a\r\n\r\n");

        let result = run(&mut HttpUpgradeStage, &mut state(), Inbound::Http(request));

        assert!(matches!(result, Err(PipelineError::HandshakeRejected(_))));
    }

    #[test]
    fn test_upgrade_without_key_is_rejected() {
        let request = head(
            b"GET / HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
Sec-WebSocket-Version: 13\r\n\r\n",
        );

        let result = run(&mut HttpUpgradeStage, &mut state(), Inbound::Http(request));

        assert!(matches!(result, Err(PipelineError::HandshakeRejected(_))));
    }

    #[test]
    fn test_unsupported_websocket_version_is_rejected() {
        // Arrange: an RFC 6455 draft-era client
        let text = String::from_utf8(UPGRADE.to_vec()).unwrap();
        let request = head(
            text.replace("Sec-WebSocket-Version: 13", "Sec-WebSocket-Version: 8")
                .as_bytes(),
        );
        let mut state = state();

        // Act
        let result = run(&mut HttpUpgradeStage, &mut state, Inbound::Http(request));

        // Assert
        assert!(matches!(result, Err(PipelineError::HandshakeRejected(_))));
        assert_eq!(state.transport, Transport::Raw);
    }

    #[test]
    fn test_missing_websocket_version_is_rejected() {
        let text = String::from_utf8(UPGRADE.to_vec()).unwrap();
        let request = head(text.replace("Sec-WebSocket-Version: 13\r\n", "").as_bytes());

        let result = run(&mut HttpUpgradeStage, &mut state(), Inbound::Http(request));

        assert!(matches!(result, Err(PipelineError::HandshakeRejected(_))));
    }

    #[test]
    fn test_framer_forwards_frames_before_a_violation() {
        // Arrange
        let mut bytes = b"JAGGRAB /a\n\n".to_vec();
        bytes.extend(std::iter::repeat(b'a').take(MAX_FRAME_LENGTH));
        let mut state = state();
        let mut ctx = StageContext::new(&mut state, Instant::now());

        // Act
        let result = FramerStage::default().inbound(Inbound::Bytes(bytes), &mut ctx);
        let (forwarded, _) = ctx.finish();

        // Assert
        assert!(matches!(result, Err(PipelineError::FramingViolation { .. })));
        assert_eq!(forwarded, vec![Inbound::Bytes(b"JAGGRAB /a".to_vec())]);
    }

    #[test]
    fn test_file_grab_chain_stages_decode_request() {
        let mut state = state();
        let (frames, _) = run(
            &mut FramerStage::default(),
            &mut state,
            Inbound::Bytes(b"JAGGRAB /title\n\n".to_vec()),
        )
        .unwrap();
        let (texts, _) = run(&mut AsciiTextStage, &mut state, frames[0].clone()).unwrap();
        let (requests, _) = run(&mut FileRequestStage, &mut state, texts[0].clone()).unwrap();

        assert_eq!(
            requests,
            vec![Inbound::Request(Request::File(FileRequest::resource("/title")))]
        );
    }

    #[test]
    fn test_events_pass_through_decoders() {
        let event = Inbound::Event(ConnectionEvent::Upgraded { target: "/".into() });
        let mut state = state();

        let (forwarded, _) = run(&mut FramerStage::default(), &mut state, event.clone()).unwrap();
        assert_eq!(forwarded, vec![event.clone()]);
        let (forwarded, _) = run(&mut AsciiTextStage, &mut state, event.clone()).unwrap();
        assert_eq!(forwarded, vec![event]);
    }

    #[test]
    fn test_idle_stage_moves_last_read() {
        let mut state = state();
        let before = state.last_read;
        let later = before + Duration::from_secs(3);
        let mut stage = IdleTimeoutStage;
        let mut ctx = StageContext::new(&mut state, later);

        stage.inbound(Inbound::Text("x".into()), &mut ctx).unwrap();
        let (forwarded, _) = ctx.finish();

        assert_eq!(forwarded.len(), 1);
        assert_eq!(state.last_read, later);
        assert_eq!(state.read_deadline(), later + Duration::from_secs(15));
    }

    #[test]
    fn test_envelope_wraps_only_after_upgrade() {
        let mut stage = WebSocketEnvelopeStage;
        let mut state = state();

        let raw = stage.outbound(Outbound::Bytes(b"hello".to_vec()), &state).unwrap();
        state.transport = Transport::WebSocket;
        let wrapped = stage.outbound(Outbound::Bytes(b"hello".to_vec()), &state).unwrap();

        assert_eq!(raw, Outbound::Bytes(b"hello".to_vec()));
        // FIN + binary opcode, unmasked 5-byte payload
        assert_eq!(
            wrapped,
            Outbound::Bytes(vec![0x82, 0x05, b'h', b'e', b'l', b'l', b'o'])
        );
    }

    #[test]
    fn test_file_encoder_emits_raw_bytes() {
        let out = FileResponseEncodeStage
            .outbound(
                Outbound::Response(Response::File(FileResponse::new(vec![1, 2, 3]))),
                &state(),
            )
            .unwrap();
        assert_eq!(out, Outbound::Bytes(vec![1, 2, 3]));
    }

    #[test]
    fn test_file_encoder_rejects_game_response() {
        let result = FileResponseEncodeStage.outbound(
            Outbound::Response(Response::Game(GameFrame::new(1, vec![]))),
            &state(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_game_stages_round_trip_a_frame() {
        let mut state = state();
        let bytes = game::encode_frame(&GameFrame::new(9, b"hi".to_vec())).unwrap();

        let (forwarded, _) = run(
            &mut GameFrameDecodeStage::default(),
            &mut state,
            Inbound::Bytes(bytes.clone()),
        )
        .unwrap();
        let encoded = GameFrameEncodeStage
            .outbound(
                Outbound::Response(Response::Game(GameFrame::new(9, b"hi".to_vec()))),
                &state,
            )
            .unwrap();

        assert_eq!(
            forwarded,
            vec![Inbound::Request(Request::Game(GameFrame::new(9, b"hi".to_vec())))]
        );
        assert_eq!(encoded, Outbound::Bytes(bytes));
    }
}
