//! Raw game-protocol framing.
//!
//! Wire format:
//! ```text
//! [opcode:1][length:2][payload:length]
//! ```
//! The length is big-endian and counts payload bytes only.  Payloads are
//! capped at [`MAX_FRAME_LENGTH`](crate::protocol::MAX_FRAME_LENGTH) bytes in
//! both directions.

use crate::protocol::error::PipelineError;
use crate::protocol::MAX_FRAME_LENGTH;

/// Size of the opcode + length header.
pub const GAME_HEADER_SIZE: usize = 3;

/// One raw game-protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameFrame {
    pub opcode: u8,
    pub payload: Vec<u8>,
}

impl GameFrame {
    pub fn new(opcode: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
        }
    }
}

/// Accumulates bytes and yields complete [`GameFrame`]s.
#[derive(Debug, Default)]
pub struct GameFrameDecoder {
    buffer: Vec<u8>,
}

impl GameFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` and returns every frame they complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::FramingViolation`] as soon as a header
    /// announces a payload longer than the limit, before the payload arrives.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<Vec<GameFrame>, PipelineError> {
        let mut frames = Vec::new();
        self.decode_into(bytes, &mut frames)?;
        Ok(frames)
    }

    /// Like [`decode`](Self::decode), but frames completed before an error
    /// stay in `frames`.
    ///
    /// # Errors
    ///
    /// See [`decode`](Self::decode).
    pub fn decode_into(
        &mut self,
        bytes: &[u8],
        frames: &mut Vec<GameFrame>,
    ) -> Result<(), PipelineError> {
        self.buffer.extend_from_slice(bytes);

        while self.buffer.len() >= GAME_HEADER_SIZE {
            let length = u16::from_be_bytes([self.buffer[1], self.buffer[2]]) as usize;
            if length > MAX_FRAME_LENGTH {
                self.buffer.clear();
                return Err(PipelineError::FramingViolation {
                    max: MAX_FRAME_LENGTH,
                    buffered: length,
                });
            }
            let total = GAME_HEADER_SIZE + length;
            if self.buffer.len() < total {
                break;
            }

            let opcode = self.buffer[0];
            let payload = self.buffer[GAME_HEADER_SIZE..total].to_vec();
            self.buffer.drain(..total);
            frames.push(GameFrame { opcode, payload });
        }
        Ok(())
    }

    /// Number of bytes buffered toward the next frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

/// Serializes a frame with its header.
///
/// # Errors
///
/// Returns [`PipelineError::FramingViolation`] if the payload is longer than
/// the limit; the peer would reject such a frame anyway.
pub fn encode_frame(frame: &GameFrame) -> Result<Vec<u8>, PipelineError> {
    if frame.payload.len() > MAX_FRAME_LENGTH {
        return Err(PipelineError::FramingViolation {
            max: MAX_FRAME_LENGTH,
            buffered: frame.payload.len(),
        });
    }

    let mut buf = Vec::with_capacity(GAME_HEADER_SIZE + frame.payload.len());
    buf.push(frame.opcode);
    buf.extend_from_slice(&(frame.payload.len() as u16).to_be_bytes());
    buf.extend_from_slice(&frame.payload);
    Ok(buf)
}
