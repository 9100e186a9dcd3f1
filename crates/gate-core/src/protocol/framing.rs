//! Delimiter-based frame decoder.
//!
//! TCP delivers a byte *stream*: one read may carry half a request, or three
//! requests at once.  [`DelimiterFramer`] accumulates bytes across reads and
//! cuts them into frames at a fixed delimiter, so the stages after it only
//! ever see whole frames.
//!
//! # Length limit
//!
//! The framer is the only thing standing between a misbehaving client and an
//! unbounded buffer, so it enforces a hard maximum frame length.  A frame's
//! length is the number of bytes *before* its delimiter.  A frame is rejected
//! with [`PipelineError::FramingViolation`] as soon as it is certain to reach
//! the limit: either its delimiter was found at or past the limit, or at least
//! `max_length` non-delimiter bytes are already buffered.  Bytes that could be
//! the beginning of a delimiter split across two reads do not count toward the
//! limit yet.

use crate::protocol::error::PipelineError;

/// Two consecutive line-feed bytes; terminates a file-grab request.
pub const DOUBLE_LINE_FEED: &[u8] = b"\n\n";

/// Splits an inbound byte stream into delimiter-terminated frames.
#[derive(Debug, Clone)]
pub struct DelimiterFramer {
    delimiter: &'static [u8],
    max_length: usize,
    buffer: Vec<u8>,
}

impl DelimiterFramer {
    /// Creates a framer cutting at `delimiter` with frames shorter than
    /// `max_length` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `delimiter` is empty; an empty delimiter would match at every
    /// position.
    pub fn new(delimiter: &'static [u8], max_length: usize) -> Self {
        assert!(!delimiter.is_empty(), "frame delimiter must not be empty");
        Self {
            delimiter,
            max_length,
            buffer: Vec::new(),
        }
    }

    /// Appends `bytes` and returns every frame completed by them, in order,
    /// without their delimiters.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::FramingViolation`] when a frame reaches the
    /// maximum length.  The framer must not be used after an error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use gate_core::protocol::framing::{DelimiterFramer, DOUBLE_LINE_FEED};
    ///
    /// let mut framer = DelimiterFramer::new(DOUBLE_LINE_FEED, 8192);
    /// assert!(framer.decode(b"JAGGRAB /crc").unwrap().is_empty());
    /// let frames = framer.decode(b"\n\n").unwrap();
    /// assert_eq!(frames, vec![b"JAGGRAB /crc".to_vec()]);
    /// ```
    pub fn decode(&mut self, bytes: &[u8]) -> Result<Vec<Vec<u8>>, PipelineError> {
        let mut frames = Vec::new();
        self.decode_into(bytes, &mut frames)?;
        Ok(frames)
    }

    /// Like [`decode`](Self::decode), but pushes frames onto `frames` as they
    /// complete.  Frames completed before an error stay in `frames`.
    ///
    /// # Errors
    ///
    /// See [`decode`](Self::decode).
    pub fn decode_into(
        &mut self,
        bytes: &[u8],
        frames: &mut Vec<Vec<u8>>,
    ) -> Result<(), PipelineError> {
        self.buffer.extend_from_slice(bytes);

        while let Some(position) = find(&self.buffer, self.delimiter) {
            if position >= self.max_length {
                return Err(self.violation(position));
            }
            let frame: Vec<u8> = self.buffer.drain(..position).collect();
            self.buffer.drain(..self.delimiter.len());
            frames.push(frame);
        }

        let pending = self.buffer.len() - partial_delimiter_suffix(&self.buffer, self.delimiter);
        if pending >= self.max_length {
            return Err(self.violation(self.buffer.len()));
        }
        Ok(())
    }

    /// Number of bytes buffered toward the next frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Drops any partially buffered frame.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    fn violation(&mut self, buffered: usize) -> PipelineError {
        self.buffer.clear();
        PipelineError::FramingViolation {
            max: self.max_length,
            buffered,
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Length of the longest proper prefix of `delimiter` that `buffer` ends with.
fn partial_delimiter_suffix(buffer: &[u8], delimiter: &[u8]) -> usize {
    (1..delimiter.len())
        .rev()
        .find(|&k| buffer.ends_with(&delimiter[..k]))
        .unwrap_or(0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
