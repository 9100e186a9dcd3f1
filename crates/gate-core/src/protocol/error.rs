//! Connection failure taxonomy.
//!
//! Every failure a connection pipeline can hit is connection-fatal: the
//! connection is closed and its buffered state is discarded.  None of them is
//! retried at this layer.  They are still kept distinct so that the
//! surrounding server can log and count each kind separately.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Errors that terminate a connection pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A frame grew past the maximum length, or its delimiter never arrived
    /// within that length.
    #[error("framing violation: {buffered} bytes buffered, limit is {max}")]
    FramingViolation { max: usize, buffered: usize },

    /// A frame was delimited correctly but its contents could not be decoded.
    #[error("protocol decode error: {0}")]
    ProtocolDecode(String),

    /// An HTTP request arrived on a path that only accepts WebSocket upgrades.
    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    /// No inbound activity was observed within the idle window.
    #[error("no inbound activity for {0:?}")]
    IdleTimeout(Duration),

    /// The underlying socket failed.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

impl PipelineError {
    /// Returns the coarse failure kind used for logging and counting.
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::FramingViolation { .. } => FailureKind::FramingViolation,
            PipelineError::ProtocolDecode(_) => FailureKind::ProtocolDecodeError,
            PipelineError::HandshakeRejected(_) => FailureKind::HandshakeRejected,
            PipelineError::IdleTimeout(_) => FailureKind::IdleTimeout,
            PipelineError::Transport(_) => FailureKind::TransportError,
        }
    }
}

/// The coarse kind of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    FramingViolation,
    ProtocolDecodeError,
    HandshakeRejected,
    IdleTimeout,
    TransportError,
}

impl FailureKind {
    /// Number of distinct failure kinds.
    pub const COUNT: usize = 5;

    /// Every failure kind, in index order.
    pub const ALL: [FailureKind; FailureKind::COUNT] = [
        FailureKind::FramingViolation,
        FailureKind::ProtocolDecodeError,
        FailureKind::HandshakeRejected,
        FailureKind::IdleTimeout,
        FailureKind::TransportError,
    ];

    /// Dense index in `0..COUNT`, used by [`crate::FailureCounters`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Stable snake-case label for log fields.
    pub const fn as_str(self) -> &'static str {
        match self {
            FailureKind::FramingViolation => "framing_violation",
            FailureKind::ProtocolDecodeError => "protocol_decode_error",
            FailureKind::HandshakeRejected => "handshake_rejected",
            FailureKind::IdleTimeout => "idle_timeout",
            FailureKind::TransportError => "transport_error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_variant_maps_to_its_kind() {
        let cases = [
            (
                PipelineError::FramingViolation { max: 8192, buffered: 8192 },
                FailureKind::FramingViolation,
            ),
            (
                PipelineError::ProtocolDecode("bad".into()),
                FailureKind::ProtocolDecodeError,
            ),
            (
                PipelineError::HandshakeRejected("GET /".into()),
                FailureKind::HandshakeRejected,
            ),
            (
                PipelineError::IdleTimeout(Duration::from_secs(15)),
                FailureKind::IdleTimeout,
            ),
            (
                PipelineError::Transport(std::io::Error::from(std::io::ErrorKind::BrokenPipe)),
                FailureKind::TransportError,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.kind(), expected, "{error}");
        }
    }

    #[test]
    fn test_indices_are_dense_and_match_all_order() {
        for (i, kind) in FailureKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_io_error_converts_with_question_mark() {
        fn fails() -> Result<(), PipelineError> {
            Err(std::io::Error::from(std::io::ErrorKind::ConnectionReset))?;
            Ok(())
        }

        assert!(matches!(fails(), Err(PipelineError::Transport(_))));
    }

    #[test]
    fn test_display_includes_limits() {
        let err = PipelineError::FramingViolation { max: 8192, buffered: 9000 };
        let text = err.to_string();
        assert!(text.contains("8192"));
        assert!(text.contains("9000"));
    }
}
