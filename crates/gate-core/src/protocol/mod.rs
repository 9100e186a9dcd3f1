//! Protocol module containing the connection codecs and the failure taxonomy.

pub mod error;
pub mod file_grab;
pub mod framing;
pub mod game;
pub mod http;
pub mod messages;
pub mod metrics;
pub mod text;

pub use error::{FailureKind, PipelineError};
pub use framing::DelimiterFramer;
pub use messages::*;
pub use metrics::FailureCounters;

/// The hard cap on any buffered inbound unit (file-grab frame, HTTP request
/// head, raw game frame payload), in bytes.
pub const MAX_FRAME_LENGTH: usize = 8192;
