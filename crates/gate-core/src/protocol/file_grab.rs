//! The file-grab request/response protocol.
//!
//! File-grab is a tiny text protocol clients use to fetch auxiliary assets
//! (archives, checksum tables) before they log in.  A request is one line of
//! ASCII terminated by two line feeds:
//!
//! ```text
//! JAGGRAB /crc1738291\n\n
//! ```
//!
//! The response is simply the requested file's bytes; the client knows how
//! many to expect from the checksum table it fetched first.
//!
//! Older clients send other request lines over the same framing (for example
//! `get\0 0\r`).  Those are still requests: they are handed on verbatim as
//! [`FileRequest::Line`] and the handler decides what they mean.

use std::fmt;

use crate::protocol::error::PipelineError;

/// Every request line starts with this token.
pub const REQUEST_PREFIX: &str = "JAGGRAB ";

/// A decoded file-grab request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileRequest {
    /// `JAGGRAB /path`.  The path keeps its leading `/`.
    Resource { path: String },
    /// Any other non-empty request line, trimmed.
    Line(String),
}

impl FileRequest {
    pub fn resource(path: impl Into<String>) -> Self {
        Self::Resource { path: path.into() }
    }

    /// The requested path, for `JAGGRAB` requests.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Resource { path } => Some(path),
            Self::Line(_) => None,
        }
    }
}

impl fmt::Display for FileRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource { path } => f.write_str(path),
            Self::Line(line) => write!(f, "{line:?}"),
        }
    }
}

/// The bytes sent back for a [`FileRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResponse {
    pub data: Vec<u8>,
}

impl FileResponse {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

/// Parses one request line.
///
/// Surrounding whitespace (including a trailing `\r`) is ignored.
///
/// # Errors
///
/// Returns [`PipelineError::ProtocolDecode`] if the line is empty, or if it
/// starts with `JAGGRAB ` but the path does not start with `/`.
///
/// # Examples
///
/// ```rust
/// use gate_core::protocol::file_grab::{decode_request, FileRequest};
///
/// let request = decode_request("JAGGRAB /title\r").unwrap();
/// assert_eq!(request.path(), Some("/title"));
///
/// let legacy = decode_request("get\u{0}0\r").unwrap();
/// assert_eq!(legacy, FileRequest::Line("get\u{0}0".into()));
/// ```
pub fn decode_request(line: &str) -> Result<FileRequest, PipelineError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(PipelineError::ProtocolDecode("empty file-grab request".into()));
    }

    match line.strip_prefix(REQUEST_PREFIX).map(str::trim) {
        Some(path) if path.starts_with('/') => Ok(FileRequest::resource(path)),
        Some(_) => Err(PipelineError::ProtocolDecode(format!(
            "file-grab path must start with '/': {line:?}"
        ))),
        None => Ok(FileRequest::Line(line.to_string())),
    }
}

/// Serializes a response.  The wire form is the raw file contents.
pub fn encode_response(response: &FileResponse) -> Vec<u8> {
    response.data.clone()
}
