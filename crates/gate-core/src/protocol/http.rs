//! HTTP/1.1 request-head decoding for the WebSocket upgrade handshake.
//!
//! Browser clients reach the gateway through an HTTP `Upgrade: websocket`
//! request.  The gateway only needs the request line and headers of that one
//! request: [`HttpHeadDecoder`] buffers until `httparse` reports a complete
//! head, capped at [`MAX_FRAME_LENGTH`](crate::protocol::MAX_FRAME_LENGTH)
//! bytes, and hands it on as an [`http::Request`].  Request bodies are not
//! supported.

use http::header::{HeaderValue, CONNECTION, CONTENT_LENGTH};
use http::{Method, StatusCode, Version};

use crate::protocol::error::PipelineError;
use crate::protocol::MAX_FRAME_LENGTH;

/// Method tokens recognised when sniffing a connection's first bytes.
pub const METHODS: [&str; 6] = ["GET", "POST", "HEAD", "PUT", "DELETE", "OPTIONS"];

/// Header slots offered to the parser; a head with more headers is rejected.
const MAX_HEADERS: usize = 32;

/// A parsed HTTP request head.
///
/// Two heads are equal when their method, target, version and headers are.
#[derive(Debug, Clone)]
pub struct RequestHead(http::Request<()>);

impl RequestHead {
    pub fn as_request(&self) -> &http::Request<()> {
        &self.0
    }

    pub fn into_request(self) -> http::Request<()> {
        self.0
    }

    pub fn method(&self) -> &Method {
        self.0.method()
    }

    /// The request target as sent, path plus query.
    pub fn target(&self) -> &str {
        self.0
            .uri()
            .path_and_query()
            .map_or("/", |target| target.as_str())
    }

    /// Returns the first value of header `name`, compared case-insensitively.
    /// Values that are not visible ASCII read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.0.headers().get(name).and_then(|value| value.to_str().ok())
    }

    /// `true` if this request asks to switch to the WebSocket protocol.
    ///
    /// This only decides whether the bytes after the head belong to another
    /// protocol; whether the handshake is acceptable is checked separately.
    pub fn is_websocket_upgrade(&self) -> bool {
        let upgrade = self
            .header("Upgrade")
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("websocket"));
        let connection = self.header("Connection").is_some_and(|value| {
            value
                .split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
        });
        self.0.method() == Method::GET && upgrade && connection
    }
}

impl From<http::Request<()>> for RequestHead {
    fn from(request: http::Request<()>) -> Self {
        Self(request)
    }
}

impl PartialEq for RequestHead {
    fn eq(&self, other: &Self) -> bool {
        self.0.method() == other.0.method()
            && self.0.uri() == other.0.uri()
            && self.0.version() == other.0.version()
            && self.0.headers() == other.0.headers()
    }
}

impl Eq for RequestHead {}

/// An HTTP response head.  The gateway never sends a response body.
#[derive(Debug, Clone)]
pub struct ResponseHead(http::Response<()>);

impl ResponseHead {
    /// `400 Bad Request` sent before closing a rejected handshake.
    pub fn bad_request() -> Self {
        let mut response = http::Response::new(());
        *response.status_mut() = StatusCode::BAD_REQUEST;
        *response.version_mut() = Version::HTTP_11;
        let headers = response.headers_mut();
        headers.insert(CONNECTION, HeaderValue::from_static("close"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
        Self(response)
    }

    pub fn as_response(&self) -> &http::Response<()> {
        &self.0
    }

    pub fn status(&self) -> StatusCode {
        self.0.status()
    }

    /// Returns the first value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.0.headers().get(name).and_then(|value| value.to_str().ok())
    }
}

impl From<http::Response<()>> for ResponseHead {
    fn from(response: http::Response<()>) -> Self {
        Self(response)
    }
}

impl PartialEq for ResponseHead {
    fn eq(&self, other: &Self) -> bool {
        self.0.status() == other.0.status()
            && self.0.version() == other.0.version()
            && self.0.headers() == other.0.headers()
    }
}

impl Eq for ResponseHead {}

/// Incrementally decodes one HTTP request head from a byte stream.
///
/// Bytes that arrive after the head stay buffered until
/// [`take_remainder`](Self::take_remainder) hands them to whatever protocol
/// the connection switches to.
#[derive(Debug, Default, Clone)]
pub struct HttpHeadDecoder {
    buffer: Vec<u8>,
}

impl HttpHeadDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` and returns the request head once it is complete.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::FramingViolation`] if the head reaches the size limit.
    /// - [`PipelineError::ProtocolDecode`] if the head is not valid HTTP/1.x.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<Option<RequestHead>, PipelineError> {
        self.buffer.extend_from_slice(bytes);

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Request::new(&mut headers);
        let status = parsed
            .parse(&self.buffer)
            .map_err(|e| PipelineError::ProtocolDecode(format!("malformed HTTP head: {e}")))?;

        match status {
            httparse::Status::Complete(length) if length <= MAX_FRAME_LENGTH => {
                let head = build_request(&parsed)?;
                self.buffer.drain(..length);
                Ok(Some(head))
            }
            httparse::Status::Partial if self.buffer.len() < MAX_FRAME_LENGTH => Ok(None),
            _ => {
                let buffered = self.buffer.len();
                self.buffer.clear();
                Err(PipelineError::FramingViolation {
                    max: MAX_FRAME_LENGTH,
                    buffered,
                })
            }
        }
    }

    /// Takes the bytes that followed the request head.
    pub fn take_remainder(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }
}

fn build_request(parsed: &httparse::Request<'_, '_>) -> Result<RequestHead, PipelineError> {
    let version = match parsed.version {
        Some(0) => Version::HTTP_10,
        _ => Version::HTTP_11,
    };
    let mut builder = http::Request::builder()
        .method(parsed.method.unwrap_or_default())
        .uri(parsed.path.unwrap_or_default())
        .version(version);
    for header in parsed.headers.iter() {
        builder = builder.header(header.name, header.value);
    }
    builder
        .body(())
        .map(RequestHead)
        .map_err(|e| PipelineError::ProtocolDecode(format!("invalid request head: {e}")))
}

/// Returns the request target from the request line at the start of
/// `prefix`, once the line is complete.
///
/// Returns `Ok(None)` while the line is still arriving, and an empty target
/// for a line with no second token.
///
/// # Errors
///
/// Returns [`PipelineError::FramingViolation`] if no line break appears within
/// the size limit.
pub fn peek_request_target(prefix: &[u8]) -> Result<Option<String>, PipelineError> {
    let Some(end) = prefix.windows(2).position(|w| w == b"\r\n") else {
        if prefix.len() >= MAX_FRAME_LENGTH {
            return Err(PipelineError::FramingViolation {
                max: MAX_FRAME_LENGTH,
                buffered: prefix.len(),
            });
        }
        return Ok(None);
    };

    let line = String::from_utf8_lossy(&prefix[..end]);
    Ok(Some(line.split(' ').nth(1).unwrap_or_default().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPGRADE: &[u8] = b"GET /jaggrab HTTP/1.1\r\n\
Host: localhost\r\n\
Upgrade: websocket\r\n\
Connection: keep-alive, Upgrade\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
Sec-WebSocket-Version: 13\r\n\r\n";

    #[test]
    fn test_upgrade_request_parses() {
        // Arrange
        let mut decoder = HttpHeadDecoder::new();

        // Act
        let request = decoder.decode(UPGRADE).unwrap().unwrap();

        // Assert
        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.target(), "/jaggrab");
        assert_eq!(request.as_request().version(), Version::HTTP_11);
        assert!(request.is_websocket_upgrade());
        assert_eq!(
            request.header("Sec-WebSocket-Key"),
            Some("dGhlIHNhbXBsZSBub25jZQ==")
        );
        assert!(decoder.take_remainder().is_empty());
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let request = HttpHeadDecoder::new().decode(UPGRADE).unwrap().unwrap();
        assert_eq!(request.header("sec-websocket-version"), Some("13"));
        assert_eq!(request.header("X-Missing"), None);
    }

    #[test]
    fn test_plain_get_is_not_an_upgrade() {
        let request = HttpHeadDecoder::new()
            .decode(b"GET /index.html HTTP/1.1\r\nHost: a\r\n\r\n")
            .unwrap()
            .unwrap();
        assert!(!request.is_websocket_upgrade());
    }

    #[test]
    fn test_head_split_across_reads() {
        let mut decoder = HttpHeadDecoder::new();

        assert!(decoder.decode(&UPGRADE[..20]).unwrap().is_none());
        let request = decoder.decode(&UPGRADE[20..]).unwrap();

        assert!(request.is_some());
    }

    #[test]
    fn test_bytes_after_head_are_kept_as_remainder() {
        // Arrange
        let mut bytes = UPGRADE.to_vec();
        bytes.extend_from_slice(b"JAGGRAB /crc\n\n");
        let mut decoder = HttpHeadDecoder::new();

        // Act
        let request = decoder.decode(&bytes).unwrap();

        // Assert
        assert!(request.is_some());
        assert_eq!(decoder.take_remainder(), b"JAGGRAB /crc\n\n".to_vec());
    }

    #[test]
    fn test_malformed_request_line_is_decode_error() {
        let result = HttpHeadDecoder::new().decode(b"GARBAGE\r\n\r\n");
        assert!(matches!(result, Err(PipelineError::ProtocolDecode(_))));
    }

    #[test]
    fn test_malformed_header_is_decode_error() {
        let result = HttpHeadDecoder::new().decode(b"GET / HTTP/1.1\r\nno colon here\r\n\r\n");
        assert!(matches!(result, Err(PipelineError::ProtocolDecode(_))));
    }

    #[test]
    fn test_oversized_head_is_framing_violation() {
        let mut bytes = b"GET / HTTP/1.1\r\nX-Pad: ".to_vec();
        bytes.extend(std::iter::repeat(b'a').take(MAX_FRAME_LENGTH));
        let result = HttpHeadDecoder::new().decode(&bytes);
        assert!(matches!(result, Err(PipelineError::FramingViolation { .. })));
    }

    #[test]
    fn test_target_keeps_query() {
        let request = HttpHeadDecoder::new()
            .decode(b"GET /jaggrab?build=317 HTTP/1.1\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(request.target(), "/jaggrab?build=317");
    }

    #[test]
    fn test_http_10_head_keeps_its_version() {
        let request = HttpHeadDecoder::new()
            .decode(b"GET / HTTP/1.0\r\n\r\n")
            .unwrap()
            .unwrap();
        assert_eq!(request.as_request().version(), Version::HTTP_10);
    }

    #[test]
    fn test_unknown_http_version_is_decode_error() {
        let result = HttpHeadDecoder::new().decode(b"GET / HTTP/2.0\r\n\r\n");
        assert!(matches!(result, Err(PipelineError::ProtocolDecode(_))));
    }

    #[test]
    fn test_equal_heads_compare_equal() {
        let a = HttpHeadDecoder::new().decode(UPGRADE).unwrap().unwrap();
        let b = HttpHeadDecoder::new().decode(UPGRADE).unwrap().unwrap();
        let other = HttpHeadDecoder::new()
            .decode(b"GET /other HTTP/1.1\r\n\r\n")
            .unwrap()
            .unwrap();

        assert_eq!(a, b);
        assert_ne!(a, other);
    }

    #[test]
    fn test_bad_request_has_zero_length_body() {
        let response = ResponseHead::bad_request();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.header("content-length"), Some("0"));
        assert_eq!(response.header("Connection"), Some("close"));
    }

    #[test]
    fn test_peek_request_target_waits_for_line_break() {
        assert_eq!(peek_request_target(b"GET /jag").unwrap(), None);
        assert_eq!(
            peek_request_target(b"GET /jaggrab HTTP/1.1\r\n").unwrap(),
            Some("/jaggrab".to_string())
        );
        assert_eq!(peek_request_target(b"GET\r\n").unwrap(), Some(String::new()));
    }
}
