//! Protocol detection from a connection's first bytes.
//!
//! A listener that is not pinned to one protocol family classifies each
//! connection by sniffing what the client sends first:
//!
//! | First bytes                          | Family                |
//! |--------------------------------------|-----------------------|
//! | `JAGGRAB `                           | `FileGrab`            |
//! | HTTP method, target under file path  | `FileGrabWebSocket`   |
//! | HTTP method, any other target        | `GameWebSocket`       |
//! | anything else                        | `Game`                |
//!
//! Detection only looks; the sniffed bytes are replayed into the selected
//! pipeline afterwards.

use gate_core::protocol::file_grab::REQUEST_PREFIX;
use gate_core::protocol::http::{peek_request_target, METHODS};
use gate_core::PipelineError;

use crate::domain::ProtocolFamily;

/// Outcome of inspecting the bytes received so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    Detected(ProtocolFamily),
    /// The bytes so far are a prefix of more than one possibility.
    NeedMore,
}

/// Classifies a connection from the bytes received so far.
///
/// # Errors
///
/// Returns [`PipelineError::FramingViolation`] if an HTTP request line does
/// not end within the frame length limit.
pub fn detect(prefix: &[u8], file_grab_path: &str) -> Result<Detection, PipelineError> {
    if prefix.is_empty() {
        return Ok(Detection::NeedMore);
    }

    let file_grab = REQUEST_PREFIX.as_bytes();
    if prefix.starts_with(file_grab) {
        return Ok(Detection::Detected(ProtocolFamily::FileGrab));
    }
    let mut ambiguous = file_grab.starts_with(prefix);

    for method in METHODS {
        let token = method.as_bytes();
        let complete = prefix.len() > token.len()
            && prefix.starts_with(token)
            && prefix[token.len()] == b' ';
        if complete {
            return Ok(match peek_request_target(prefix)? {
                None => Detection::NeedMore,
                Some(target) if target.starts_with(file_grab_path) => {
                    Detection::Detected(ProtocolFamily::FileGrabWebSocket)
                }
                Some(_) => Detection::Detected(ProtocolFamily::GameWebSocket),
            });
        }
        if prefix.len() <= token.len() && token.starts_with(prefix) {
            ambiguous = true;
        }
    }

    Ok(if ambiguous {
        Detection::NeedMore
    } else {
        Detection::Detected(ProtocolFamily::Game)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_core::protocol::MAX_FRAME_LENGTH;

    fn detect_default(prefix: &[u8]) -> Detection {
        detect(prefix, "/jaggrab").unwrap()
    }

    #[test]
    fn test_file_grab_prefix_is_detected() {
        assert_eq!(
            detect_default(b"JAGGRAB /crc"),
            Detection::Detected(ProtocolFamily::FileGrab)
        );
    }

    #[test]
    fn test_partial_file_grab_prefix_needs_more() {
        assert_eq!(detect_default(b"JAGG"), Detection::NeedMore);
    }

    #[test]
    fn test_upgrade_to_file_grab_path() {
        assert_eq!(
            detect_default(b"GET /jaggrab HTTP/1.1\r\n"),
            Detection::Detected(ProtocolFamily::FileGrabWebSocket)
        );
    }

    #[test]
    fn test_upgrade_to_other_path_is_game() {
        assert_eq!(
            detect_default(b"GET /game HTTP/1.1\r\n"),
            Detection::Detected(ProtocolFamily::GameWebSocket)
        );
    }

    #[test]
    fn test_request_line_in_progress_needs_more() {
        assert_eq!(detect_default(b"GET /jag"), Detection::NeedMore);
        assert_eq!(detect_default(b"GE"), Detection::NeedMore);
        assert_eq!(detect_default(b"GET"), Detection::NeedMore);
    }

    #[test]
    fn test_other_bytes_are_raw_game() {
        assert_eq!(
            detect_default(&[14, 0, 3, 1, 2, 3]),
            Detection::Detected(ProtocolFamily::Game)
        );
        assert_eq!(
            detect_default(b"GEX"),
            Detection::Detected(ProtocolFamily::Game)
        );
    }

    #[test]
    fn test_configured_path_is_honoured() {
        assert_eq!(
            detect(b"GET /files/x HTTP/1.1\r\n", "/files").unwrap(),
            Detection::Detected(ProtocolFamily::FileGrabWebSocket)
        );
    }

    #[test]
    fn test_endless_request_line_is_framing_violation() {
        let mut prefix = b"GET /".to_vec();
        prefix.extend(std::iter::repeat(b'a').take(MAX_FRAME_LENGTH));

        let result = detect(&prefix, "/jaggrab");

        assert!(matches!(result, Err(PipelineError::FramingViolation { .. })));
    }
}
