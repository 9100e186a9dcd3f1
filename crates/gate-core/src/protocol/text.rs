//! 7-bit ASCII text decoding for line-oriented request grammars.

use crate::protocol::error::PipelineError;

/// Decodes a frame as 7-bit US-ASCII.
///
/// The file-grab request grammar is pure ASCII, so any byte with the high bit
/// set means the client is not speaking the protocol.
///
/// # Errors
///
/// Returns [`PipelineError::ProtocolDecode`] naming the offset of the first
/// non-ASCII byte.
pub fn decode_ascii(frame: Vec<u8>) -> Result<String, PipelineError> {
    if let Some(offset) = frame.iter().position(|b| !b.is_ascii()) {
        return Err(PipelineError::ProtocolDecode(format!(
            "non-ASCII byte 0x{:02X} at offset {offset}",
            frame[offset]
        )));
    }
    Ok(frame.into_iter().map(char::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_frame_decodes_verbatim() {
        let text = decode_ascii(b"JAGGRAB /crc\r".to_vec()).unwrap();
        assert_eq!(text, "JAGGRAB /crc\r");
    }

    #[test]
    fn test_control_characters_are_ascii() {
        let text = decode_ascii(b"get\x000".to_vec()).unwrap();
        assert_eq!(text, "get\u{0}0");
    }

    #[test]
    fn test_high_bit_byte_is_rejected_with_offset() {
        let err = decode_ascii(vec![b'a', b'b', 0xC3, 0xA9]).unwrap_err();

        match err {
            PipelineError::ProtocolDecode(msg) => {
                assert!(msg.contains("0xC3"), "{msg}");
                assert!(msg.contains("offset 2"), "{msg}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_every_ascii_byte_maps_to_the_same_char() {
        let frame: Vec<u8> = (0u8..0x80).collect();

        let text = decode_ascii(frame.clone()).unwrap();

        assert_eq!(text.as_bytes(), frame.as_slice());
    }

    #[test]
    fn test_empty_frame_is_empty_string() {
        assert_eq!(decode_ascii(Vec::new()).unwrap(), "");
    }
}
