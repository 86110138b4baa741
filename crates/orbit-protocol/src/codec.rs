//! Codec for encoding and decoding relay frames.
//!
//! Frames are JSON documents sent one per WebSocket text message. Binary
//! messages are accepted on decode as long as they hold UTF-8 JSON.

use thiserror::Error;

use crate::frames::Frame;

/// Default maximum frame size (64 KiB).
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {size} exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// JSON encoding or decoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary message was not UTF-8.
    #[error("Frame is not valid UTF-8")]
    NotUtf8,
}

/// Encode a frame with the default size limit.
///
/// # Errors
///
/// Returns an error if the frame is too large or encoding fails.
pub fn encode(frame: &Frame) -> Result<String, ProtocolError> {
    FrameCodec::default().encode(frame)
}

/// Decode a frame with the default size limit.
///
/// # Errors
///
/// Returns an error if the data is too large or not a valid frame.
pub fn decode(data: &str) -> Result<Frame, ProtocolError> {
    FrameCodec::default().decode(data)
}

/// Size-limited frame codec.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl FrameCodec {
    /// Create a codec enforcing the given size limit in bytes.
    #[must_use]
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// The configured size limit.
    #[must_use]
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Encode a frame to JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the result exceeds the limit.
    pub fn encode(&self, frame: &Frame) -> Result<String, ProtocolError> {
        let text = serde_json::to_string(frame)?;
        self.check_size(text.len())?;
        Ok(text)
    }

    /// Decode a frame from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text exceeds the limit or is not a valid frame.
    pub fn decode(&self, data: &str) -> Result<Frame, ProtocolError> {
        self.check_size(data.len())?;
        Ok(serde_json::from_str(data)?)
    }

    /// Decode a frame from a binary message holding UTF-8 JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is too large, not UTF-8 or not a valid frame.
    pub fn decode_bytes(&self, data: &[u8]) -> Result<Frame, ProtocolError> {
        self.check_size(data.len())?;
        let text = std::str::from_utf8(data).map_err(|_| ProtocolError::NotUtf8)?;
        Ok(serde_json::from_str(text)?)
    }

    fn check_size(&self, size: usize) -> Result<(), ProtocolError> {
        if size > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size,
                max: self.max_frame_size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::events;
    use serde_json::json;

    #[test]
    fn test_encode_decode_event() {
        let frame = Frame::event(events::POST_CREATED, json!({ "id": 1, "title": "hello" }));
        let encoded = encode(&frame).unwrap();
        assert_eq!(decode(&encoded).unwrap(), frame);
    }

    #[test]
    fn test_decode_unknown_type() {
        assert!(matches!(
            decode(r#"{"type":"subscribe","channel":"x"}"#),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn test_frame_too_large() {
        let codec = FrameCodec::new(32);
        let frame = Frame::emit("post:created", json!({ "title": "x".repeat(64) }));

        match codec.encode(&frame) {
            Err(ProtocolError::FrameTooLarge { max, .. }) => assert_eq!(max, 32),
            other => panic!("Expected FrameTooLarge error, got {:?}", other),
        }
        assert!(matches!(
            codec.decode(&"x".repeat(33)),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_decode_bytes() {
        let codec = FrameCodec::default();
        let frame = codec.decode_bytes(br#"{"type":"ping","timestamp":5}"#).unwrap();
        assert_eq!(frame, Frame::ping(Some(5)));

        assert!(matches!(
            codec.decode_bytes(&[0xff, 0xfe]),
            Err(ProtocolError::NotUtf8)
        ));
    }
}
