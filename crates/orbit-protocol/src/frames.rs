//! Frame types for the Orbit relay protocol.
//!
//! Frames travel as JSON text messages over a WebSocket. Each frame carries a
//! `type` tag; event frames carry an event name and an arbitrary JSON payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Current protocol version, announced in the `connected` frame.
pub const PROTOCOL_VERSION: u8 = 1;

/// Frame type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    Connected,
    Emit,
    Event,
    Ping,
    Pong,
    Error,
}

impl FrameType {
    /// Wire name of the frame type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FrameType::Connected => "connected",
            FrameType::Emit => "emit",
            FrameType::Event => "event",
            FrameType::Ping => "ping",
            FrameType::Pong => "pong",
            FrameType::Error => "error",
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol frame.
///
/// `Emit` flows client to server and asks the relay to rebroadcast; `Event`
/// flows server to client and carries a rebroadcast (or server-originated)
/// event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Connection established response.
    Connected {
        /// Identifier the server assigned to this socket.
        connection_id: String,
        /// Protocol version spoken by the server.
        version: u8,
        /// Recommended heartbeat interval in milliseconds.
        heartbeat: u32,
    },

    /// Ask the relay to rebroadcast an event to every other session.
    Emit {
        /// Event name, e.g. `post:created`.
        event: String,
        /// Event payload.
        #[serde(default, skip_serializing_if = "Value::is_null")]
        data: Value,
    },

    /// An event delivered by the relay.
    Event {
        /// Event name.
        event: String,
        /// Event payload.
        #[serde(default, skip_serializing_if = "Value::is_null")]
        data: Value,
    },

    /// Keepalive ping.
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },

    /// Keepalive pong.
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },

    /// Error report. The relay never closes a socket because of one.
    Error {
        /// Error code.
        code: u16,
        /// Human-readable error message.
        message: String,
    },
}

impl Frame {
    /// Get the frame type.
    #[must_use]
    pub fn frame_type(&self) -> FrameType {
        match self {
            Frame::Connected { .. } => FrameType::Connected,
            Frame::Emit { .. } => FrameType::Emit,
            Frame::Event { .. } => FrameType::Event,
            Frame::Ping { .. } => FrameType::Ping,
            Frame::Pong { .. } => FrameType::Pong,
            Frame::Error { .. } => FrameType::Error,
        }
    }

    /// Create a new Connected frame.
    #[must_use]
    pub fn connected(connection_id: impl Into<String>, heartbeat: u32) -> Self {
        Frame::Connected {
            connection_id: connection_id.into(),
            version: PROTOCOL_VERSION,
            heartbeat,
        }
    }

    /// Create a new Emit frame.
    #[must_use]
    pub fn emit(event: impl Into<String>, data: Value) -> Self {
        Frame::Emit {
            event: event.into(),
            data,
        }
    }

    /// Create a new Event frame.
    #[must_use]
    pub fn event(event: impl Into<String>, data: Value) -> Self {
        Frame::Event {
            event: event.into(),
            data,
        }
    }

    /// Create a new Ping frame.
    #[must_use]
    pub fn ping(timestamp: Option<u64>) -> Self {
        Frame::Ping { timestamp }
    }

    /// Create a new Pong frame.
    #[must_use]
    pub fn pong(timestamp: Option<u64>) -> Self {
        Frame::Pong { timestamp }
    }

    /// Create a new Error frame.
    #[must_use]
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Frame::Error {
            code,
            message: message.into(),
        }
    }
}

/// Error codes carried by [`Frame::Error`].
pub mod codes {
    /// The frame could not be decoded.
    pub const MALFORMED_FRAME: u16 = 1001;
    /// The frame type is not accepted in this direction.
    pub const UNEXPECTED_FRAME: u16 = 1002;
    /// The frame exceeded the size limit.
    pub const FRAME_TOO_LARGE: u16 = 1003;
    /// The relay is at its connection limit; the socket is closed after this.
    pub const TOO_MANY_CONNECTIONS: u16 = 1004;
}

/// Event names carried over the relay.
pub mod events {
    use serde::{Deserialize, Serialize};

    /// A post was created; the payload is the created post.
    pub const POST_CREATED: &str = "post:created";

    /// A post was deleted; the payload is [`PostDeleted`].
    pub const POST_DELETED: &str = "post:deleted";

    /// Payload of [`POST_DELETED`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PostDeleted {
        pub id: u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_type() {
        assert_eq!(Frame::emit("post:created", Value::Null).frame_type(), FrameType::Emit);
        assert_eq!(Frame::connected("conn-1", 25_000).frame_type(), FrameType::Connected);
        assert_eq!(FrameType::Event.to_string(), "event");
    }

    #[test]
    fn test_wire_shape() {
        let frame = Frame::event(events::POST_DELETED, json!({ "id": 7 }));
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            json!({ "type": "event", "event": "post:deleted", "data": { "id": 7 } })
        );
    }

    #[test]
    fn test_null_payload_is_omitted() {
        let value = serde_json::to_value(Frame::emit("ping:me", Value::Null)).unwrap();
        assert_eq!(value, json!({ "type": "emit", "event": "ping:me" }));

        let parsed: Frame = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, Frame::emit("ping:me", Value::Null));
    }

    #[test]
    fn test_post_deleted_payload() {
        let payload: events::PostDeleted = serde_json::from_value(json!({ "id": 42 })).unwrap();
        assert_eq!(payload.id, 42);
    }
}
