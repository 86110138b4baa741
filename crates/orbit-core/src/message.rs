//! Relay message types.
//!
//! A relay message is one named event travelling through the hub, tagged with
//! the connection that emitted it (if any) so fan-out can skip the sender.

use orbit_protocol::Frame;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::hub::ConnectionId;

/// A unique message identifier.
pub type MessageId = u64;

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Generate a unique message ID.
#[must_use]
pub fn generate_message_id() -> MessageId {
    ID_COUNTER.fetch_add(1, Ordering::Relaxed) + 1
}

/// An event travelling through the relay hub.
#[derive(Debug, Clone)]
pub struct RelayMessage {
    /// Unique message identifier.
    pub id: MessageId,
    /// Emitting connection; `None` for server-originated events.
    pub source: Option<ConnectionId>,
    /// Event name.
    pub event: String,
    /// Event payload.
    pub data: Value,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl RelayMessage {
    /// Create a server-originated message.
    #[must_use]
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            id: generate_message_id(),
            source: None,
            event: event.into(),
            data,
            timestamp: now_millis(),
        }
    }

    /// Tag the message with the connection that emitted it.
    #[must_use]
    pub fn with_source(mut self, source: ConnectionId) -> Self {
        self.source = Some(source);
        self
    }

    /// Whether `connection` emitted this message.
    #[must_use]
    pub fn is_from(&self, connection: &ConnectionId) -> bool {
        self.source.as_ref() == Some(connection)
    }

    /// The frame delivered to receiving sessions.
    #[must_use]
    pub fn to_frame(&self) -> Frame {
        Frame::event(self.event.clone(), self.data.clone())
    }
}
