//! Relay hub.
//!
//! The hub fans relay messages out to every connected session. Each session
//! holds a [`RelaySubscription`] that filters out messages the session emitted
//! itself, so a sender never receives its own echo. Delivery is best-effort:
//! a session that lags past the buffer capacity skips ahead, and nothing is
//! replayed to sessions that connect later.

use crate::message::{now_millis, RelayMessage};
use dashmap::DashMap;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

/// Unique identifier for a relay connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(0);

impl ConnectionId {
    /// Create a connection ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh connection ID.
    #[must_use]
    pub fn generate() -> Self {
        let seq = CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("conn_{:x}_{seq}", now_millis()))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hub errors.
#[derive(Debug, Error)]
pub enum HubError {
    /// Connection limit reached.
    #[error("Maximum connections reached: {0}")]
    TooManyConnections(usize),
}

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of concurrently connected sessions.
    pub max_connections: usize,
    /// Per-session buffer of undelivered messages before lagging.
    pub capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 10_000,
            capacity: 1024,
        }
    }
}

/// A session's view of the relay.
pub struct RelaySubscription {
    id: ConnectionId,
    receiver: broadcast::Receiver<Arc<RelayMessage>>,
}

impl RelaySubscription {
    /// The session's connection ID.
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Wait for the next message emitted by someone else.
    ///
    /// Returns `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<Arc<RelayMessage>> {
        loop {
            match self.receiver.recv().await {
                Ok(msg) if msg.is_from(&self.id) => continue,
                Ok(msg) => return Some(msg),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(connection = %self.id, skipped, "Relay subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`RelaySubscription::recv`].
    pub fn try_recv(&mut self) -> Option<Arc<RelayMessage>> {
        loop {
            match self.receiver.try_recv() {
                Ok(msg) if msg.is_from(&self.id) => continue,
                Ok(msg) => return Some(msg),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(connection = %self.id, skipped, "Relay subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }
}

impl fmt::Debug for RelaySubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelaySubscription").field("id", &self.id).finish()
    }
}

/// The relay hub.
pub struct RelayHub {
    sender: broadcast::Sender<Arc<RelayMessage>>,
    /// Connected sessions and the time they connected.
    connections: DashMap<ConnectionId, u64>,
    relayed: AtomicU64,
    config: HubConfig,
}

impl RelayHub {
    /// Create a new hub with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    /// Create a new hub with custom configuration.
    #[must_use]
    pub fn with_config(config: HubConfig) -> Self {
        info!("Creating relay hub with config: {:?}", config);
        let (sender, _) = broadcast::channel(config.capacity.max(1));
        Self {
            sender,
            connections: DashMap::new(),
            relayed: AtomicU64::new(0),
            config,
        }
    }

    /// Register a new session.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection limit is reached.
    pub fn connect(&self) -> Result<RelaySubscription, HubError> {
        if self.connections.len() >= self.config.max_connections {
            return Err(HubError::TooManyConnections(self.config.max_connections));
        }

        let id = ConnectionId::generate();
        let receiver = self.sender.subscribe();
        self.connections.insert(id.clone(), now_millis());

        debug!(connection = %id, connections = self.connections.len(), "Session connected");
        Ok(RelaySubscription { id, receiver })
    }

    /// Forget a session. Dropping its subscription stops delivery.
    pub fn disconnect(&self, id: &ConnectionId) {
        if self.connections.remove(id).is_some() {
            debug!(connection = %id, connections = self.connections.len(), "Session disconnected");
        }
    }

    /// Fan a message out to every session except its source.
    ///
    /// Returns the number of sessions the message was offered to.
    pub fn relay(&self, message: RelayMessage) -> usize {
        let sender_connected = message
            .source
            .as_ref()
            .is_some_and(|source| self.connections.contains_key(source));
        let event = message.event.clone();

        self.relayed.fetch_add(1, Ordering::Relaxed);
        let receivers = self.sender.send(Arc::new(message)).unwrap_or_default();
        let recipients = receivers.saturating_sub(usize::from(sender_connected));

        trace!(event = %event, recipients, "Relayed message");
        recipients
    }

    /// Rebroadcast an event emitted by `source` to everyone else.
    pub fn broadcast_from(&self, source: &ConnectionId, event: &str, data: Value) -> usize {
        self.relay(RelayMessage::new(event, data).with_source(source.clone()))
    }

    /// Send a server-originated event to every session.
    pub fn publish(&self, event: &str, data: Value) -> usize {
        self.relay(RelayMessage::new(event, data))
    }

    /// Whether a session is connected.
    #[must_use]
    pub fn is_connected(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// Get hub statistics.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        HubStats {
            connection_count: self.connections.len(),
            total_relayed: self.relayed.load(Ordering::Relaxed),
        }
    }
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Hub statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    /// Number of connected sessions.
    pub connection_count: usize,
    /// Total messages relayed since start.
    pub total_relayed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sender_does_not_receive_own_event() {
        let hub = RelayHub::new();
        let mut alice = hub.connect().unwrap();
        let mut bob = hub.connect().unwrap();
        let mut carol = hub.connect().unwrap();

        let recipients = hub.broadcast_from(alice.id(), "post:created", json!({ "id": 1 }));
        assert_eq!(recipients, 2);

        assert!(alice.try_recv().is_none());
        assert_eq!(bob.try_recv().unwrap().data, json!({ "id": 1 }));
        assert_eq!(carol.try_recv().unwrap().event, "post:created");
    }

    #[test]
    fn test_server_publish_reaches_everyone() {
        let hub = RelayHub::new();
        let mut alice = hub.connect().unwrap();
        let mut bob = hub.connect().unwrap();

        assert_eq!(hub.publish("post:deleted", json!({ "id": 9 })), 2);
        assert!(alice.try_recv().is_some());
        assert!(bob.try_recv().is_some());
    }

    #[test]
    fn test_no_replay_for_late_sessions() {
        let hub = RelayHub::new();
        assert_eq!(hub.publish("post:created", Value::Null), 0);

        let mut late = hub.connect().unwrap();
        assert!(late.try_recv().is_none());
    }

    #[test]
    fn test_connection_limit() {
        let hub = RelayHub::with_config(HubConfig {
            max_connections: 1,
            capacity: 8,
        });
        let first = hub.connect().unwrap();
        assert!(matches!(hub.connect(), Err(HubError::TooManyConnections(1))));

        hub.disconnect(first.id());
        assert!(hub.connect().is_ok());
    }

    #[test]
    fn test_lagging_subscriber_skips_ahead() {
        let hub = RelayHub::with_config(HubConfig {
            max_connections: 4,
            capacity: 2,
        });
        let mut slow = hub.connect().unwrap();
        for id in 0..5 {
            hub.publish("post:created", json!({ "id": id }));
        }

        assert_eq!(slow.try_recv().unwrap().data, json!({ "id": 3 }));
        assert_eq!(slow.try_recv().unwrap().data, json!({ "id": 4 }));
        assert!(slow.try_recv().is_none());
    }

    #[test]
    fn test_stats() {
        let hub = RelayHub::new();
        let a = hub.connect().unwrap();
        let _b = hub.connect().unwrap();
        hub.broadcast_from(a.id(), "post:created", Value::Null);
        hub.disconnect(a.id());

        assert_eq!(
            hub.stats(),
            HubStats {
                connection_count: 1,
                total_relayed: 1,
            }
        );
        assert!(!hub.is_connected(a.id()));
    }

    #[tokio::test]
    async fn test_recv_skips_own_messages() {
        let hub = RelayHub::new();
        let mut alice = hub.connect().unwrap();
        let bob = hub.connect().unwrap();

        hub.broadcast_from(alice.id(), "post:created", json!({ "from": "alice" }));
        hub.broadcast_from(bob.id(), "post:created", json!({ "from": "bob" }));

        let msg = alice.recv().await.unwrap();
        assert_eq!(msg.data, json!({ "from": "bob" }));
    }
}
