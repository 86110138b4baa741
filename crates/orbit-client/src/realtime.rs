//! Realtime relay client.
//!
//! A [`RelayClient`] owns one background task that keeps a connection to the
//! relay open, reconnecting after a fixed delay whenever it drops. Handlers
//! registered with [`RelayClient::on`] / [`RelayClient::once`] survive
//! reconnects. Delivery is best-effort: events emitted while disconnected are
//! dropped and nothing missed during an outage is replayed.
//!
//! Connection failures are logged and never returned to callers.

use dashmap::DashMap;
use orbit_protocol::Frame;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::transport::{Connector, RelayConnection};
use crate::websocket::WebSocketConnector;

/// Default development server port.
pub const DEFAULT_PORT: u16 = 3000;
/// Path of the relay endpoint on the server.
pub const SOCKET_PATH: &str = "/socket";

/// Event callback.
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Development relay URL on localhost.
#[must_use]
pub fn dev_url(port: Option<u16>) -> String {
    format!(
        "ws://localhost:{}{SOCKET_PATH}",
        port.unwrap_or(DEFAULT_PORT)
    )
}

/// Relay client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// When false the client never connects and every call is a no-op.
    pub enabled: bool,
    /// Relay WebSocket URL.
    pub url: String,
    /// Wait between connection attempts.
    pub reconnect_delay: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: dev_url(None),
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

impl RelayConfig {
    /// Enabled configuration for `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Disabled configuration.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }
}

/// Identifies a registered handler for [`RelayClient::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Registration {
    id: HandlerId,
    once: bool,
    handler: EventHandler,
}

/// State shared between the handle and the background task.
struct Shared {
    handlers: DashMap<String, Vec<Registration>>,
    next_handler: AtomicU64,
    /// Connection id while connected.
    state: watch::Sender<Option<String>>,
}

impl Shared {
    fn dispatch(&self, event: &str, data: &Value) {
        // Handlers run after the map guard is released so they may call back
        // into the client.
        let handlers: Vec<EventHandler> = match self.handlers.get_mut(event) {
            Some(mut registrations) => {
                let handlers = registrations.iter().map(|r| r.handler.clone()).collect();
                registrations.retain(|r| !r.once);
                handlers
            }
            None => Vec::new(),
        };

        debug!(event, handlers = handlers.len(), "Dispatching relay event");
        for handler in handlers {
            handler(data);
        }
    }

    /// Apply an incoming frame, returning a reply to send if one is due.
    fn handle_frame(&self, frame: Frame) -> Option<Frame> {
        match frame {
            Frame::Connected {
                connection_id,
                version,
                ..
            } => {
                info!(connection_id = %connection_id, version, "Relay connected");
                self.state.send_replace(Some(connection_id));
                None
            }
            Frame::Event { event, data } => {
                self.dispatch(&event, &data);
                None
            }
            Frame::Ping { timestamp } => Some(Frame::pong(timestamp)),
            Frame::Pong { .. } => None,
            Frame::Error { code, message } => {
                warn!(code, message = %message, "Relay reported an error");
                None
            }
            Frame::Emit { event, .. } => {
                debug!(event = %event, "Ignoring emit frame from relay");
                None
            }
        }
    }
}

struct Inner {
    shared: Arc<Shared>,
    outgoing: mpsc::UnboundedSender<Frame>,
    task: JoinHandle<()>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Handle to the relay connection. Clones share one connection.
#[derive(Clone)]
pub struct RelayClient {
    inner: Option<Arc<Inner>>,
}

impl RelayClient {
    /// Start a client over WebSocket. Must be called inside a tokio runtime
    /// unless `config.enabled` is false.
    #[must_use]
    pub fn connect(config: RelayConfig) -> Self {
        Self::with_connector(config, WebSocketConnector::default())
    }

    /// Start a client over a custom connector.
    #[must_use]
    pub fn with_connector(config: RelayConfig, connector: impl Connector) -> Self {
        if !config.enabled {
            debug!("Realtime relay disabled");
            return Self::disabled();
        }

        let (state, _) = watch::channel(None);
        let shared = Arc::new(Shared {
            handlers: DashMap::new(),
            next_handler: AtomicU64::new(1),
            state,
        });
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();

        info!(url = %config.url, "Starting realtime relay client");
        let task = tokio::spawn(run(
            shared.clone(),
            Arc::new(connector),
            config,
            outgoing_rx,
        ));

        Self {
            inner: Some(Arc::new(Inner {
                shared,
                outgoing,
                task,
            })),
        }
    }

    /// A client that never connects.
    #[must_use]
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Whether the client was started.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Register a handler for every delivery of `event`.
    pub fn on<F>(&self, event: &str, handler: F) -> HandlerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.register(event, Arc::new(handler), false)
    }

    /// Register a handler for the next delivery of `event` only.
    pub fn once<F>(&self, event: &str, handler: F) -> HandlerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.register(event, Arc::new(handler), true)
    }

    fn register(&self, event: &str, handler: EventHandler, once: bool) -> HandlerId {
        let Some(inner) = &self.inner else {
            return HandlerId(0);
        };
        let id = HandlerId(inner.shared.next_handler.fetch_add(1, Ordering::Relaxed));
        inner
            .shared
            .handlers
            .entry(event.to_string())
            .or_default()
            .push(Registration { id, once, handler });
        id
    }

    /// Remove a handler. Returns whether it was registered.
    pub fn off(&self, id: HandlerId) -> bool {
        let Some(inner) = &self.inner else {
            return false;
        };
        let mut removed = false;
        for mut registrations in inner.shared.handlers.iter_mut() {
            let before = registrations.len();
            registrations.retain(|r| r.id != id);
            removed |= registrations.len() != before;
        }
        removed
    }

    /// Number of handlers registered for `event`.
    #[must_use]
    pub fn handler_count(&self, event: &str) -> usize {
        self.inner
            .as_ref()
            .and_then(|inner| inner.shared.handlers.get(event).map(|r| r.len()))
            .unwrap_or(0)
    }

    /// Send `event` to the relay for rebroadcast to every other session.
    ///
    /// Dropped when not connected. Nothing is buffered for a later
    /// reconnect, unlike Socket.IO clients, which replay emits queued while
    /// offline.
    pub fn emit(&self, event: &str, data: Value) {
        let Some(inner) = &self.inner else {
            return;
        };
        if inner.shared.state.borrow().is_none() {
            debug!(event, "Relay not connected, dropping emit");
            return;
        }
        if inner.outgoing.send(Frame::emit(event, data)).is_err() {
            debug!(event, "Relay task stopped, dropping emit");
        }
    }

    /// The server-assigned id of the live connection.
    #[must_use]
    pub fn connection_id(&self) -> Option<String> {
        self.inner
            .as_ref()
            .and_then(|inner| inner.shared.state.borrow().clone())
    }

    /// Whether a connection is live.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection_id().is_some()
    }

    /// Wait until a connection is live and return its id. Returns `None`
    /// immediately for a disabled client.
    pub async fn wait_connected(&self) -> Option<String> {
        let inner = self.inner.as_ref()?;
        let mut state = inner.shared.state.subscribe();
        let id = state.wait_for(Option::is_some).await.ok()?.clone();
        id
    }
}

impl fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayClient")
            .field("enabled", &self.is_enabled())
            .field("connection_id", &self.connection_id())
            .finish()
    }
}

async fn run(
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    config: RelayConfig,
    mut outgoing: mpsc::UnboundedReceiver<Frame>,
) {
    let mut attempt: u64 = 0;
    loop {
        attempt += 1;
        match connector.connect(&config.url).await {
            Ok(conn) => {
                attempt = 0;
                serve(&shared, conn, &mut outgoing).await;
                shared.state.send_replace(None);
                let mut dropped = 0;
                while outgoing.try_recv().is_ok() {
                    dropped += 1;
                }
                warn!(dropped, "Relay disconnected");
            }
            Err(e) => {
                warn!(url = %config.url, attempt, error = %e, "Relay connection failed");
            }
        }
        tokio::time::sleep(config.reconnect_delay).await;
    }
}

async fn serve(
    shared: &Shared,
    mut conn: Box<dyn RelayConnection>,
    outgoing: &mut mpsc::UnboundedReceiver<Frame>,
) {
    loop {
        tokio::select! {
            incoming = conn.recv() => match incoming {
                Ok(Some(frame)) => {
                    if let Some(reply) = shared.handle_frame(frame) {
                        if let Err(e) = conn.send(reply).await {
                            warn!(error = %e, "Failed to answer relay");
                            return;
                        }
                    }
                }
                Ok(None) => return,
                Err(e) => {
                    warn!(error = %e, "Relay receive failed");
                    return;
                }
            },
            Some(frame) = outgoing.recv() => {
                if let Err(e) = conn.send(frame).await {
                    warn!(error = %e, "Relay send failed");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    /// Server side of one fake connection.
    struct ServerEnd {
        to_client: mpsc::UnboundedSender<Frame>,
        from_client: mpsc::UnboundedReceiver<Frame>,
    }

    impl ServerEnd {
        fn send(&self, frame: Frame) {
            self.to_client.send(frame).unwrap();
        }

        async fn next(&mut self) -> Frame {
            timeout(WAIT, self.from_client.recv()).await.unwrap().unwrap()
        }
    }

    struct ChannelConnection {
        incoming: mpsc::UnboundedReceiver<Frame>,
        sent: mpsc::UnboundedSender<Frame>,
    }

    #[async_trait]
    impl RelayConnection for ChannelConnection {
        async fn recv(&mut self) -> Result<Option<Frame>, TransportError> {
            Ok(self.incoming.recv().await)
        }

        async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
            self.sent
                .send(frame)
                .map_err(|_| TransportError::ConnectionClosed)
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    struct ChannelConnector {
        sessions: mpsc::UnboundedSender<ServerEnd>,
        refusals: AtomicUsize,
    }

    #[async_trait]
    impl Connector for ChannelConnector {
        async fn connect(&self, _url: &str) -> Result<Box<dyn RelayConnection>, TransportError> {
            if self
                .refusals
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(TransportError::ConnectFailed("refused".into()));
            }
            let (to_client, incoming) = mpsc::unbounded_channel();
            let (sent, from_client) = mpsc::unbounded_channel();
            self.sessions
                .send(ServerEnd {
                    to_client,
                    from_client,
                })
                .map_err(|_| TransportError::ConnectFailed("gone".into()))?;
            Ok(Box::new(ChannelConnection { incoming, sent }))
        }
    }

    fn fake_client(refusals: usize) -> (RelayClient, mpsc::UnboundedReceiver<ServerEnd>) {
        let (sessions, accepted) = mpsc::unbounded_channel();
        let connector = ChannelConnector {
            sessions,
            refusals: AtomicUsize::new(refusals),
        };
        let config = RelayConfig::new("ws://test/socket")
            .with_reconnect_delay(Duration::from_millis(10));
        (RelayClient::with_connector(config, connector), accepted)
    }

    async fn accept(accepted: &mut mpsc::UnboundedReceiver<ServerEnd>) -> ServerEnd {
        timeout(WAIT, accepted.recv()).await.unwrap().unwrap()
    }

    fn collector() -> (
        impl Fn(&Value) + Send + Sync + 'static,
        mpsc::UnboundedReceiver<Value>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = move |value: &Value| {
            let _ = tx.send(value.clone());
        };
        (handler, rx)
    }

    #[tokio::test]
    async fn test_on_and_once_delivery() {
        let (client, mut accepted) = fake_client(0);
        let (on_handler, mut every) = collector();
        let (once_handler, mut first) = collector();
        client.on("post:created", on_handler);
        client.once("post:created", once_handler);

        let server = accept(&mut accepted).await;
        server.send(Frame::connected("c1", 30_000));
        assert_eq!(client.wait_connected().await.as_deref(), Some("c1"));

        server.send(Frame::event("post:created", json!({ "id": 1 })));
        server.send(Frame::event("post:created", json!({ "id": 2 })));

        assert_eq!(timeout(WAIT, every.recv()).await.unwrap(), Some(json!({ "id": 1 })));
        assert_eq!(timeout(WAIT, every.recv()).await.unwrap(), Some(json!({ "id": 2 })));
        assert_eq!(first.try_recv().unwrap(), json!({ "id": 1 }));
        assert!(first.try_recv().is_err());
        assert_eq!(client.handler_count("post:created"), 1);
    }

    #[tokio::test]
    async fn test_emit_requires_connection() {
        let (client, mut accepted) = fake_client(0);
        let mut server = accept(&mut accepted).await;

        client.emit("post:deleted", json!({ "id": 1 }));

        server.send(Frame::connected("c1", 30_000));
        client.wait_connected().await;
        client.emit("post:deleted", json!({ "id": 2 }));

        assert_eq!(
            server.next().await,
            Frame::emit("post:deleted", json!({ "id": 2 }))
        );
    }

    #[tokio::test]
    async fn test_ping_is_answered() {
        let (client, mut accepted) = fake_client(0);
        let mut server = accept(&mut accepted).await;
        server.send(Frame::connected("c1", 30_000));
        client.wait_connected().await;

        server.send(Frame::ping(Some(42)));
        assert_eq!(server.next().await, Frame::pong(Some(42)));
    }

    #[tokio::test]
    async fn test_reconnects_and_keeps_handlers() {
        let (client, mut accepted) = fake_client(2);
        let (handler, mut received) = collector();
        client.on("post:created", handler);

        let server = accept(&mut accepted).await;
        server.send(Frame::connected("c1", 30_000));
        assert_eq!(client.wait_connected().await.as_deref(), Some("c1"));
        drop(server);

        let server = accept(&mut accepted).await;
        server.send(Frame::connected("c2", 30_000));
        timeout(WAIT, async {
            while client.connection_id().as_deref() != Some("c2") {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        server.send(Frame::event("post:created", json!({ "id": 9 })));
        assert_eq!(timeout(WAIT, received.recv()).await.unwrap(), Some(json!({ "id": 9 })));
    }

    #[tokio::test]
    async fn test_off_removes_handler() {
        let (client, mut accepted) = fake_client(0);
        let (removed, mut removed_rx) = collector();
        let (kept, mut kept_rx) = collector();
        let id = client.on("post:deleted", removed);
        client.on("post:deleted", kept);

        assert!(client.off(id));
        assert!(!client.off(id));

        let server = accept(&mut accepted).await;
        server.send(Frame::connected("c1", 30_000));
        server.send(Frame::event("post:deleted", json!({ "id": 3 })));

        assert_eq!(timeout(WAIT, kept_rx.recv()).await.unwrap(), Some(json!({ "id": 3 })));
        assert!(removed_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disabled_client_is_inert() {
        let client = RelayClient::with_connector(
            RelayConfig::disabled(),
            WebSocketConnector::default(),
        );
        assert!(!client.is_enabled());

        let (handler, mut received) = collector();
        client.on("post:created", handler);
        client.once("post:created", |_| {});
        client.emit("post:created", json!({ "id": 1 }));

        assert!(!client.is_connected());
        assert_eq!(client.handler_count("post:created"), 0);
        assert_eq!(client.wait_connected().await, None);
        assert!(received.try_recv().is_err());
    }

    #[test]
    fn test_dev_url() {
        assert_eq!(dev_url(None), "ws://localhost:3000/socket");
        assert_eq!(dev_url(Some(4000)), "ws://localhost:4000/socket");
    }
}
