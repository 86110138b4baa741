//! WebSocket transport using tokio-tungstenite.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use orbit_protocol::{Frame, FrameCodec};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

use crate::transport::{Connector, RelayConnection, TransportError};

/// Dials `ws://` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector {
    codec: FrameCodec,
}

impl WebSocketConnector {
    /// Create a connector whose connections enforce `codec`'s size limit.
    #[must_use]
    pub fn new(codec: FrameCodec) -> Self {
        Self { codec }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn RelayConnection>, TransportError> {
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;
        debug!(url, "WebSocket connected");
        Ok(Box::new(WebSocketConnection {
            stream,
            codec: self.codec,
            open: true,
        }))
    }
}

/// A client WebSocket connection carrying JSON text frames.
pub struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    codec: FrameCodec,
    open: bool,
}

#[async_trait]
impl RelayConnection for WebSocketConnection {
    async fn recv(&mut self) -> Result<Option<Frame>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(self.codec.decode(&text)?)),
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(self.codec.decode_bytes(&data)?));
                }
                // tungstenite queues the pong itself
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) | Some(Err(WsError::ConnectionClosed)) | None => {
                    debug!("WebSocket closed");
                    self.open = false;
                    return Ok(None);
                }
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    self.open = false;
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
            }
        }
    }

    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::ConnectionClosed);
        }
        let text = self.codec.encode(&frame)?;
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !std::mem::replace(&mut self.open, false) {
            return Ok(());
        }
        self.stream
            .close(None)
            .await
            .map_err(|e| TransportError::SendFailed(format!("Failed to close: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_refused() {
        let connector = WebSocketConnector::default();
        let result = connector.connect("ws://127.0.0.1:1/socket").await;
        assert!(matches!(result, Err(TransportError::ConnectFailed(_))));
    }

    #[tokio::test]
    async fn test_text_frames_roundtrip_over_loopback() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text(r#"{"type":"connected","connection_id":"c1","version":1,"heartbeat":30000}"#.into()))
                .await
                .unwrap();
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                ws.send(Message::Text(text)).await.unwrap();
            }
        });

        let mut conn = WebSocketConnector::default()
            .connect(&format!("ws://{addr}/socket"))
            .await
            .unwrap();
        assert_eq!(conn.recv().await.unwrap(), Some(Frame::connected("c1", 30_000)));

        let emit = Frame::emit("post:created", serde_json::json!({ "id": 1 }));
        conn.send(emit.clone()).await.unwrap();
        assert_eq!(conn.recv().await.unwrap(), Some(emit));
        let _ = conn.close().await;
    }
}
