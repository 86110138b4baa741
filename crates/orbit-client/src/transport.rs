//! Transport abstraction for the realtime client.
//!
//! The relay client only needs to dial a URL and exchange frames, so it is
//! written against [`Connector`] and [`RelayConnection`] rather than a
//! concrete socket type.

use async_trait::async_trait;
use orbit_protocol::{Frame, ProtocolError};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not establish a connection.
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// An open connection to the relay.
#[async_trait]
pub trait RelayConnection: Send {
    /// Receive the next frame.
    ///
    /// Returns `None` if the connection is closed cleanly.
    async fn recv(&mut self) -> Result<Option<Frame>, TransportError>;

    /// Send a frame.
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Close the connection gracefully.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Dials relay connections.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Open a connection to `url`.
    async fn connect(&self, url: &str) -> Result<Box<dyn RelayConnection>, TransportError>;
}
