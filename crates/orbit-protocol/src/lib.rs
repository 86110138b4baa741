//! # orbit-protocol
//!
//! Wire protocol for the Orbit realtime relay.
//!
//! The relay is a best-effort "someone changed something" channel: clients
//! emit named events, the server rebroadcasts them to every other connected
//! session, and nothing is acknowledged or replayed.
//!
//! ## Frame Types
//!
//! - `Connected` - Server greeting carrying the connection id
//! - `Emit` - Client asks the relay to rebroadcast an event
//! - `Event` - Server delivers an event
//! - `Ping` / `Pong` - Keepalive
//! - `Error` - Non-fatal error report
//!
//! ## Example
//!
//! ```rust
//! use orbit_protocol::{codec, events, Frame};
//!
//! let frame = Frame::emit(events::POST_DELETED, serde_json::json!({ "id": 7 }));
//!
//! let encoded = codec::encode(&frame).unwrap();
//! let decoded = codec::decode(&encoded).unwrap();
//! assert_eq!(frame, decoded);
//! ```

pub mod codec;
pub mod frames;

pub use codec::{decode, encode, FrameCodec, ProtocolError};
pub use frames::{codes, events, Frame, FrameType, PROTOCOL_VERSION};
