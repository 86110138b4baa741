//! # orbit-core
//!
//! Core building blocks shared by the Orbit client and server:
//!
//! - **Router** - Path-pattern routing with history integration, link
//!   interception and per-navigation generation tokens
//! - **Hub** - Realtime relay fan-out that never echoes an event to its sender
//! - **Message** - Relay message type
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  emit   ┌─────────────┐  event   ┌─────────────┐
//! │  Session A  │────────▶│  RelayHub   │─────────▶│  Session B  │
//! └─────────────┘         └─────────────┘          └─────────────┘
//!
//! ┌─────────────┐  path   ┌─────────────┐  params  ┌─────────────┐
//! │   History   │────────▶│   Router    │─────────▶│    View     │
//! └─────────────┘         └─────────────┘          └─────────────┘
//! ```

pub mod hub;
pub mod message;
pub mod router;

pub use hub::{ConnectionId, HubConfig, HubError, HubStats, RelayHub, RelaySubscription};
pub use message::RelayMessage;
pub use router::{
    History, LinkClick, MemoryHistory, NavigationToken, Params, PatternError, Resolution, Route,
    RouteContext, RoutePattern, Router,
};
