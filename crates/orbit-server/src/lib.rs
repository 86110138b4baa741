//! # orbit-server
//!
//! Development server for the Orbit social client:
//!
//! - Serves the built client from `dist/`, then `public/`, and falls back to
//!   `dist/index.html` for every other GET so client-side routes resolve
//! - Keeps an in-memory list of demo posts under `/api/posts`
//! - Relays realtime events between connected sessions at `/socket`
//!
//! Demo post mutations are announced over the relay as `post:created` and
//! `post:deleted` events.

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod posts;

pub use config::Config;
pub use handlers::{build_router, run_server, serve, AppState};
pub use posts::{DemoPost, PostStore};
