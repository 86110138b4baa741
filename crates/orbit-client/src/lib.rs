//! # orbit-client
//!
//! Headless client for the Orbit social app:
//!
//! - **API** - HTTP wrapper that applies the API key and bearer token and
//!   turns error responses into typed [`ApiError`]s
//! - **Services** - Typed auth, post and profile endpoints over the wrapper
//! - **Session** - Auth state in a durable [`KeyStore`] with change
//!   notifications
//! - **Realtime** - One relay connection with `on`/`once`/`emit`
//! - **App** - The root that owns all of the above plus the router
//!
//! ```rust,no_run
//! use orbit_client::{ApiClient, ApiConfig, ListPosts, Session};
//!
//! # async fn run() -> Result<(), orbit_client::ClientError> {
//! let session = Session::in_memory();
//! let api = ApiClient::new(ApiConfig::new("https://v2.api.noroff.dev"), session);
//! let page = api.posts().list(&ListPosts::default()).await?;
//! println!("{} posts", page.items.len());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod model;
pub mod nav;
pub mod query;
pub mod realtime;
pub mod services;
pub mod session;
pub mod store;
pub mod transport;
pub mod websocket;

pub use api::{join_url, ApiClient, ApiConfig, Body, RequestOptions, API_KEY_HEADER};
pub use app::App;
pub use config::{same_origin_socket_url, ClientConfig, ConfigError};
pub use error::{ApiError, ClientError};
pub use model::{
    AuthResponse, Author, Comment, Envelope, Media, Page, PageMeta, Post, Profile, Reaction,
    ReactionUpdate,
};
pub use nav::{NavChrome, NavLink, NavStatus};
pub use query::{encode_component, QueryBuilder};
pub use realtime::{dev_url, HandlerId, RelayClient, RelayConfig};
pub use services::{
    AuthService, ListPosts, ListProfiles, LoginBody, MediaUpdate, PostBody, PostInclude,
    PostsService, ProfileInclude, ProfilesService, RegisterBody,
};
pub use session::{AuthEvent, AuthState, Session};
pub use store::{FileStore, KeyStore, MemoryStore, StoreError};
pub use transport::{Connector, RelayConnection, TransportError};
pub use websocket::WebSocketConnector;
