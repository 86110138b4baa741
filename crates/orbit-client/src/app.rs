//! Application root.
//!
//! [`App`] owns the session, the API client, the one relay connection and the
//! router. Components that need any of them borrow them from here.

use orbit_core::{History, LinkClick, MemoryHistory, Resolution, RouteContext, Router};
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::model::AuthResponse;
use crate::nav::{paths, NavChrome};
use crate::realtime::RelayClient;
use crate::services::LoginBody;
use crate::session::Session;
use crate::store::{FileStore, KeyStore, MemoryStore};

/// The application root.
pub struct App<H: History = MemoryHistory> {
    session: Session,
    api: ApiClient,
    relay: RelayClient,
    router: Router<H>,
}

impl App<MemoryHistory> {
    /// Build an application from `config`, starting at `/`.
    ///
    /// Starts the relay task when realtime is enabled, so this must run
    /// inside a tokio runtime in that case.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured auth store cannot be opened.
    pub fn from_config(config: ClientConfig) -> Result<Self, ClientError> {
        let store: Arc<dyn KeyStore> = match &config.auth_store {
            Some(path) => Arc::new(FileStore::open(path)?),
            None => Arc::new(MemoryStore::new()),
        };
        let session = Session::new(store);
        let api = ApiClient::new(config.api, session.clone());
        let relay = RelayClient::connect(config.relay);
        Ok(Self::new(session, api, relay, MemoryHistory::new(paths::HOME)))
    }
}

impl<H: History> App<H> {
    /// Assemble an application from its parts. The not-found view logs the
    /// unmatched path.
    #[must_use]
    pub fn new(session: Session, api: ApiClient, relay: RelayClient, history: H) -> Self {
        let router = Router::new(history, |ctx: &RouteContext| {
            warn!(path = %ctx.path, "No route matched");
        });
        Self::with_router(session, api, relay, router)
    }

    /// Assemble an application around an existing router.
    #[must_use]
    pub fn with_router(session: Session, api: ApiClient, relay: RelayClient, router: Router<H>) -> Self {
        Self {
            session,
            api,
            relay,
            router,
        }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub fn relay(&self) -> &RelayClient {
        &self.relay
    }

    #[must_use]
    pub fn router(&self) -> &Router<H> {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut Router<H> {
        &mut self.router
    }

    /// Navigation chrome for the current auth state.
    #[must_use]
    pub fn nav(&self) -> NavChrome {
        NavChrome::from_session(&self.session)
    }

    /// Resolve the current location.
    pub fn start(&self) -> Resolution {
        self.router.resolve()
    }

    /// Navigate to `path`.
    pub fn navigate(&mut self, path: &str) -> Resolution {
        self.router.navigate(path)
    }

    /// Route a link click. Returns `true` when the click was handled.
    pub fn handle_click(&mut self, click: &LinkClick) -> bool {
        self.router.handle_click(click)
    }

    /// Sign in and store the resulting auth state.
    ///
    /// # Errors
    ///
    /// See [`crate::services::AuthService::sign_in`].
    pub async fn login(&self, body: &LoginBody) -> Result<AuthResponse, ClientError> {
        self.api.auth().sign_in(body).await
    }

    /// Clear the auth store, announce the change, then navigate home so the
    /// next render already sees the cleared state.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn logout(&mut self) -> Result<Resolution, ClientError> {
        self.session.logout()?;
        info!("Returning to home after logout");
        Ok(self.router.navigate(paths::HOME))
    }
}
