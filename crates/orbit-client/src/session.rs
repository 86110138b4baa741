//! Authentication session.
//!
//! The session wraps a [`KeyStore`] holding the signed-in user's token, name
//! and email under fixed keys, and broadcasts an [`AuthEvent`] whenever the
//! user logs in or out. The token is re-read from the store on every call, so
//! a login is visible to the very next request.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::store::{KeyStore, MemoryStore, StoreError};

/// Store key for the access token. Its presence is the authentication check.
pub const TOKEN_KEY: &str = "accessToken";
/// Store key for the display name.
pub const NAME_KEY: &str = "currentUserName";
/// Store key for the email address.
pub const EMAIL_KEY: &str = "currentUserEmail";

const EVENT_CAPACITY: usize = 16;

/// The signed-in user's auth state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl AuthState {
    /// Create an auth state with only a token.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            name: None,
            email: None,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Auth-changed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    LoggedIn,
    LoggedOut,
}

/// Shared handle to the auth store and its change channel.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn KeyStore>,
    changes: broadcast::Sender<AuthEvent>,
}

impl Session {
    /// Create a session over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        let (changes, _) = broadcast::channel(EVENT_CAPACITY);
        Self { store, changes }
    }

    /// Create a session over a fresh in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Whether a token is stored.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// The stored access token, if any.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.store.get(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    /// The stored display name, if any.
    #[must_use]
    pub fn user_name(&self) -> Option<String> {
        self.store.get(NAME_KEY)
    }

    /// The stored email, if any.
    #[must_use]
    pub fn user_email(&self) -> Option<String> {
        self.store.get(EMAIL_KEY)
    }

    /// The full stored auth state, if authenticated.
    #[must_use]
    pub fn current(&self) -> Option<AuthState> {
        Some(AuthState {
            access_token: self.access_token()?,
            name: self.user_name(),
            email: self.user_email(),
        })
    }

    /// Replace the stored auth state. Fields absent from `state` are cleared
    /// so a previous user's name or email never outlives their token.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn set_auth(&self, state: &AuthState) -> Result<(), StoreError> {
        self.store.set(TOKEN_KEY, &state.access_token)?;
        match &state.name {
            Some(name) => self.store.set(NAME_KEY, name)?,
            None => self.store.remove(NAME_KEY)?,
        }
        match &state.email {
            Some(email) => self.store.set(EMAIL_KEY, email)?,
            None => self.store.remove(EMAIL_KEY)?,
        }
        debug!(user = ?state.name, "Stored auth state");
        Ok(())
    }

    /// Remove all auth keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn clear_auth(&self) -> Result<(), StoreError> {
        self.store.remove(TOKEN_KEY)?;
        self.store.remove(NAME_KEY)?;
        self.store.remove(EMAIL_KEY)?;
        Ok(())
    }

    /// Broadcast an auth-changed notification.
    pub fn notify(&self, event: AuthEvent) {
        let listeners = self.changes.send(event).unwrap_or_default();
        debug!(?event, listeners, "Auth changed");
    }

    /// Store `state` and announce the login.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn login(&self, state: &AuthState) -> Result<(), StoreError> {
        self.set_auth(state)?;
        info!(user = ?state.name, "Logged in");
        self.notify(AuthEvent::LoggedIn);
        Ok(())
    }

    /// Clear the stored state, then announce the logout.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    pub fn logout(&self) -> Result<(), StoreError> {
        self.clear_auth()?;
        info!("Logged out");
        self.notify(AuthEvent::LoggedOut);
        Ok(())
    }

    /// Subscribe to auth-changed notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.changes.subscribe()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .field("user", &self.user_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_and_logout() {
        let session = Session::in_memory();
        let mut changes = session.subscribe();
        assert!(!session.is_authenticated());

        let state = AuthState::new("tok").with_name("alice").with_email("a@example.com");
        session.login(&state).unwrap();
        assert!(session.is_authenticated());
        assert_eq!(session.current(), Some(state));
        assert_eq!(changes.try_recv().unwrap(), AuthEvent::LoggedIn);

        session.logout().unwrap();
        assert!(!session.is_authenticated());
        assert!(session.user_name().is_none());
        assert!(session.user_email().is_none());
        assert_eq!(changes.try_recv().unwrap(), AuthEvent::LoggedOut);
    }

    #[test]
    fn test_set_auth_replaces_previous_user() {
        let session = Session::in_memory();
        session
            .set_auth(&AuthState::new("one").with_name("alice").with_email("a@example.com"))
            .unwrap();
        session.set_auth(&AuthState::new("two").with_name("bob")).unwrap();

        assert_eq!(session.access_token().as_deref(), Some("two"));
        assert_eq!(session.user_name().as_deref(), Some("bob"));
        assert!(session.user_email().is_none());
    }

    #[test]
    fn test_empty_token_is_not_authenticated() {
        let session = Session::in_memory();
        session.set_auth(&AuthState::new("")).unwrap();
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_logout_clears_before_notifying() {
        let session = Session::in_memory();
        session.login(&AuthState::new("tok")).unwrap();

        let mut changes = session.subscribe();
        let observer = session.clone();
        session.logout().unwrap();

        assert_eq!(changes.try_recv().unwrap(), AuthEvent::LoggedOut);
        assert!(!observer.is_authenticated());
    }

    #[test]
    fn test_auth_state_json_shape() {
        let state: AuthState =
            serde_json::from_str(r#"{"accessToken":"t","name":"n"}"#).unwrap();
        assert_eq!(state, AuthState::new("t").with_name("n"));
    }
}
