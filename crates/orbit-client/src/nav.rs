//! Navigation chrome state.
//!
//! The chrome is derived from the session every time it is rendered, so it
//! always reflects the store as of the last auth change.

use crate::session::Session;

/// Route paths used by the application.
pub mod paths {
    pub const HOME: &str = "/";
    pub const POST: &str = "/posts/:id";
    pub const PROFILES: &str = "/profiles";
    pub const PROFILE: &str = "/profiles/:name";
    pub const ME: &str = "/me";
    pub const LOGIN: &str = "/login";
    pub const REGISTER: &str = "/register";
}

/// A navigation link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavLink {
    pub label: &'static str,
    pub href: &'static str,
}

const PRIMARY: [NavLink; 3] = [
    NavLink {
        label: "Home",
        href: paths::HOME,
    },
    NavLink {
        label: "Profiles",
        href: paths::PROFILES,
    },
    NavLink {
        label: "My Profile",
        href: paths::ME,
    },
];

const ACCOUNT: [NavLink; 2] = [
    NavLink {
        label: "Login",
        href: paths::LOGIN,
    },
    NavLink {
        label: "Register",
        href: paths::REGISTER,
    },
];

/// Signed-in status shown in the chrome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavStatus {
    SignedIn { display_name: String },
    SignedOut,
}

/// Everything the navigation bar shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavChrome {
    pub status: NavStatus,
}

impl NavChrome {
    /// Build the chrome for the session's current auth state.
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        let status = if session.is_authenticated() {
            NavStatus::SignedIn {
                display_name: session
                    .user_name()
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| "User".to_string()),
            }
        } else {
            NavStatus::SignedOut
        };
        Self { status }
    }

    /// Links shown regardless of auth state.
    #[must_use]
    pub fn primary_links(&self) -> &'static [NavLink] {
        &PRIMARY
    }

    /// Login / register links, shown only when signed out.
    #[must_use]
    pub fn account_links(&self) -> &'static [NavLink] {
        match self.status {
            NavStatus::SignedIn { .. } => &[],
            NavStatus::SignedOut => &ACCOUNT,
        }
    }

    /// `Logged in as <name>` when signed in.
    #[must_use]
    pub fn greeting(&self) -> Option<String> {
        match &self.status {
            NavStatus::SignedIn { display_name } => Some(format!("Logged in as {display_name}")),
            NavStatus::SignedOut => None,
        }
    }

    /// Whether a logout control is shown.
    #[must_use]
    pub fn shows_logout(&self) -> bool {
        matches!(self.status, NavStatus::SignedIn { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::AuthState;

    #[test]
    fn test_signed_out_chrome() {
        let nav = NavChrome::from_session(&Session::in_memory());
        assert_eq!(nav.status, NavStatus::SignedOut);
        assert_eq!(nav.greeting(), None);
        assert!(!nav.shows_logout());
        let labels: Vec<_> = nav.account_links().iter().map(|l| l.label).collect();
        assert_eq!(labels, vec!["Login", "Register"]);
    }

    #[test]
    fn test_signed_in_chrome() {
        let session = Session::in_memory();
        session.set_auth(&AuthState::new("tok").with_name("alice")).unwrap();

        let nav = NavChrome::from_session(&session);
        assert_eq!(nav.greeting().as_deref(), Some("Logged in as alice"));
        assert!(nav.account_links().is_empty());
        assert!(nav.shows_logout());
        assert_eq!(nav.primary_links().len(), 3);
    }

    #[test]
    fn test_missing_name_falls_back() {
        let session = Session::in_memory();
        session.set_auth(&AuthState::new("tok")).unwrap();
        assert_eq!(
            NavChrome::from_session(&session).greeting().as_deref(),
            Some("Logged in as User")
        );
    }
}
