use serde::Serialize;
use tracing::info;

use super::{required, SOCIAL};
use crate::api::ApiClient;
use crate::error::ClientError;
use crate::model::{AuthResponse, Envelope};
use crate::session::AuthState;

/// Registration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterBody {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
}

impl RegisterBody {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
            avatar: None,
            banner: None,
        }
    }
}

/// Login request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

impl LoginBody {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl AuthResponse {
    /// Auth state to persist, if the response carried a token.
    #[must_use]
    pub fn auth_state(&self) -> Option<AuthState> {
        let token = self.access_token.as_deref().filter(|t| !t.is_empty())?;
        Some(
            AuthState::new(token)
                .with_name(&self.name)
                .with_email(&self.email),
        )
    }
}

/// `/social/auth` endpoints.
#[derive(Debug, Clone)]
pub struct AuthService {
    api: ApiClient,
}

impl AuthService {
    pub(crate) fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Register a new user. Registration does not sign the user in.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn register(&self, body: &RegisterBody) -> Result<AuthResponse, ClientError> {
        let endpoint = format!("{SOCIAL}/auth/register");
        let envelope: Envelope<AuthResponse> =
            required(&endpoint, self.api.post(&endpoint, body).await?)?;
        Ok(envelope.data)
    }

    /// Exchange credentials for a token.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn login(&self, body: &LoginBody) -> Result<AuthResponse, ClientError> {
        let endpoint = format!("{SOCIAL}/auth/login");
        let envelope: Envelope<AuthResponse> =
            required(&endpoint, self.api.post(&endpoint, body).await?)?;
        Ok(envelope.data)
    }

    /// Log in and store the returned auth state on the client's session,
    /// announcing the change to subscribers.
    ///
    /// # Errors
    ///
    /// Propagates request failures, [`ClientError::EmptyResponse`] when no
    /// token was issued, and store write failures.
    pub async fn sign_in(&self, body: &LoginBody) -> Result<AuthResponse, ClientError> {
        let response = self.login(body).await?;
        let state = response
            .auth_state()
            .ok_or_else(|| ClientError::EmptyResponse(format!("{SOCIAL}/auth/login")))?;
        self.api.session().login(&state)?;
        info!(user = %response.name, "Signed in");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiConfig;
    use crate::session::{AuthEvent, Session};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(ApiConfig::new(&server.uri()), Session::in_memory())
    }

    #[tokio::test]
    async fn test_sign_in_stores_auth_and_notifies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/social/auth/login"))
            .and(body_json(json!({ "email": "a@stud.noroff.no", "password": "pw" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "name": "alice",
                    "email": "a@stud.noroff.no",
                    "avatar": { "url": "https://img/a.png", "alt": "" },
                    "accessToken": "tok-1"
                },
                "meta": {}
            })))
            .mount(&server)
            .await;

        let api = client(&server).await;
        let mut changes = api.session().subscribe();
        let response = api
            .auth()
            .sign_in(&LoginBody::new("a@stud.noroff.no", "pw"))
            .await
            .unwrap();

        assert_eq!(response.name, "alice");
        assert_eq!(api.session().access_token().as_deref(), Some("tok-1"));
        assert_eq!(api.session().user_email().as_deref(), Some("a@stud.noroff.no"));
        assert_eq!(changes.try_recv().unwrap(), AuthEvent::LoggedIn);
    }

    #[tokio::test]
    async fn test_register_does_not_sign_in() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/social/auth/register"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "data": { "name": "bob", "email": "b@stud.noroff.no", "avatar": null }
            })))
            .mount(&server)
            .await;

        let api = client(&server).await;
        let response = api
            .auth()
            .register(&RegisterBody::new("bob", "b@stud.noroff.no", "password1"))
            .await
            .unwrap();

        assert!(response.auth_state().is_none());
        assert!(!api.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_failed_login_leaves_session_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/social/auth/login"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "errors": [{ "message": "Invalid email or password" }]
            })))
            .mount(&server)
            .await;

        let api = client(&server).await;
        let err = api
            .auth()
            .sign_in(&LoginBody::new("a@stud.noroff.no", "wrong"))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(err.to_string(), "Invalid email or password");
        assert!(!api.session().is_authenticated());
    }
}
