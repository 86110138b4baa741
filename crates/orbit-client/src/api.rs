//! HTTP client wrapper for the remote API.
//!
//! Every call to the remote API goes through [`ApiClient::request`], which
//! picks the method, applies the API-key and bearer headers, joins the URL and
//! turns non-success responses into [`ApiError`](crate::ApiError).

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::{ApiError, ClientError};
use crate::session::Session;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-noroff-api-key";

/// Remote API configuration, normalized once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    base_url: String,
    api_key: Option<String>,
}

impl ApiConfig {
    /// Create a configuration. Surrounding whitespace and trailing slashes
    /// are removed from the base URL.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Set the API key. Blank keys are ignored.
    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }

    /// The normalized base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The API key, if configured.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

/// Join a base URL and an endpoint with exactly one slash between them.
#[must_use]
pub fn join_url(base: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// A request body.
pub enum Body {
    /// Serialized as JSON with `Content-Type: application/json`.
    Json(Value),
    /// Sent as-is; the multipart encoder sets its own content type.
    Multipart(reqwest::multipart::Form),
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Body::Multipart(_) => f.write_str("Multipart(..)"),
        }
    }
}

/// Per-request options.
#[derive(Debug, Default)]
pub struct RequestOptions {
    /// Explicit method; otherwise POST with a body and GET without.
    pub method: Option<Method>,
    /// Request body.
    pub body: Option<Body>,
    /// Extra headers; these win over the defaults on name collision.
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    /// Empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Set a JSON body.
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(Body::Json(body));
        self
    }

    /// Set a multipart body.
    #[must_use]
    pub fn multipart(mut self, form: reqwest::multipart::Form) -> Self {
        self.body = Some(Body::Multipart(form));
        self
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    fn resolved_method(&self) -> Method {
        match (&self.method, &self.body) {
            (Some(method), _) => method.clone(),
            (None, Some(_)) => Method::POST,
            (None, None) => Method::GET,
        }
    }
}

/// Client for the remote API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: Arc<ApiConfig>,
    session: Session,
}

impl ApiClient {
    /// Create a client that reads its bearer token from `session`.
    #[must_use]
    pub fn new(config: ApiConfig, session: Session) -> Self {
        Self::with_http(reqwest::Client::new(), config, session)
    }

    /// Create a client over an existing `reqwest` client.
    #[must_use]
    pub fn with_http(http: reqwest::Client, config: ApiConfig, session: Session) -> Self {
        Self {
            http,
            config: Arc::new(config),
            session,
        }
    }

    /// The client's configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// The session the client authenticates with.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Full URL for an endpoint.
    #[must_use]
    pub fn url(&self, endpoint: &str) -> String {
        join_url(&self.config.base_url, endpoint)
    }

    /// Default headers merged with the caller's.
    fn headers(&self, options: &RequestOptions) -> Result<HeaderMap, ClientError> {
        let mut headers = HeaderMap::new();

        if matches!(options.body, Some(Body::Json(_))) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Some(key) = self.config.api_key() {
            headers.insert(API_KEY_HEADER, header_value(key)?);
        }
        if let Some(token) = self.session.access_token() {
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {token}"))?);
        }

        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClientError::InvalidHeader(format!("{name}: {e}")))?;
            headers.insert(name, header_value(value)?);
        }

        Ok(headers)
    }

    /// Send a request to `endpoint`.
    ///
    /// Returns `Ok(None)` for `204 No Content` and the parsed JSON body for
    /// any other success.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] for non-success statuses,
    /// [`ClientError::Network`] when no response arrives and
    /// [`ClientError::Json`] when a success body is not the expected JSON.
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Option<T>, ClientError> {
        let method = options.resolved_method();
        let headers = self.headers(&options)?;
        let url = self.url(endpoint);

        let mut builder = self.http.request(method.clone(), &url).headers(headers);
        builder = match options.body {
            Some(Body::Json(value)) => builder.body(serde_json::to_vec(&value)?),
            Some(Body::Multipart(form)) => builder.multipart(form),
            None => builder,
        };

        debug!(method = %method, url = %url, "API request");
        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!(method = %method, url = %url, error = %e, "API request failed");
                return Err(e.into());
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            let details = serde_json::from_slice(&body)
                .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
            let err = ApiError::from_response(status.as_u16(), details);
            warn!(method = %method, url = %url, status = err.status, message = %err.message, "API error");
            return Err(err.into());
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let body = response.bytes().await.map_err(|e| {
            error!(method = %method, url = %url, error = %e, "Failed to read API response");
            ClientError::Network(e)
        })?;
        Ok(Some(serde_json::from_slice(&body)?))
    }

    /// `GET` an endpoint.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Option<T>, ClientError> {
        self.request(endpoint, RequestOptions::new().method(Method::GET))
            .await
    }

    /// `POST` a JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<Option<T>, ClientError> {
        let options = RequestOptions::new()
            .method(Method::POST)
            .json(serde_json::to_value(body)?);
        self.request(endpoint, options).await
    }

    /// `PUT` a JSON body, or nothing when `body` is `None`.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: Option<&B>,
    ) -> Result<Option<T>, ClientError> {
        let mut options = RequestOptions::new().method(Method::PUT);
        if let Some(body) = body {
            options = options.json(serde_json::to_value(body)?);
        }
        self.request(endpoint, options).await
    }

    /// `DELETE` an endpoint.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> Result<Option<T>, ClientError> {
        self.request(endpoint, RequestOptions::new().method(Method::DELETE))
            .await
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url)
            .field("has_api_key", &self.config.api_key.is_some())
            .finish()
    }
}

fn header_value(value: &str) -> Result<HeaderValue, ClientError> {
    HeaderValue::from_str(value).map_err(|e| ClientError::InvalidHeader(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::AuthState;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn client(server: &MockServer, session: &Session) -> ApiClient {
        let config = ApiConfig::new(&format!("  {}//  ", server.uri()))
            .with_api_key(Some("key-123".to_string()));
        ApiClient::new(config, session.clone())
    }

    #[test]
    fn test_base_url_normalized() {
        let config = ApiConfig::new("  https://api.example.com/v2///  ");
        assert_eq!(config.base_url(), "https://api.example.com/v2");
        assert!(ApiConfig::new("x").with_api_key(Some("  ".into())).api_key().is_none());
    }

    #[test]
    fn test_join_url_single_slash() {
        for base in ["https://h.io/v2", "https://h.io/v2/", "https://h.io/v2//"] {
            for endpoint in ["social/posts", "/social/posts", "//social/posts"] {
                assert_eq!(join_url(base, endpoint), "https://h.io/v2/social/posts");
            }
        }
    }

    #[test]
    fn test_method_resolution() {
        assert_eq!(RequestOptions::new().resolved_method(), Method::GET);
        assert_eq!(RequestOptions::new().json(json!({})).resolved_method(), Method::POST);
        assert_eq!(
            RequestOptions::new().json(json!({})).method(Method::PUT).resolved_method(),
            Method::PUT
        );
    }

    #[tokio::test]
    async fn test_body_without_method_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/social/posts"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({ "title": "x" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "data": { "id": 1 } })))
            .expect(1)
            .mount(&server)
            .await;

        let session = Session::in_memory();
        let response: Option<Value> = client(&server, &session)
            .request("social/posts", RequestOptions::new().json(json!({ "title": "x" })))
            .await
            .unwrap();
        assert_eq!(response, Some(json!({ "data": { "id": 1 } })));
    }

    #[tokio::test]
    async fn test_delete_no_content_returns_none() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/social/posts/7"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let session = Session::in_memory();
        let response: Option<Value> = client(&server, &session)
            .request("/social/posts/7", RequestOptions::new().method(Method::DELETE))
            .await
            .unwrap();
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_error_response_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/social/posts/99"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "errors": [{ "message": "No post with such ID" }],
                "status": "Not Found",
                "statusCode": 404
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let session = Session::in_memory();
        let api = client(&server, &session);

        let err = api.get::<Value>("/social/posts/99").await.unwrap_err();
        let api_err = err.as_api().unwrap();
        assert_eq!(api_err.status, 404);
        assert_eq!(api_err.message, "No post with such ID");
        assert_eq!(api_err.details["statusCode"], 404);

        let err = api.get::<Value>("/broken").await.unwrap_err();
        let api_err = err.as_api().unwrap();
        assert_eq!(api_err.status, 500);
        assert_eq!(api_err.message, "An API error occurred (status 500)");
        assert_eq!(api_err.details, json!({}));
    }

    #[tokio::test]
    async fn test_auth_header_tracks_store() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/whoami"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let session = Session::in_memory();
        let api = client(&server, &session);

        api.get::<Value>("/whoami").await.unwrap();
        session.set_auth(&AuthState::new("tok-1")).unwrap();
        api.get::<Value>("/whoami").await.unwrap();
        session.clear_auth().unwrap();
        api.get::<Value>("/whoami").await.unwrap();

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        let auth: Vec<Option<String>> = requests
            .iter()
            .map(|r| {
                r.headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .collect();
        assert_eq!(auth, vec![None, Some("Bearer tok-1".to_string()), None]);
        assert!(requests
            .iter()
            .all(|r| r.headers.get(API_KEY_HEADER).is_some_and(|v| v == "key-123")));
        assert!(requests.iter().all(|r| r.headers.get("content-type").is_none()));
    }

    #[tokio::test]
    async fn test_caller_headers_override_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/raw"))
            .and(header("content-type", "text/plain"))
            .and(header("authorization", "Bearer override"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let session = Session::in_memory();
        session.set_auth(&AuthState::new("stored")).unwrap();

        let options = RequestOptions::new()
            .json(json!("hello"))
            .header("Content-Type", "text/plain")
            .header("Authorization", "Bearer override");
        let response: Option<Value> = client(&server, &session)
            .request("raw", options)
            .await
            .unwrap();
        assert_eq!(response, Some(json!({ "ok": true })));
    }

    #[tokio::test]
    async fn test_multipart_passes_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let session = Session::in_memory();
        let form = reqwest::multipart::Form::new().text("title", "x");
        client(&server, &session)
            .request::<Value>("upload", RequestOptions::new().multipart(form))
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let content_type = requests[0]
            .headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        assert!(content_type.starts_with("multipart/form-data"));
    }

    #[tokio::test]
    async fn test_network_failure() {
        let session = Session::in_memory();
        let api = ApiClient::new(ApiConfig::new("http://127.0.0.1:1"), session);

        let err = api.get::<Value>("/anything").await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
    }

    #[tokio::test]
    async fn test_put_without_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/social/profiles/bob/follow"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
            .expect(1)
            .mount(&server)
            .await;

        let session = Session::in_memory();
        client(&server, &session)
            .put::<Value, Value>("/social/profiles/bob/follow", None)
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0].body.is_empty());
        assert!(requests[0].headers.get("content-type").is_none());
    }
}
