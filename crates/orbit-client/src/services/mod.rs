//! Typed endpoint services over [`ApiClient`].
//!
//! Each service is a cheap handle obtained from the client
//! ([`ApiClient::auth`], [`ApiClient::posts`], [`ApiClient::profiles`]).
//! Responses wrapped in `{ data, meta }` are unwrapped here.

mod auth;
mod posts;
mod profiles;

pub use auth::{AuthService, LoginBody, RegisterBody};
pub use posts::{
    CommentBody, ListPosts, PostBody, PostInclude, PostsService, DEFAULT_LIMIT, DEFAULT_PAGE,
};
pub use profiles::{ListProfiles, MediaUpdate, ProfileInclude, ProfilesService};

use serde::de::DeserializeOwned;

use crate::api::ApiClient;
use crate::error::ClientError;
use crate::model::Envelope;

/// Social API prefix shared by every endpoint.
pub(crate) const SOCIAL: &str = "/social";

impl ApiClient {
    /// Authentication endpoints.
    #[must_use]
    pub fn auth(&self) -> AuthService {
        AuthService::new(self.clone())
    }

    /// Post endpoints.
    #[must_use]
    pub fn posts(&self) -> PostsService {
        PostsService::new(self.clone())
    }

    /// Profile endpoints.
    #[must_use]
    pub fn profiles(&self) -> ProfilesService {
        ProfilesService::new(self.clone())
    }
}

/// Unwrap a required envelope.
pub(crate) fn required<T>(
    endpoint: &str,
    response: Option<Envelope<T>>,
) -> Result<Envelope<T>, ClientError> {
    response.ok_or_else(|| ClientError::EmptyResponse(endpoint.to_string()))
}

/// `GET` an enveloped resource.
pub(crate) async fn get_enveloped<T: DeserializeOwned>(
    api: &ApiClient,
    endpoint: &str,
) -> Result<Envelope<T>, ClientError> {
    required(endpoint, api.get(endpoint).await?)
}
