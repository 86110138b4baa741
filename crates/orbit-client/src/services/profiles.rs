use serde::Serialize;
use tracing::debug;

use super::posts::{DEFAULT_LIMIT, DEFAULT_PAGE};
use super::{get_enveloped, required, SOCIAL};
use crate::api::ApiClient;
use crate::error::ClientError;
use crate::model::{Author, Envelope, Media, Page, Post, Profile};
use crate::query::{encode_component, QueryBuilder};

/// Related data to embed in profile responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileInclude {
    pub followers: bool,
    pub following: bool,
    pub posts: bool,
}

impl ProfileInclude {
    fn apply(self, query: QueryBuilder) -> QueryBuilder {
        query
            .flag("_followers", self.followers)
            .flag("_following", self.following)
            .flag("_posts", self.posts)
    }
}

/// Filters for profile listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListProfiles {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub q: Option<String>,
    pub include: ProfileInclude,
}

/// Avatar / banner update. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MediaUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<Media>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<Media>,
}

/// `/social/profiles` endpoints.
#[derive(Debug, Clone)]
pub struct ProfilesService {
    api: ApiClient,
}

fn profile_path(name: &str) -> String {
    format!("{SOCIAL}/profiles/{}", encode_component(name))
}

fn paging(page: Option<u32>, limit: Option<u32>) -> QueryBuilder {
    QueryBuilder::new()
        .param("limit", limit.unwrap_or(DEFAULT_LIMIT))
        .param("page", page.unwrap_or(DEFAULT_PAGE))
}

impl ProfilesService {
    pub(crate) fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// List or search profiles.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn list(&self, params: &ListProfiles) -> Result<Page<Profile>, ClientError> {
        let query = paging(params.page, params.limit).param_opt("q", params.q.as_deref());
        let endpoint = params
            .include
            .apply(query)
            .apply(&format!("{SOCIAL}/profiles"));
        Ok(get_enveloped(&self.api, &endpoint).await?.into())
    }

    /// Fetch one profile by name.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn get(&self, name: &str, include: ProfileInclude) -> Result<Profile, ClientError> {
        let endpoint = include.apply(QueryBuilder::new()).apply(&profile_path(name));
        Ok(get_enveloped(&self.api, &endpoint).await?.data)
    }

    /// Profiles following `name`.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn followers(&self, name: &str) -> Result<Vec<Author>, ClientError> {
        let profile = self
            .get(
                name,
                ProfileInclude {
                    followers: true,
                    ..ProfileInclude::default()
                },
            )
            .await?;
        Ok(profile.followers)
    }

    /// Profiles `name` follows.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn following(&self, name: &str) -> Result<Vec<Author>, ClientError> {
        let profile = self
            .get(
                name,
                ProfileInclude {
                    following: true,
                    ..ProfileInclude::default()
                },
            )
            .await?;
        Ok(profile.following)
    }

    /// Follow `name`. Sent without a body.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn follow(&self, name: &str) -> Result<(), ClientError> {
        let endpoint = format!("{}/follow", profile_path(name));
        let _: Option<serde_json::Value> = self.api.put::<_, ()>(&endpoint, None).await?;
        debug!(profile = name, "Followed");
        Ok(())
    }

    /// Unfollow `name`. Sent without a body.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn unfollow(&self, name: &str) -> Result<(), ClientError> {
        let endpoint = format!("{}/unfollow", profile_path(name));
        let _: Option<serde_json::Value> = self.api.put::<_, ()>(&endpoint, None).await?;
        debug!(profile = name, "Unfollowed");
        Ok(())
    }

    /// Replace the avatar and/or banner of `name`.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn update_media(
        &self,
        name: &str,
        media: &MediaUpdate,
    ) -> Result<Profile, ClientError> {
        let endpoint = profile_path(name);
        let envelope: Envelope<Profile> =
            required(&endpoint, self.api.put(&endpoint, Some(media)).await?)?;
        Ok(envelope.data)
    }

    /// Posts authored by `name`.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn posts(
        &self,
        name: &str,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Page<Post>, ClientError> {
        let endpoint = paging(page, limit).apply(&format!("{}/posts", profile_path(name)));
        Ok(get_enveloped(&self.api, &endpoint).await?.into())
    }
}
