use serde::Serialize;

use super::{get_enveloped, required, SOCIAL};
use crate::api::ApiClient;
use crate::error::ClientError;
use crate::model::{Comment, Envelope, Media, Page, Post, ReactionUpdate};
use crate::query::{encode_component, QueryBuilder};

/// Page size used when none is given.
pub const DEFAULT_LIMIT: u32 = 20;
/// First page.
pub const DEFAULT_PAGE: u32 = 1;

/// Related data to embed in post responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostInclude {
    pub author: bool,
    pub comments: bool,
    pub reactions: bool,
}

impl PostInclude {
    /// Embed everything.
    #[must_use]
    pub fn all() -> Self {
        Self {
            author: true,
            comments: true,
            reactions: true,
        }
    }

    fn apply(self, query: QueryBuilder) -> QueryBuilder {
        query
            .flag("_author", self.author)
            .flag("_comments", self.comments)
            .flag("_reactions", self.reactions)
    }
}

/// Filters for post listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPosts {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub tag: Option<String>,
    pub q: Option<String>,
    pub include: PostInclude,
}

impl ListPosts {
    fn query(&self) -> QueryBuilder {
        let query = QueryBuilder::new()
            .param("limit", self.limit.unwrap_or(DEFAULT_LIMIT))
            .param("page", self.page.unwrap_or(DEFAULT_PAGE))
            .param_opt("q", self.q.as_deref())
            .param_opt("_tag", self.tag.as_deref());
        self.include.apply(query)
    }
}

/// Create / update payload. Unset fields are omitted, so an update only
/// touches what it names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PostBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Media>,
}

impl PostBody {
    /// A payload with a title.
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_media(mut self, media: Media) -> Self {
        self.media = Some(media);
        self
    }
}

/// New comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentBody {
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<u64>,
}

/// `/social/posts` endpoints.
#[derive(Debug, Clone)]
pub struct PostsService {
    api: ApiClient,
}

impl PostsService {
    pub(crate) fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// List posts, newest first.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn list(&self, params: &ListPosts) -> Result<Page<Post>, ClientError> {
        let endpoint = params.query().apply(&format!("{SOCIAL}/posts"));
        Ok(get_enveloped(&self.api, &endpoint).await?.into())
    }

    /// List posts by profiles the signed-in user follows.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn list_following(
        &self,
        page: Option<u32>,
        limit: Option<u32>,
        include: PostInclude,
    ) -> Result<Page<Post>, ClientError> {
        let params = ListPosts {
            page,
            limit,
            include,
            ..ListPosts::default()
        };
        let endpoint = params.query().apply(&format!("{SOCIAL}/posts/following"));
        Ok(get_enveloped(&self.api, &endpoint).await?.into())
    }

    /// Fetch one post.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn get(&self, id: u64, include: PostInclude) -> Result<Post, ClientError> {
        let endpoint = include
            .apply(QueryBuilder::new())
            .apply(&format!("{SOCIAL}/posts/{id}"));
        Ok(get_enveloped(&self.api, &endpoint).await?.data)
    }

    /// Create a post.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn create(&self, body: &PostBody) -> Result<Post, ClientError> {
        let endpoint = format!("{SOCIAL}/posts");
        let envelope: Envelope<Post> = required(&endpoint, self.api.post(&endpoint, body).await?)?;
        Ok(envelope.data)
    }

    /// Update a post.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn update(&self, id: u64, body: &PostBody) -> Result<Post, ClientError> {
        let endpoint = format!("{SOCIAL}/posts/{id}");
        let envelope: Envelope<Post> =
            required(&endpoint, self.api.put(&endpoint, Some(body)).await?)?;
        Ok(envelope.data)
    }

    /// Delete a post.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn delete(&self, id: u64) -> Result<(), ClientError> {
        let _: Option<serde_json::Value> =
            self.api.delete(&format!("{SOCIAL}/posts/{id}")).await?;
        Ok(())
    }

    /// Toggle the signed-in user's `symbol` reaction.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn react(&self, id: u64, symbol: &str) -> Result<ReactionUpdate, ClientError> {
        let endpoint = format!("{SOCIAL}/posts/{id}/react/{}", encode_component(symbol));
        let envelope: Envelope<ReactionUpdate> = required(
            &endpoint,
            self.api.put::<_, ()>(&endpoint, None).await?,
        )?;
        Ok(envelope.data)
    }

    /// Comment on a post, optionally replying to another comment.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn comment(
        &self,
        id: u64,
        body: impl Into<String>,
        reply_to: Option<u64>,
    ) -> Result<Comment, ClientError> {
        let endpoint = format!("{SOCIAL}/posts/{id}/comment");
        let payload = CommentBody {
            body: body.into(),
            reply_to_id: reply_to,
        };
        let envelope: Envelope<Comment> =
            required(&endpoint, self.api.post(&endpoint, &payload).await?)?;
        Ok(envelope.data)
    }

    /// Delete a comment.
    ///
    /// # Errors
    ///
    /// Propagates request failures.
    pub async fn delete_comment(&self, post_id: u64, comment_id: u64) -> Result<(), ClientError> {
        let endpoint = format!("{SOCIAL}/posts/{post_id}/comment/{comment_id}");
        let _: Option<serde_json::Value> = self.api.delete(&endpoint).await?;
        Ok(())
    }
}
