//! Domain model for remote API payloads.
//!
//! The remote API is loose about some fields: `media`, `avatar` and `banner`
//! arrive as `{url, alt}` objects, bare URL strings or `null`, and list
//! fields may be `null`. Everything is normalized here, at deserialization
//! time, so callers only ever see one shape.

use serde::{Deserialize, Deserializer, Serialize};

/// Response envelope: `{ data, meta }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default)]
    pub meta: Option<PageMeta>,
}

/// Pagination metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    #[serde(default)]
    pub is_first_page: Option<bool>,
    #[serde(default)]
    pub is_last_page: Option<bool>,
    #[serde(default)]
    pub current_page: Option<u32>,
    #[serde(default)]
    pub previous_page: Option<u32>,
    #[serde(default)]
    pub next_page: Option<u32>,
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub total_count: Option<u32>,
}

/// A page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> From<Envelope<Vec<T>>> for Page<T> {
    fn from(envelope: Envelope<Vec<T>>) -> Self {
        Self {
            items: envelope.data,
            meta: envelope.meta.unwrap_or_default(),
        }
    }
}

/// An image reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub url: String,
    #[serde(default)]
    pub alt: String,
}

impl Media {
    /// Media with no alt text.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            alt: String::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMedia {
    Url(String),
    Object {
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        alt: Option<String>,
    },
}

/// Accepts `{url, alt}`, a URL string or `null`; an empty URL is no media.
fn media<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Media>, D::Error> {
    let raw = Option::<RawMedia>::deserialize(deserializer)?;
    let (url, alt) = match raw {
        None => return Ok(None),
        Some(RawMedia::Url(url)) => (url, String::new()),
        Some(RawMedia::Object { url, alt }) => (url.unwrap_or_default(), alt.unwrap_or_default()),
    };
    let url = url.trim().to_string();
    Ok((!url.is_empty()).then_some(Media { url, alt }))
}

/// Treats `null` as the type's default.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Embedded author / profile summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "media")]
    pub avatar: Option<Media>,
}

/// Post counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCounts {
    #[serde(default)]
    pub comments: u32,
    #[serde(default)]
    pub reactions: u32,
}

/// A comment on a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: u64,
    pub body: String,
    #[serde(default)]
    pub reply_to_id: Option<u64>,
    #[serde(default)]
    pub post_id: Option<u64>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub author: Option<Author>,
}

/// Aggregated reactions for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub symbol: String,
    #[serde(default)]
    pub count: u32,
    #[serde(default, deserialize_with = "nullable")]
    pub reactors: Vec<String>,
}

/// Result of toggling a reaction.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionUpdate {
    pub post_id: u64,
    pub symbol: String,
    #[serde(default, deserialize_with = "nullable")]
    pub reactions: Vec<Reaction>,
}

/// A post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "media")]
    pub media: Option<Media>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub updated: Option<String>,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(rename = "_count", default, deserialize_with = "nullable")]
    pub count: PostCounts,
    #[serde(default, deserialize_with = "nullable")]
    pub comments: Vec<Comment>,
    #[serde(default, deserialize_with = "nullable")]
    pub reactions: Vec<Reaction>,
}

/// Profile counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileCounts {
    #[serde(default)]
    pub followers: u32,
    #[serde(default)]
    pub following: u32,
    #[serde(default)]
    pub posts: u32,
}

/// A user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default, deserialize_with = "media")]
    pub avatar: Option<Media>,
    #[serde(default, deserialize_with = "media")]
    pub banner: Option<Media>,
    #[serde(rename = "_count", default, deserialize_with = "nullable")]
    pub count: ProfileCounts,
    #[serde(default, deserialize_with = "nullable")]
    pub followers: Vec<Author>,
    #[serde(default, deserialize_with = "nullable")]
    pub following: Vec<Author>,
    #[serde(default, deserialize_with = "nullable")]
    pub posts: Vec<Post>,
}

/// Login / registration response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub name: String,
    pub email: String,
    #[serde(default, deserialize_with = "media")]
    pub avatar: Option<Media>,
    #[serde(default, deserialize_with = "media")]
    pub banner: Option<Media>,
    /// Present on login; registration does not issue a token.
    #[serde(default)]
    pub access_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_media_shapes_normalize() {
        let object: Post = serde_json::from_value(json!({
            "id": 1, "title": "a", "media": { "url": "https://img/1.png", "alt": "cat" }
        }))
        .unwrap();
        assert_eq!(
            object.media,
            Some(Media {
                url: "https://img/1.png".into(),
                alt: "cat".into()
            })
        );

        let bare: Post =
            serde_json::from_value(json!({ "id": 2, "title": "b", "media": "https://img/2.png" }))
                .unwrap();
        assert_eq!(bare.media, Some(Media::new("https://img/2.png")));

        for empty in [json!(null), json!(""), json!({ "url": "" }), json!({ "alt": "x" })] {
            let post: Post =
                serde_json::from_value(json!({ "id": 3, "title": "c", "media": empty })).unwrap();
            assert!(post.media.is_none());
        }
    }

    #[test]
    fn test_nullable_collections() {
        let post: Post = serde_json::from_value(json!({
            "id": 1, "title": "t", "tags": null, "_count": null, "comments": null
        }))
        .unwrap();
        assert!(post.tags.is_empty());
        assert_eq!(post.count, PostCounts::default());
        assert!(post.comments.is_empty());
    }

    #[test]
    fn test_full_post_envelope() {
        let envelope: Envelope<Vec<Post>> = serde_json::from_value(json!({
            "data": [{
                "id": 10,
                "title": "Hello",
                "body": "World",
                "tags": ["intro"],
                "created": "2024-01-01T00:00:00.000Z",
                "author": { "name": "alice", "email": "a@stud.noroff.no",
                            "avatar": { "url": "https://img/a.png", "alt": "" } },
                "_count": { "comments": 2, "reactions": 5 },
                "reactions": [{ "symbol": "👍", "count": 5, "reactors": ["bob"] }]
            }],
            "meta": { "isFirstPage": true, "isLastPage": false, "currentPage": 1,
                      "previousPage": null, "nextPage": 2, "pageCount": 4, "totalCount": 80 }
        }))
        .unwrap();

        let page = Page::from(envelope);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.meta.next_page, Some(2));
        let post = &page.items[0];
        assert_eq!(post.author.as_ref().unwrap().name, "alice");
        assert_eq!(post.count.reactions, 5);
        assert_eq!(post.reactions[0].reactors, vec!["bob".to_string()]);
    }

    #[test]
    fn test_profile_with_relations() {
        let profile: Profile = serde_json::from_value(json!({
            "name": "bob",
            "avatar": "https://img/b.png",
            "banner": null,
            "followers": [{ "name": "alice" }],
            "_count": { "followers": 1, "following": 0, "posts": 3 }
        }))
        .unwrap();
        assert_eq!(profile.avatar, Some(Media::new("https://img/b.png")));
        assert!(profile.banner.is_none());
        assert_eq!(profile.followers[0].name, "alice");
        assert_eq!(profile.count.posts, 3);
    }

    #[test]
    fn test_serialized_post_reads_back() {
        let post: Post = serde_json::from_value(json!({
            "id": 5, "title": "x", "media": "https://img/x.png"
        }))
        .unwrap();
        let again: Post = serde_json::from_value(serde_json::to_value(&post).unwrap()).unwrap();
        assert_eq!(again, post);
    }
}
