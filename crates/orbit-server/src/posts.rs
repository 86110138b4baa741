//! In-memory demo posts for local testing without the remote API.
//!
//! Mutations are announced to every relay socket as `post:created` /
//! `post:deleted` events.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use orbit_protocol::events;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::handlers::AppState;
use crate::metrics;

/// A demo post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoPost {
    pub id: u64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub created_at: String,
}

/// Newest-first post list.
#[derive(Debug)]
pub struct PostStore {
    posts: RwLock<Vec<DemoPost>>,
    next_id: AtomicU64,
}

impl Default for PostStore {
    fn default() -> Self {
        Self {
            posts: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl PostStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All posts, newest first.
    pub async fn list(&self) -> Vec<DemoPost> {
        self.posts.read().await.clone()
    }

    /// Insert a post at the front.
    pub async fn create(&self, title: String, body: Option<String>) -> DemoPost {
        let post = DemoPost {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            title,
            body,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        self.posts.write().await.insert(0, post.clone());
        post
    }

    /// Remove a post. Returns whether it existed.
    pub async fn delete(&self, id: u64) -> bool {
        let mut posts = self.posts.write().await;
        match posts.iter().position(|p| p.id == id) {
            Some(index) => {
                posts.remove(index);
                true
            }
            None => false,
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// `GET /api/posts`
pub async fn list_posts(State(state): State<Arc<AppState>>) -> Json<Vec<DemoPost>> {
    Json(state.posts.list().await)
}

/// `POST /api/posts`
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Response {
    let payload = payload.map(|Json(v)| v).unwrap_or(Value::Null);
    let title = match payload.get("title").and_then(Value::as_str) {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => return error_response(StatusCode::BAD_REQUEST, "title is required"),
    };
    let body = payload
        .get("body")
        .and_then(Value::as_str)
        .map(str::to_string);

    let post = state.posts.create(title, body).await;
    metrics::record_post_mutation("created");
    info!(id = post.id, title = %post.title, "Demo post created");

    let data = serde_json::to_value(&post).unwrap_or(Value::Null);
    let recipients = state.hub.publish(events::POST_CREATED, data);
    metrics::record_relayed(events::POST_CREATED, recipients);

    (StatusCode::CREATED, Json(post)).into_response()
}

/// `DELETE /api/posts/:id`
pub async fn delete_post(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let Ok(id) = id.parse::<u64>() else {
        debug!(id = %id, "Non-numeric post id");
        return error_response(StatusCode::NOT_FOUND, "Not found");
    };
    if !state.posts.delete(id).await {
        return error_response(StatusCode::NOT_FOUND, "Not found");
    }
    metrics::record_post_mutation("deleted");
    info!(id, "Demo post deleted");

    let data = serde_json::to_value(events::PostDeleted { id }).unwrap_or(Value::Null);
    let recipients = state.hub.publish(events::POST_DELETED, data);
    metrics::record_relayed(events::POST_DELETED, recipients);

    StatusCode::NO_CONTENT.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_newest_first() {
        let store = PostStore::new();
        let first = store.create("first".into(), None).await;
        let second = store.create("second".into(), Some("body".into())).await;

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        let titles: Vec<_> = store.list().await.into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn test_store_delete() {
        let store = PostStore::new();
        let post = store.create("gone".into(), None).await;
        assert!(store.delete(post.id).await);
        assert!(!store.delete(post.id).await);
        assert!(store.list().await.is_empty());
    }

    #[test]
    fn test_post_json_shape() {
        let post = DemoPost {
            id: 3,
            title: "t".into(),
            body: None,
            created_at: "2024-01-01T00:00:00.000Z".into(),
        };
        assert_eq!(
            serde_json::to_value(&post).unwrap(),
            json!({ "id": 3, "title": "t", "createdAt": "2024-01-01T00:00:00.000Z" })
        );
    }
}
