//! Client error types.

use serde_json::Value;
use thiserror::Error;

use crate::store::StoreError;

/// An error response from the remote API.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ApiError {
    /// Human-readable message extracted from the response.
    pub message: String,
    /// HTTP status code.
    pub status: u16,
    /// Parsed response body, or an empty object if it was not JSON.
    pub details: Value,
}

impl ApiError {
    /// Build an error from a failed response's status and parsed body.
    ///
    /// The message comes from `errors[0].message`, then `message`, then a
    /// generic text naming the status. Empty strings are skipped.
    #[must_use]
    pub fn from_response(status: u16, details: Value) -> Self {
        let listed = details
            .pointer("/errors/0/message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty());
        let top_level = details
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty());

        let message = listed
            .or(top_level)
            .map(str::to_string)
            .unwrap_or_else(|| format!("An API error occurred (status {status})"));

        Self {
            message,
            status,
            details,
        }
    }
}

/// Errors returned by the HTTP client and the services built on it.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The API answered with a non-success status.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The request did not complete.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A request or response body was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A caller-supplied header was not valid.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// A success response had no body where one was required.
    #[error("Empty response from {0}")]
    EmptyResponse(String),

    /// Reading or writing the auth store failed.
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl ClientError {
    /// HTTP status, if this is an API error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.as_api().map(|e| e.status)
    }

    /// The API error, if this is one.
    #[must_use]
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            ClientError::Api(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_from_error_list() {
        let err = ApiError::from_response(
            400,
            json!({ "errors": [{ "message": "Title is required" }], "message": "Bad" }),
        );
        assert_eq!(err.message, "Title is required");
        assert_eq!(err.status, 400);
    }

    #[test]
    fn test_message_falls_back_to_message_field() {
        let err = ApiError::from_response(401, json!({ "errors": [], "message": "No token" }));
        assert_eq!(err.message, "No token");

        let err = ApiError::from_response(401, json!({ "errors": [{ "message": "" }], "message": "x" }));
        assert_eq!(err.message, "x");
    }

    #[test]
    fn test_message_generic_fallback() {
        let err = ApiError::from_response(503, json!({}));
        assert_eq!(err.message, "An API error occurred (status 503)");
        assert_eq!(err.to_string(), err.message);
    }

    #[test]
    fn test_client_error_status() {
        let err = ClientError::from(ApiError::from_response(404, json!({})));
        assert_eq!(err.status(), Some(404));
        assert!(ClientError::InvalidHeader("x".into()).status().is_none());
    }
}
