//! Query string and path-segment encoding.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt::Display;

/// Characters left unescaped, matching `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a path segment or query value.
#[must_use]
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Builds `?key=value&...` suffixes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryBuilder {
    pairs: Vec<(String, String)>,
}

impl QueryBuilder {
    /// Empty query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `key=value`, encoding the value.
    #[must_use]
    pub fn param(mut self, key: &str, value: impl Display) -> Self {
        self.pairs
            .push((key.to_string(), encode_component(&value.to_string())));
        self
    }

    /// Append `key=value` when `value` is present and non-empty.
    #[must_use]
    pub fn param_opt(self, key: &str, value: Option<&str>) -> Self {
        match value.filter(|v| !v.is_empty()) {
            Some(v) => self.param(key, v),
            None => self,
        }
    }

    /// Append `key=true` when `enabled`.
    #[must_use]
    pub fn flag(self, key: &str, enabled: bool) -> Self {
        if enabled {
            self.param(key, true)
        } else {
            self
        }
    }

    /// Whether nothing was appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Render as a suffix: empty, or `?` followed by the joined pairs.
    #[must_use]
    pub fn build(&self) -> String {
        if self.pairs.is_empty() {
            return String::new();
        }
        let joined: Vec<String> = self.pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("?{}", joined.join("&"))
    }

    /// Append the rendered suffix to `path`.
    #[must_use]
    pub fn apply(&self, path: &str) -> String {
        format!("{path}{}", self.build())
    }
}
