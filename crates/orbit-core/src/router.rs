//! Client-side path router.
//!
//! The router matches the current location against an ordered list of route
//! patterns, dispatches to the first matching view and owns the history
//! integration: pushing entries on navigation, re-resolving on back/forward
//! and intercepting same-origin link clicks.

use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

/// Pattern matching errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    /// A path segment contained invalid percent-encoding.
    #[error("Malformed percent-encoding in path segment: {0}")]
    MalformedEncoding(String),
}

/// Parameters extracted from a matched path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(HashMap<String, String>);

impl Params {
    /// Create an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Number of bound parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no parameters were bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn insert(&mut self, name: &str, value: String) {
        self.0.insert(name.to_string(), value);
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A parsed route pattern such as `/posts/:id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parse a pattern. Empty segments are ignored, so `/profiles/` and
    /// `/profiles` are the same pattern.
    #[must_use]
    pub fn parse(pattern: &str) -> Self {
        let segments = split_segments(pattern)
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(segment.to_string()),
            })
            .collect();

        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    /// The pattern as registered.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match a path against this pattern.
    ///
    /// Returns `Ok(None)` when the segment count or a literal segment differs.
    /// Parameter segments accept any non-empty segment and bind its decoded
    /// value; no type validation happens here.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern matches structurally but a segment
    /// bound to a parameter is not valid percent-encoded UTF-8.
    pub fn matches(&self, path: &str) -> Result<Option<Params>, PatternError> {
        let path_segments: Vec<&str> = split_segments(path).collect();
        if path_segments.len() != self.segments.len() {
            return Ok(None);
        }

        let literals_match = self
            .segments
            .iter()
            .zip(&path_segments)
            .all(|(segment, part)| match segment {
                Segment::Literal(literal) => literal == part,
                Segment::Param(_) => true,
            });
        if !literals_match {
            return Ok(None);
        }

        let mut params = Params::new();
        for (segment, part) in self.segments.iter().zip(&path_segments) {
            if let Segment::Param(name) = segment {
                params.insert(name, decode_segment(part)?);
            }
        }
        Ok(Some(params))
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Strip the query string and fragment from a location.
fn pathname(location: &str) -> &str {
    let end = location.find(|c| c == '?' || c == '#').unwrap_or(location.len());
    &location[..end]
}

/// Percent-decode one path segment, rejecting `%` escapes that are not
/// followed by two hex digits and byte sequences that are not UTF-8.
pub fn decode_segment(segment: &str) -> Result<String, PatternError> {
    let bytes = segment.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'%' {
            let escaped = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !escaped {
                return Err(PatternError::MalformedEncoding(segment.to_string()));
            }
        }
    }

    percent_decode_str(segment)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|_| PatternError::MalformedEncoding(segment.to_string()))
}

/// A handle identifying one navigation.
///
/// Every resolution advances the router's generation. Async work started by
/// a view should hold on to its token and drop its result once
/// [`NavigationToken::is_current`] turns false.
#[derive(Debug, Clone)]
pub struct NavigationToken {
    generation: u64,
    latest: Arc<AtomicU64>,
}

impl NavigationToken {
    /// Generation this token was issued for.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether no newer navigation has happened since this token was issued.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.generation
    }

    /// Pass `value` through only while this navigation is still current.
    #[must_use]
    pub fn guard<T>(&self, value: T) -> Option<T> {
        if self.is_current() {
            Some(value)
        } else {
            trace!(generation = self.generation, "Discarding stale navigation result");
            None
        }
    }
}

/// Everything a view receives when dispatched.
#[derive(Debug, Clone)]
pub struct RouteContext {
    /// The location that was resolved, without query or fragment.
    pub path: String,
    /// The matched pattern, `None` for the not-found view.
    pub pattern: Option<String>,
    /// Bound parameters.
    pub params: Params,
    /// Token for this navigation.
    pub token: NavigationToken,
}

/// A view callback.
pub type View = Box<dyn Fn(&RouteContext) + Send + Sync>;

/// A registered route.
pub struct Route {
    pattern: RoutePattern,
    view: View,
}

impl Route {
    /// Create a route from a pattern and a view.
    pub fn new(pattern: &str, view: impl Fn(&RouteContext) + Send + Sync + 'static) -> Self {
        Self {
            pattern: RoutePattern::parse(pattern),
            view: Box::new(view),
        }
    }

    /// The route's pattern.
    #[must_use]
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route").field("pattern", &self.pattern.raw).finish()
    }
}

/// Outcome of a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A route matched and its view ran.
    Matched {
        /// The matched pattern.
        pattern: String,
        /// Bound parameters.
        params: Params,
    },
    /// Nothing matched and the not-found view ran.
    NotFound,
}

/// Session history the router reads and pushes to.
pub trait History: Send {
    /// The current location (path, optionally with query and fragment).
    fn current_path(&self) -> String;

    /// Push a new entry and make it current. Forward entries are discarded.
    fn push(&mut self, path: &str);

    /// Step back one entry. Returns `false` at the first entry.
    fn back(&mut self) -> bool;

    /// Step forward one entry. Returns `false` at the last entry.
    fn forward(&mut self) -> bool;
}

/// In-memory history with browser-like push/back/forward semantics.
#[derive(Debug, Clone)]
pub struct MemoryHistory {
    entries: Vec<String>,
    cursor: usize,
}

impl MemoryHistory {
    /// Create a history whose only entry is `initial`.
    #[must_use]
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            entries: vec![initial.into()],
            cursor: 0,
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; a history has at least one entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new("/")
    }
}

impl History for MemoryHistory {
    fn current_path(&self) -> String {
        self.entries.get(self.cursor).cloned().unwrap_or_default()
    }

    fn push(&mut self, path: &str) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push(path.to_string());
        self.cursor = self.entries.len() - 1;
    }

    fn back(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    fn forward(&mut self) -> bool {
        if self.cursor + 1 >= self.entries.len() {
            return false;
        }
        self.cursor += 1;
        true
    }
}

/// A click that reached the document, described by its nearest anchor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkClick {
    /// `href` attribute of the nearest anchor ancestor, if there is an anchor.
    pub href: Option<String>,
    /// `target` attribute of that anchor.
    pub target: Option<String>,
    /// Mouse button; 0 is the primary button.
    pub button: u16,
    /// Whether a ctrl/meta/shift/alt key was held.
    pub modifier_key: bool,
}

impl LinkClick {
    /// A plain primary-button click on an anchor with the given `href`.
    #[must_use]
    pub fn anchor(href: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
            ..Self::default()
        }
    }

    /// Set the anchor's `target` attribute.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Mark the click as made with a modifier key held.
    #[must_use]
    pub fn with_modifier(mut self) -> Self {
        self.modifier_key = true;
        self
    }

    /// The in-app path this click should be routed to, if any.
    ///
    /// Only same-origin absolute paths qualify; protocol-relative `//host`
    /// links, links with a `target` and new-tab clicks are left alone.
    #[must_use]
    pub fn internal_path(&self) -> Option<&str> {
        let href = self.href.as_deref()?;
        let same_origin = href.starts_with('/') && !href.starts_with("//");
        let same_tab = self.target.as_deref().map_or(true, str::is_empty)
            && self.button == 0
            && !self.modifier_key;
        (same_origin && same_tab).then_some(href)
    }
}

/// The path router.
pub struct Router<H: History = MemoryHistory> {
    routes: Vec<Route>,
    not_found: View,
    history: H,
    generation: Arc<AtomicU64>,
}

impl<H: History> Router<H> {
    /// Create a router over `history` with the given not-found view.
    pub fn new(history: H, not_found: impl Fn(&RouteContext) + Send + Sync + 'static) -> Self {
        Self {
            routes: Vec::new(),
            not_found: Box::new(not_found),
            history,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Append routes. Earlier registrations take precedence.
    pub fn register(&mut self, routes: impl IntoIterator<Item = Route>) {
        self.routes.extend(routes);
    }

    /// Builder-style single route registration.
    #[must_use]
    pub fn route(
        mut self,
        pattern: &str,
        view: impl Fn(&RouteContext) + Send + Sync + 'static,
    ) -> Self {
        self.routes.push(Route::new(pattern, view));
        self
    }

    /// Registered routes, in precedence order.
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// The router's history.
    #[must_use]
    pub fn history(&self) -> &H {
        &self.history
    }

    /// Token for the most recent navigation.
    #[must_use]
    pub fn current_token(&self) -> NavigationToken {
        NavigationToken {
            generation: self.generation.load(Ordering::SeqCst),
            latest: Arc::clone(&self.generation),
        }
    }

    /// Resolve the current location and dispatch exactly one view.
    pub fn resolve(&self) -> Resolution {
        let location = self.history.current_path();
        let path = pathname(&location);

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = NavigationToken {
            generation,
            latest: Arc::clone(&self.generation),
        };

        for route in &self.routes {
            match route.pattern.matches(path) {
                Ok(Some(params)) => {
                    debug!(path = %path, pattern = %route.pattern, generation, "Route matched");
                    let context = RouteContext {
                        path: path.to_string(),
                        pattern: Some(route.pattern.raw.clone()),
                        params: params.clone(),
                        token,
                    };
                    (route.view)(&context);
                    return Resolution::Matched {
                        pattern: route.pattern.raw.clone(),
                        params,
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(path = %path, pattern = %route.pattern, error = %e, "Route rejected");
                }
            }
        }

        debug!(path = %path, generation, "No route matched");
        let context = RouteContext {
            path: path.to_string(),
            pattern: None,
            params: Params::new(),
            token,
        };
        (self.not_found)(&context);
        Resolution::NotFound
    }

    /// Push `path` onto the history and resolve it.
    pub fn navigate(&mut self, path: &str) -> Resolution {
        self.history.push(path);
        self.resolve()
    }

    /// Route a document click. Returns `true` when the click was handled and
    /// the default navigation should be suppressed.
    pub fn handle_click(&mut self, click: &LinkClick) -> bool {
        match click.internal_path() {
            Some(path) => {
                let path = path.to_string();
                self.navigate(&path);
                true
            }
            None => false,
        }
    }

    /// React to a back/forward signal by resolving the now-current entry.
    pub fn handle_pop_state(&self) -> Resolution {
        self.resolve()
    }

    /// Go back one history entry, if possible, and resolve.
    pub fn back(&mut self) -> Option<Resolution> {
        self.history.back().then(|| self.handle_pop_state())
    }

    /// Go forward one history entry, if possible, and resolve.
    pub fn forward(&mut self) -> Option<Resolution> {
        self.history.forward().then(|| self.handle_pop_state())
    }
}

impl<H: History + fmt::Debug> fmt::Debug for Router<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .field("history", &self.history)
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish()
    }
}
