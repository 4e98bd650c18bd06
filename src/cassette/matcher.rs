//! Selects the stored interaction that answers an outbound replay request.
//!
//! Requests are reduced to a [`MatchKey`]. The first unconsumed interaction
//! with an equal key wins and is marked consumed, so repeated identical calls
//! are answered in recording order, one interaction per call.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use reqwest::Url;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::format::Interaction;
use crate::error::HarnessError;
use crate::ports::http::HttpRequest;
use crate::sanitize::Sanitizer;

/// Body marker used for endpoints whose body is declared non-deterministic.
pub const BODY_IGNORED: &str = "<body-ignored>";

/// Identity of a request for matching purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchKey {
    /// Uppercase HTTP method.
    pub method: String,
    /// Lowercase `host[:port]`; empty for relative URIs.
    pub authority: String,
    /// Normalized path.
    pub path: String,
    /// Decoded query pairs sorted by name, then value.
    pub query: Vec<(String, String)>,
    /// `sha256:<hex>` of the body, or [`BODY_IGNORED`].
    pub body: String,
}

impl MatchKey {
    /// Path plus sorted query, as shown in diagnostics.
    #[must_use]
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query: Vec<String> = self.query.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("{}?{}", self.path, query.join("&"))
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}{} [{}]", self.method, self.authority, self.path_and_query(), self.body)
    }
}

/// An endpoint whose request body does not take part in matching.
#[derive(Debug, Clone)]
pub struct EndpointRule {
    method: Option<String>,
    path: Regex,
}

impl EndpointRule {
    /// Declares an endpoint by optional method and a path regex.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidPattern`] if `path_pattern` does not compile.
    pub fn new(method: Option<&str>, path_pattern: &str) -> Result<Self, HarnessError> {
        let path = Regex::new(path_pattern)
            .map_err(|e| HarnessError::pattern("body_ignored path", path_pattern, &e))?;
        Ok(Self { method: method.map(str::to_ascii_uppercase), path })
    }

    fn applies_to(&self, method: &str, path: &str) -> bool {
        self.method.as_deref().map_or(true, |m| m == method) && self.path.is_match(path)
    }
}

/// Serialized form of an [`EndpointRule`], as written in fixture settings.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EndpointRuleSpec {
    /// Method to restrict the rule to; any method when absent.
    #[serde(default)]
    pub method: Option<String>,
    /// Regex matched against the normalized request path.
    pub path: String,
}

impl EndpointRuleSpec {
    /// Compiles the rule.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidPattern`] for a bad regex.
    pub fn compile(&self) -> Result<EndpointRule, HarnessError> {
        EndpointRule::new(self.method.as_deref(), &self.path)
    }
}

/// Returned by [`Matcher::find`] when nothing answers a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoMatch {
    /// Request method.
    pub method: String,
    /// Request path and query.
    pub path: String,
}

impl From<NoMatch> for HarnessError {
    fn from(value: NoMatch) -> Self {
        Self::NoMatchingInteraction { method: value.method, path: value.path, captured: None }
    }
}

struct Entry {
    key: MatchKey,
    interaction: Interaction,
    consumed: bool,
}

/// Play-in-order matcher over a loaded cassette.
pub struct Matcher {
    entries: Vec<Entry>,
    body_ignored: Vec<EndpointRule>,
    request_normalizer: Option<Arc<dyn Sanitizer>>,
}

impl Matcher {
    /// Indexes `interactions`, treating bodies of `body_ignored` endpoints as irrelevant.
    #[must_use]
    pub fn new(interactions: Vec<Interaction>, body_ignored: Vec<EndpointRule>) -> Self {
        let entries = interactions
            .into_iter()
            .map(|interaction| Entry {
                key: compute_key(&interaction.request, &body_ignored),
                interaction,
                consumed: false,
            })
            .collect();
        Self { entries, body_ignored, request_normalizer: None }
    }

    /// Applies the request side of `sanitizer` to a copy of each outbound
    /// request before keying it, so live-only values line up with their
    /// sanitized recordings.
    #[must_use]
    pub fn with_request_normalizer(mut self, sanitizer: Arc<dyn Sanitizer>) -> Self {
        self.request_normalizer = Some(sanitizer);
        self
    }

    /// Computes the key an outbound request will be matched with.
    #[must_use]
    pub fn key_for(&self, request: &HttpRequest) -> MatchKey {
        match &self.request_normalizer {
            Some(sanitizer) => {
                let normalized = sanitizer.before_record_request(request.clone());
                compute_key(&normalized, &self.body_ignored)
            }
            None => compute_key(request, &self.body_ignored),
        }
    }

    /// Returns the first unconsumed interaction whose key equals the
    /// request's, marking it consumed.
    ///
    /// # Errors
    ///
    /// Returns [`NoMatch`] with the request's method and path if every
    /// matching interaction is consumed or none exists.
    pub fn find(&mut self, request: &HttpRequest) -> Result<Interaction, NoMatch> {
        let key = self.key_for(request);
        let Some(entry) = self.entries.iter_mut().find(|e| !e.consumed && e.key == key) else {
            return Err(NoMatch { method: key.method.clone(), path: key.path_and_query() });
        };
        entry.consumed = true;
        debug!(key = %key, "matched recorded interaction");
        Ok(entry.interaction.clone())
    }

    /// Interactions that have not been served yet, in recording order.
    #[must_use]
    pub fn unplayed(&self) -> Vec<&Interaction> {
        self.entries.iter().filter(|e| !e.consumed).map(|e| &e.interaction).collect()
    }

    /// Total number of indexed interactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cassette was empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn compute_key(request: &HttpRequest, body_ignored: &[EndpointRule]) -> MatchKey {
    let method = request.method.trim().to_ascii_uppercase();
    let (authority, raw_path, mut query) = split_uri(&request.uri);
    let path = normalize_path(&raw_path);
    query.sort();

    let body = if body_ignored.iter().any(|rule| rule.applies_to(&method, &path)) {
        BODY_IGNORED.to_string()
    } else {
        format!("sha256:{}", hex::encode(Sha256::digest(request.body.as_bytes())))
    };

    MatchKey { method, authority, path, query, body }
}

fn split_uri(uri: &str) -> (String, String, Vec<(String, String)>) {
    let (url, relative) = match Url::parse(uri) {
        Ok(url) => (Some(url), false),
        Err(_) => (Url::parse("http://relative.invalid/").ok().and_then(|b| b.join(uri).ok()), true),
    };
    let Some(url) = url else {
        return (String::new(), uri.to_string(), Vec::new());
    };

    let authority = if relative {
        String::new()
    } else {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host,
        }
    };
    let query = url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
    (authority, url.path().to_string(), query)
}

fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}
