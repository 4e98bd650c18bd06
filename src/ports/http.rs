//! HTTP transport port: the component's only path to the network.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Header map with lowercase names, kept sorted for stable serialization.
pub type Headers = BTreeMap<String, String>;

/// An outbound HTTP request as issued by the component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    /// HTTP method, e.g. `GET`.
    pub method: String,
    /// Absolute request URI including query string.
    pub uri: String,
    /// Request headers.
    #[serde(default)]
    pub headers: Headers,
    /// Request body; empty when the request has none.
    #[serde(default)]
    pub body: String,
}

impl HttpRequest {
    /// Creates a request with no headers and an empty body.
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self { method: method.into(), uri: uri.into(), headers: Headers::new(), body: String::new() }
    }

    /// Shorthand for a `GET` request.
    pub fn get(uri: impl Into<String>) -> Self {
        Self::new("GET", uri)
    }

    /// Shorthand for a `POST` request with the given body.
    pub fn post(uri: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new("POST", uri).with_body(body)
    }

    /// Adds a header; the name is stored lowercase.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Replaces the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }
}

/// An HTTP response delivered to the component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response headers.
    #[serde(default)]
    pub headers: Headers,
    /// Response body.
    #[serde(default)]
    pub body: String,
}

impl HttpResponse {
    /// Creates a response with no headers.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, headers: Headers::new(), body: body.into() }
    }

    /// Creates a JSON response with a `content-type` header.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string()).with_header("content-type", "application/json")
    }

    /// Adds a header; the name is stored lowercase.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON.
    pub fn body_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Failure returned to the component by a transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The live request could not be completed.
    #[error("request failed: {0}")]
    Connection(String),
    /// The request could not be built (bad URI, bad header).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Replay found no stored interaction for this request.
    #[error("no recorded interaction matches {method} {path}")]
    NoMatch {
        /// Request method.
        method: String,
        /// Request path and query.
        path: String,
    },
}

/// Sends HTTP requests on behalf of the component.
///
/// Live, recording and replaying implementations are swapped in by
/// `RunCapture`; the component never knows which one it holds.
pub trait HttpTransport: Send + Sync {
    /// Sends one request and waits for the full response.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the exchange cannot be completed.
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for Box<T> {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: HttpTransport + ?Sized> HttpTransport for std::sync::Arc<T> {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request)
    }
}
