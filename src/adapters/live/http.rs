//! Live HTTP transport over `reqwest`'s blocking client.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use tracing::debug;

use crate::ports::http::{Headers, HttpRequest, HttpResponse, HttpTransport, TransportError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends requests to the real network.
pub struct LiveHttp {
    client: Client,
}

impl LiveHttp {
    /// Creates a live transport with a 30 second request timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Creates a live transport with the given request timeout.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder().timeout(timeout).build().unwrap_or_else(|_| Client::new());
        Self { client }
    }
}

impl Default for LiveHttp {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport for LiveHttp {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = Method::from_bytes(request.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|e| TransportError::InvalidRequest(format!("method {:?}: {e}", request.method)))?;
        let headers = to_header_map(&request.headers)?;

        debug!(method = %method, uri = %request.uri, "live request");
        let mut builder = self.client.request(method, &request.uri).headers(headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().map_err(|e| {
            if e.is_builder() {
                TransportError::InvalidRequest(e.to_string())
            } else {
                TransportError::Connection(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let headers = from_header_map(response.headers());
        let body = response.text().map_err(|e| TransportError::Connection(e.to_string()))?;
        Ok(HttpResponse { status, headers, body })
    }
}

fn to_header_map(headers: &Headers) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::InvalidRequest(format!("header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::InvalidRequest(format!("header {name}: {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

fn from_header_map(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        headers
            .entry(name.as_str().to_string())
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    headers
}
