//! Replaying adapter for the `HttpTransport` port.

use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use crate::cassette::matcher::{Matcher, NoMatch};
use crate::ports::http::{HttpRequest, HttpResponse, HttpTransport, TransportError};

/// Answers requests from a cassette; never touches the network.
///
/// A request with no unconsumed counterpart gets [`TransportError::NoMatch`]
/// and is remembered, so the run can be failed afterwards even if the
/// component swallowed the error.
pub struct ReplayingHttp {
    matcher: Mutex<Matcher>,
    unmatched: Mutex<Vec<NoMatch>>,
}

impl ReplayingHttp {
    /// Creates a replaying transport over `matcher`.
    #[must_use]
    pub fn new(matcher: Matcher) -> Self {
        Self { matcher: Mutex::new(matcher), unmatched: Mutex::new(Vec::new()) }
    }

    /// Requests that found no recorded interaction, in call order.
    #[must_use]
    pub fn unmatched(&self) -> Vec<NoMatch> {
        self.unmatched.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of recorded interactions never served.
    #[must_use]
    pub fn unplayed(&self) -> usize {
        self.matcher.lock().unwrap_or_else(PoisonError::into_inner).unplayed().len()
    }
}

impl HttpTransport for ReplayingHttp {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let found = self.matcher.lock().unwrap_or_else(PoisonError::into_inner).find(request);
        match found {
            Ok(interaction) => {
                debug!(method = %request.method, uri = %request.uri, status = interaction.response.status, "replayed interaction");
                Ok(interaction.response)
            }
            Err(miss) => {
                warn!(method = %miss.method, path = %miss.path, "no recorded interaction for request");
                let err = TransportError::NoMatch { method: miss.method.clone(), path: miss.path.clone() };
                self.unmatched.lock().unwrap_or_else(PoisonError::into_inner).push(miss);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::format::Interaction;

    fn cassette() -> Vec<Interaction> {
        vec![Interaction::new(
            HttpRequest::get("https://api.example.com/v1/status"),
            HttpResponse::new(200, r#"{"status":"ok"}"#),
            "2025-01-01T12:00:00Z".parse().unwrap(),
        )]
    }

    #[test]
    fn serves_recorded_response() {
        let http = ReplayingHttp::new(Matcher::new(cassette(), Vec::new()));
        assert_eq!(http.unplayed(), 1);

        let resp = http.send(&HttpRequest::get("https://api.example.com/v1/status")).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, r#"{"status":"ok"}"#);
        assert_eq!(http.unplayed(), 0);
        assert!(http.unmatched().is_empty());
    }

    #[test]
    fn unknown_request_is_an_error_and_is_remembered() {
        let http = ReplayingHttp::new(Matcher::new(cassette(), Vec::new()));
        let err = http.send(&HttpRequest::get("https://api.example.com/v1/other")).unwrap_err();

        assert_eq!(err, TransportError::NoMatch { method: "GET".into(), path: "/v1/other".into() });
        assert_eq!(http.unmatched(), vec![NoMatch { method: "GET".into(), path: "/v1/other".into() }]);
        assert_eq!(http.unplayed(), 1);
    }
}
