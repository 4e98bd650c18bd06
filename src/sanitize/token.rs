//! Literal secret replacement across every textual part of an exchange.

use tracing::warn;

use super::Sanitizer;
use crate::ports::http::{Headers, HttpRequest, HttpResponse};

/// Replaces known secret values wherever they appear: URI, header values
/// and bodies.
///
/// Tokens are applied longest first so a secret that contains another is
/// redacted whole. Tokens that occur inside the replacement marker itself are
/// skipped; replacing them would keep rewriting the marker on every pass.
#[derive(Debug, Clone)]
pub struct TokenSanitizer {
    tokens: Vec<String>,
    replacement: String,
}

impl TokenSanitizer {
    /// Creates a sanitizer for `tokens`. Empty tokens are ignored.
    pub fn new(tokens: Vec<String>, replacement: impl Into<String>) -> Self {
        let replacement = replacement.into();
        let mut kept: Vec<String> = Vec::with_capacity(tokens.len());
        for token in tokens {
            if token.is_empty() || kept.contains(&token) {
                continue;
            }
            if replacement.contains(token.as_str()) {
                warn!(
                    len = token.len(),
                    "secret value occurs inside the redaction marker; not redacting it"
                );
                continue;
            }
            kept.push(token);
        }
        kept.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        Self { tokens: kept, replacement }
    }

    /// Number of tokens that will be redacted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if there is nothing to redact.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Replaces every token occurrence in `text`.
    #[must_use]
    pub fn scrub(&self, text: &str) -> String {
        let mut out = text.to_string();
        for token in &self.tokens {
            if out.contains(token.as_str()) {
                out = out.replace(token.as_str(), &self.replacement);
            }
        }
        out
    }

    fn scrub_headers(&self, headers: Headers) -> Headers {
        headers.into_iter().map(|(name, value)| (name, self.scrub(&value))).collect()
    }
}

impl Sanitizer for TokenSanitizer {
    fn before_record_request(&self, request: HttpRequest) -> HttpRequest {
        if self.tokens.is_empty() {
            return request;
        }
        HttpRequest {
            method: request.method,
            uri: self.scrub(&request.uri),
            headers: self.scrub_headers(request.headers),
            body: self.scrub(&request.body),
        }
    }

    fn before_record_response(&self, response: HttpResponse) -> HttpResponse {
        if self.tokens.is_empty() {
            return response;
        }
        HttpResponse {
            status: response.status,
            headers: self.scrub_headers(response.headers),
            body: self.scrub(&response.body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn replaces_in_uri_headers_and_bodies() {
        let s = TokenSanitizer::new(tokens(&["s3cr3t"]), "REDACTED");
        let req = s.before_record_request(
            HttpRequest::post("https://x.test/cb?key=s3cr3t", "pw=s3cr3t")
                .with_header("Authorization", "Bearer s3cr3t"),
        );
        assert_eq!(req.uri, "https://x.test/cb?key=REDACTED");
        assert_eq!(req.body, "pw=REDACTED");
        assert_eq!(req.headers["authorization"], "Bearer REDACTED");

        let resp = s.before_record_response(HttpResponse::new(200, "echo s3cr3t"));
        assert_eq!(resp.body, "echo REDACTED");
    }

    #[test]
    fn longer_tokens_win_over_their_prefixes() {
        let s = TokenSanitizer::new(tokens(&["abc", "abcdef"]), "X");
        assert_eq!(s.scrub("abcdef abc"), "X X");
    }

    #[test]
    fn tokens_inside_the_marker_are_skipped() {
        let s = TokenSanitizer::new(tokens(&["ACT", "hunter2"]), "REDACTED");
        assert_eq!(s.len(), 1);
        let once = s.scrub("ACT hunter2");
        assert_eq!(once, "ACT REDACTED");
        assert_eq!(s.scrub(&once), once);
    }

    #[test]
    fn empty_and_duplicate_tokens_are_dropped() {
        let s = TokenSanitizer::new(tokens(&["", "k", "k"]), "REDACTED");
        assert_eq!(s.len(), 1);
        assert!(TokenSanitizer::new(Vec::new(), "REDACTED").is_empty());
    }
}
