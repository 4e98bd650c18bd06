//! Header allow-listing.

use std::collections::BTreeSet;

use super::{Sanitizer, DEFAULT_SAFE_HEADERS};
use crate::ports::http::{Headers, HttpRequest, HttpResponse};

/// Headers that rarely carry credentials, for fixtures that want a looser
/// allow-list than the default.
pub const COMMON_SAFE_HEADERS: &[&str] = &[
    "content-type",
    "content-length",
    "accept",
    "accept-encoding",
    "accept-language",
    "cache-control",
    "connection",
    "host",
    "user-agent",
    "date",
    "server",
    "transfer-encoding",
    "vary",
    "x-request-id",
    "x-correlation-id",
];

/// Drops every header not on the allow-list, on both requests and responses.
///
/// Names are compared case-insensitively. A header that is both allowed and
/// listed in `remove` is removed.
#[derive(Debug, Clone)]
pub struct HeaderSanitizer {
    safe: BTreeSet<String>,
    remove: BTreeSet<String>,
}

impl Default for HeaderSanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_SAFE_HEADERS.iter().copied())
    }
}

impl HeaderSanitizer {
    /// Keeps only the named headers.
    pub fn new<I, S>(safe: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self { safe: lowercase_set(safe), remove: BTreeSet::new() }
    }

    /// Allow-list built from [`COMMON_SAFE_HEADERS`].
    #[must_use]
    pub fn common() -> Self {
        Self::new(COMMON_SAFE_HEADERS.iter().copied())
    }

    /// Extends the allow-list.
    #[must_use]
    pub fn allow<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.safe.extend(lowercase_set(extra));
        self
    }

    /// Forces removal of the named headers even if allowed.
    #[must_use]
    pub fn remove<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.remove.extend(lowercase_set(names));
        self
    }

    fn filter(&self, headers: Headers) -> Headers {
        headers
            .into_iter()
            .filter_map(|(name, value)| {
                let lower = name.to_ascii_lowercase();
                (self.safe.contains(&lower) && !self.remove.contains(&lower)).then_some((lower, value))
            })
            .collect()
    }
}

impl Sanitizer for HeaderSanitizer {
    fn before_record_request(&self, mut request: HttpRequest) -> HttpRequest {
        request.headers = self.filter(request.headers);
        request
    }

    fn before_record_response(&self, mut response: HttpResponse) -> HttpResponse {
        response.headers = self.filter(response.headers);
        response
    }
}

fn lowercase_set<I, S>(names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names.into_iter().map(|n| n.as_ref().trim().to_ascii_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_keeps_only_content_headers() {
        let s = HeaderSanitizer::default();
        let req = s.before_record_request(
            HttpRequest::get("https://x.test")
                .with_header("Content-Type", "application/json")
                .with_header("Accept", "*/*")
                .with_header("Authorization", "Bearer t")
                .with_header("X-Api-Key", "k"),
        );
        let names: Vec<&str> = req.headers.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["accept", "content-type"]);
    }

    #[test]
    fn allow_and_remove_adjust_the_list() {
        let s = HeaderSanitizer::common().allow(["X-Trace"]).remove(["server"]);
        let resp = s.before_record_response(
            HttpResponse::new(200, "")
                .with_header("x-trace", "1")
                .with_header("server", "nginx")
                .with_header("set-cookie", "a=b")
                .with_header("date", "today"),
        );
        let names: Vec<&str> = resp.headers.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["date", "x-trace"]);
    }
}
