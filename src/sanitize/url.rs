//! URI and URL-shaped redactions.

use std::borrow::Cow;

use regex::{Captures, Regex};

use super::Sanitizer;
use crate::error::HarnessError;
use crate::ports::http::{HttpRequest, HttpResponse};

/// Rewrites the request URI with user-supplied regex substitutions.
///
/// Replacements may reference capture groups as `$1` or `${name}`.
#[derive(Debug, Clone)]
pub struct UrlPatternSanitizer {
    patterns: Vec<(Regex, String)>,
}

impl UrlPatternSanitizer {
    /// Compiles `(pattern, replacement)` pairs, applied in order.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidPattern`] for the first pattern that
    /// does not compile.
    pub fn new<I, P, R>(patterns: I) -> Result<Self, HarnessError>
    where
        I: IntoIterator<Item = (P, R)>,
        P: AsRef<str>,
        R: Into<String>,
    {
        let patterns = patterns
            .into_iter()
            .map(|(pattern, replacement)| {
                let pattern = pattern.as_ref();
                Regex::new(pattern)
                    .map(|re| (re, replacement.into()))
                    .map_err(|e| HarnessError::pattern("url", pattern, &e))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { patterns })
    }
}

impl Sanitizer for UrlPatternSanitizer {
    fn before_record_request(&self, mut request: HttpRequest) -> HttpRequest {
        for (re, replacement) in &self.patterns {
            if let Cow::Owned(uri) = re.replace_all(&request.uri, replacement.as_str()) {
                request.uri = uri;
            }
        }
        request
    }
}

/// Redacts the values of named `key=value` parameters.
///
/// Applies to the request URI, form-encoded request bodies and response
/// bodies, wherever the parameter follows `?`, `&`, `;`, a quote, whitespace
/// or the start of the text.
#[derive(Debug, Clone)]
pub struct QueryParameterSanitizer {
    pattern: Option<Regex>,
    replacement: String,
}

impl QueryParameterSanitizer {
    /// Default marker, matching what OAuth-style fixtures expect to see.
    pub const DEFAULT_REPLACEMENT: &'static str = "token";

    /// Builds a sanitizer for the given parameter names.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidPattern`] if the combined pattern does
    /// not compile.
    pub fn new<S: AsRef<str>>(params: &[S], replacement: impl Into<String>) -> Result<Self, HarnessError> {
        let names: Vec<String> = params
            .iter()
            .map(AsRef::as_ref)
            .filter(|p| !p.is_empty())
            .map(regex::escape)
            .collect();
        let pattern = if names.is_empty() {
            None
        } else {
            let source = format!(r#"(^|[?&;\s"])((?:{})=)[^&;#"\s]+"#, names.join("|"));
            Some(Regex::new(&source).map_err(|e| HarnessError::pattern("query parameter", &source, &e))?)
        };
        Ok(Self { pattern, replacement: replacement.into() })
    }

    /// Replaces every matching parameter value in `text`.
    #[must_use]
    pub fn scrub(&self, text: &str) -> String {
        let Some(re) = &self.pattern else {
            return text.to_string();
        };
        re.replace_all(text, |caps: &Captures<'_>| format!("{}{}{}", &caps[1], &caps[2], self.replacement))
            .into_owned()
    }
}

impl Sanitizer for QueryParameterSanitizer {
    fn before_record_request(&self, mut request: HttpRequest) -> HttpRequest {
        request.uri = self.scrub(&request.uri);
        request.body = self.scrub(&request.body);
        request
    }

    fn before_record_response(&self, mut response: HttpResponse) -> HttpResponse {
        response.body = self.scrub(&response.body);
        response
    }
}

/// Strips per-request parameters from URLs embedded in response bodies.
///
/// Signed download links and pagination cursors change on every live call;
/// removing them keeps recordings stable. Only URLs whose text contains one
/// of `domains` are rewritten; with no domains, every URL is.
#[derive(Debug, Clone)]
pub struct ResponseUrlSanitizer {
    params: Vec<String>,
    domains: Vec<String>,
    url: Regex,
}

impl ResponseUrlSanitizer {
    /// Builds a sanitizer removing `params` from URLs on `domains`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidPattern`] if the URL pattern fails to
    /// compile.
    pub fn new<P, D>(params: P, domains: D) -> Result<Self, HarnessError>
    where
        P: IntoIterator,
        P::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        let source = r#"https?://[^\s"'<>\\]+"#;
        let url = Regex::new(source).map_err(|e| HarnessError::pattern("response url", source, &e))?;
        Ok(Self {
            params: params.into_iter().map(Into::into).collect(),
            domains: domains.into_iter().map(Into::into).collect(),
            url,
        })
    }

    /// Rewrites every qualifying URL in `text`.
    #[must_use]
    pub fn scrub(&self, text: &str) -> String {
        if self.params.is_empty() {
            return text.to_string();
        }
        self.url.replace_all(text, |caps: &Captures<'_>| self.strip(&caps[0])).into_owned()
    }

    fn strip(&self, url: &str) -> String {
        if !self.domains.is_empty() && !self.domains.iter().any(|d| url.contains(d.as_str())) {
            return url.to_string();
        }
        let Some((base, rest)) = url.split_once('?') else {
            return url.to_string();
        };
        let (query, fragment) = match rest.split_once('#') {
            Some((q, f)) => (q, Some(f)),
            None => (rest, None),
        };
        let kept: Vec<&str> = query
            .split('&')
            .filter(|pair| {
                let name = pair.split_once('=').map_or(*pair, |(n, _)| n);
                !pair.is_empty() && !self.params.iter().any(|p| p == name)
            })
            .collect();

        let mut out = base.to_string();
        if !kept.is_empty() {
            out.push('?');
            out.push_str(&kept.join("&"));
        }
        if let Some(fragment) = fragment {
            out.push('#');
            out.push_str(fragment);
        }
        out
    }
}

impl Sanitizer for ResponseUrlSanitizer {
    fn before_record_response(&self, mut response: HttpResponse) -> HttpResponse {
        response.body = self.scrub(&response.body);
        response
    }
}
