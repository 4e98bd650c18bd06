//! Per-fixture harness settings read from `harness.yaml`.
//!
//! Every key is optional. A fixture with no settings file records and
//! replays with the default sanitizer pipeline, strict matching and the
//! default frozen instant.
//!
//! ```yaml
//! freeze_time: "2024-03-01T08:00:00Z"   # or `auto` / `live`
//! strict: true
//! body_ignored:
//!   - { method: POST, path: "^/v1/batch$" }
//! ignored_loggers: [urllib3]
//! normalizers:
//!   - { pattern: "job-[0-9a-f]{8}", replacement: "<JOB>" }
//! sanitizers:
//!   additional_safe_headers: [x-ratelimit-remaining]
//!   sensitive_fields: [api_key]
//!   query_parameters: [sig]
//!   url_patterns:
//!     - { pattern: "/accounts/\\d+", replacement: "/accounts/ACCOUNT" }
//! ```

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::capture::FreezeTime;
use crate::cassette::matcher::{EndpointRule, EndpointRuleSpec};
use crate::compare::Normalizer;
use crate::error::HarnessError;
use crate::sanitize::{
    BodyFieldSanitizer, HeaderSanitizer, QueryParameterSanitizer, SanitizationPipeline, TokenSanitizer,
    UrlPatternSanitizer, DEFAULT_SAFE_HEADERS, DEFAULT_SENSITIVE_FIELDS, REDACTED,
};

/// Parsed `harness.yaml`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessSettings {
    /// `auto`, `live`, or an RFC 3339 instant.
    pub freeze_time: Option<String>,
    /// Fail replay on unmatched requests. Defaults to `true`.
    pub strict: Option<bool>,
    /// Endpoints whose request body does not take part in matching.
    pub body_ignored: Vec<EndpointRuleSpec>,
    /// Extra logger namespaces excluded from log capture.
    pub ignored_loggers: Vec<String>,
    /// Extra log normalizers, applied after the built-ins.
    pub normalizers: Vec<PatternSpec>,
    /// Sanitizer pipeline adjustments.
    pub sanitizers: SanitizerSettings,
}

/// A `pattern` + `replacement` pair.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PatternSpec {
    /// Regular expression.
    pub pattern: String,
    /// Substitution text; may reference capture groups as `$1`.
    pub replacement: String,
}

/// Adjustments to the default sanitizer pipeline.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct SanitizerSettings {
    /// Replaces the default header allow-list entirely.
    pub safe_headers: Option<Vec<String>>,
    /// Added to the allow-list.
    pub additional_safe_headers: Vec<String>,
    /// Headers always dropped, even if allowed.
    pub remove_headers: Vec<String>,
    /// Added to the default sensitive JSON/form field names.
    pub sensitive_fields: Vec<String>,
    /// Query parameters whose values are redacted.
    pub query_parameters: Vec<String>,
    /// URI substitutions applied to recorded requests.
    pub url_patterns: Vec<PatternSpec>,
}

impl HarnessSettings {
    /// Reads settings from `path`; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Settings`] if the file cannot be read or
    /// parsed, including unknown keys.
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
        Self::parse(&content, path)
    }

    /// Parses settings text; `origin` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Settings`] for invalid YAML or unknown keys.
    pub fn parse(content: &str, origin: &Path) -> Result<Self, HarnessError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| HarnessError::Settings { path: origin.to_path_buf(), reason: e.to_string() })
    }

    /// Whether strict replay is on.
    #[must_use]
    pub fn strict(&self) -> bool {
        self.strict.unwrap_or(true)
    }

    /// Parsed `freeze_time`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Settings`] for a value that is neither a
    /// keyword nor an RFC 3339 instant.
    pub fn freeze_time(&self, origin: &Path) -> Result<FreezeTime, HarnessError> {
        match self.freeze_time.as_deref().map(str::trim) {
            None => Ok(FreezeTime::Auto),
            Some(v) if v.eq_ignore_ascii_case("auto") => Ok(FreezeTime::Auto),
            Some(v) if v.eq_ignore_ascii_case("live") => Ok(FreezeTime::Live),
            Some(v) => DateTime::parse_from_rfc3339(v)
                .map(|t| FreezeTime::At(t.with_timezone(&Utc)))
                .map_err(|e| HarnessError::Settings {
                    path: origin.to_path_buf(),
                    reason: format!("freeze_time {v:?}: {e}"),
                }),
        }
    }

    /// Compiled body-ignored endpoint rules.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidPattern`] for a bad path regex.
    pub fn body_ignored_rules(&self) -> Result<Vec<EndpointRule>, HarnessError> {
        self.body_ignored.iter().map(EndpointRuleSpec::compile).collect()
    }

    /// Compiled extra normalizers.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidPattern`] for a bad regex.
    pub fn normalizers(&self) -> Result<Vec<Normalizer>, HarnessError> {
        self.normalizers.iter().map(|n| Normalizer::new(&n.pattern, n.replacement.clone())).collect()
    }

    /// Builds the recording pipeline for `secret_values`.
    ///
    /// Stage order: body fields, query/form fields, extra query parameters,
    /// URI patterns, secret values, header allow-list.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidPattern`] for a bad URL pattern.
    pub fn pipeline(&self, secret_values: &[String]) -> Result<SanitizationPipeline, HarnessError> {
        let s = &self.sanitizers;
        let mut fields: Vec<String> = DEFAULT_SENSITIVE_FIELDS.iter().map(ToString::to_string).collect();
        fields.extend(s.sensitive_fields.iter().cloned());

        let headers = match &s.safe_headers {
            Some(safe) => HeaderSanitizer::new(safe),
            None => HeaderSanitizer::new(DEFAULT_SAFE_HEADERS.iter().copied()),
        }
        .allow(&s.additional_safe_headers)
        .remove(&s.remove_headers);

        let mut pipeline = SanitizationPipeline::new()
            .with(BodyFieldSanitizer::new(&fields, REDACTED))
            .with(QueryParameterSanitizer::new(&fields, REDACTED)?);
        if !s.query_parameters.is_empty() {
            pipeline = pipeline.with(QueryParameterSanitizer::new(
                &s.query_parameters,
                QueryParameterSanitizer::DEFAULT_REPLACEMENT,
            )?);
        }
        if !s.url_patterns.is_empty() {
            pipeline = pipeline.with(UrlPatternSanitizer::new(
                s.url_patterns.iter().map(|p| (p.pattern.as_str(), p.replacement.clone())),
            )?);
        }
        Ok(pipeline.with(TokenSanitizer::new(secret_values.to_vec(), REDACTED)).with(headers))
    }
}
