//! One-way transforms that strip secrets from interactions before they are
//! persisted.
//!
//! A [`Sanitizer`] is a pair of pure transforms over the request and the
//! response; both default to identity. A [`SanitizationPipeline`] runs its
//! stages in the order given, each one seeing the previous stage's output.
//! Every built-in is idempotent: running a pipeline over already-sanitized
//! data leaves it unchanged.
//!
//! Sanitization happens once, when an interaction is recorded. Replayed data
//! is already sanitized and is never passed through the pipeline again.

pub mod body;
pub mod callback;
pub mod headers;
pub mod token;
pub mod url;

use std::fmt;

pub use body::BodyFieldSanitizer;
pub use callback::CallbackSanitizer;
pub use headers::HeaderSanitizer;
pub use token::TokenSanitizer;
pub use url::{QueryParameterSanitizer, ResponseUrlSanitizer, UrlPatternSanitizer};

use crate::cassette::format::Interaction;
use crate::error::HarnessError;
use crate::ports::http::{HttpRequest, HttpResponse};

/// Marker written in place of redacted values.
pub const REDACTED: &str = "REDACTED";

/// Field and parameter names redacted by the default pipeline.
pub const DEFAULT_SENSITIVE_FIELDS: &[&str] = &[
    "access_token",
    "refresh_token",
    "id_token",
    "client_id",
    "client_secret",
    "client_assertion",
    "code",
    "password",
    "token",
];

/// Headers kept by the default pipeline; everything else is dropped.
pub const DEFAULT_SAFE_HEADERS: &[&str] = &["content-type", "content-length", "accept"];

/// Transforms applied to a captured exchange before it is written to disk.
pub trait Sanitizer: Send + Sync {
    /// Sanitizes the request. Identity by default.
    fn before_record_request(&self, request: HttpRequest) -> HttpRequest {
        request
    }

    /// Sanitizes the response. Identity by default.
    fn before_record_response(&self, response: HttpResponse) -> HttpResponse {
        response
    }
}

/// Ordered composition of sanitizers.
#[derive(Default)]
pub struct SanitizationPipeline {
    stages: Vec<Box<dyn Sanitizer>>,
}

impl SanitizationPipeline {
    /// Creates an empty pipeline, which behaves as identity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage; it runs after every stage already present.
    #[must_use]
    pub fn with(mut self, stage: impl Sanitizer + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Appends a boxed stage.
    pub fn push(&mut self, stage: Box<dyn Sanitizer>) {
        self.stages.push(stage);
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Sanitizes both halves of an interaction.
    #[must_use]
    pub fn sanitize(&self, interaction: Interaction) -> Interaction {
        Interaction {
            request: self.before_record_request(interaction.request),
            response: self.before_record_response(interaction.response),
            recorded_at: interaction.recorded_at,
        }
    }

    /// The pipeline used when a fixture supplies no custom stages.
    ///
    /// Redacts the default sensitive fields in JSON bodies and in
    /// query/form parameters, then every known secret value anywhere, then
    /// drops all headers outside the default allow-list.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidPattern`] if a field name cannot be
    /// turned into a parameter pattern.
    pub fn default_for(secret_values: &[String]) -> Result<Self, HarnessError> {
        let fields: Vec<String> = DEFAULT_SENSITIVE_FIELDS.iter().map(ToString::to_string).collect();
        Ok(Self::new()
            .with(BodyFieldSanitizer::new(fields.clone(), REDACTED))
            .with(QueryParameterSanitizer::new(&fields, REDACTED)?)
            .with(TokenSanitizer::new(secret_values.to_vec(), REDACTED))
            .with(HeaderSanitizer::default()))
    }
}

impl Sanitizer for SanitizationPipeline {
    fn before_record_request(&self, request: HttpRequest) -> HttpRequest {
        self.stages.iter().fold(request, |req, stage| stage.before_record_request(req))
    }

    fn before_record_response(&self, response: HttpResponse) -> HttpResponse {
        self.stages.iter().fold(response, |resp, stage| stage.before_record_response(resp))
    }
}

impl fmt::Debug for SanitizationPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SanitizationPipeline").field("stages", &self.stages.len()).finish()
    }
}
