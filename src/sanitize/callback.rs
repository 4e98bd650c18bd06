//! Closure-backed sanitizer for fixture-specific rules.

use super::Sanitizer;
use crate::ports::http::{HttpRequest, HttpResponse};

type RequestFn = Box<dyn Fn(HttpRequest) -> HttpRequest + Send + Sync>;
type ResponseFn = Box<dyn Fn(HttpResponse) -> HttpResponse + Send + Sync>;

/// Runs caller-supplied closures; either side may be left as identity.
///
/// Closures must be idempotent for the pipeline to stay idempotent.
#[derive(Default)]
pub struct CallbackSanitizer {
    request: Option<RequestFn>,
    response: Option<ResponseFn>,
}

impl CallbackSanitizer {
    /// Creates a sanitizer that changes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request transform.
    #[must_use]
    pub fn on_request(mut self, f: impl Fn(HttpRequest) -> HttpRequest + Send + Sync + 'static) -> Self {
        self.request = Some(Box::new(f));
        self
    }

    /// Sets the response transform.
    #[must_use]
    pub fn on_response(
        mut self,
        f: impl Fn(HttpResponse) -> HttpResponse + Send + Sync + 'static,
    ) -> Self {
        self.response = Some(Box::new(f));
        self
    }
}

impl Sanitizer for CallbackSanitizer {
    fn before_record_request(&self, request: HttpRequest) -> HttpRequest {
        match &self.request {
            Some(f) => f(request),
            None => request,
        }
    }

    fn before_record_response(&self, response: HttpResponse) -> HttpResponse {
        match &self.response {
            Some(f) => f(response),
            None => response,
        }
    }
}

impl std::fmt::Debug for CallbackSanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackSanitizer")
            .field("request", &self.request.is_some())
            .field("response", &self.response.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_hook_runs_and_request_defaults_to_identity() {
        let s = CallbackSanitizer::new().on_response(|mut r: HttpResponse| {
            r.body = r.body.replace("acct-991", "acct-XXX");
            r
        });
        let req = HttpRequest::get("https://x.test/acct-991");
        assert_eq!(s.before_record_request(req.clone()), req);
        let resp = s.before_record_response(HttpResponse::new(200, "id=acct-991"));
        assert_eq!(resp.body, "id=acct-XXX");
    }
}
