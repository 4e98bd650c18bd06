//! Redaction of named fields inside JSON bodies.

use std::collections::BTreeSet;

use serde_json::Value;

use super::Sanitizer;
use crate::ports::http::{HttpRequest, HttpResponse};

/// Replaces the value of every listed JSON field with a marker string.
///
/// Field names match case-insensitively at any depth, including inside
/// arrays. Bodies that are not JSON, and JSON bodies with nothing to redact,
/// are left byte-for-byte untouched. Redacted bodies keep their key order
/// (`serde_json` is built with `preserve_order`) but lose insignificant
/// whitespace.
#[derive(Debug, Clone)]
pub struct BodyFieldSanitizer {
    fields: BTreeSet<String>,
    replacement: String,
    nested: bool,
}

impl BodyFieldSanitizer {
    /// Redacts `fields` at any depth.
    pub fn new<I, S>(fields: I, replacement: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            fields: fields.into_iter().map(|f| f.as_ref().to_ascii_lowercase()).collect(),
            replacement: replacement.into(),
            nested: true,
        }
    }

    /// Restricts redaction to top-level fields.
    #[must_use]
    pub fn top_level_only(mut self) -> Self {
        self.nested = false;
        self
    }

    /// Returns the redacted body, or the input unchanged.
    #[must_use]
    pub fn scrub_body(&self, body: &str) -> String {
        if self.fields.is_empty() {
            return body.to_string();
        }
        let trimmed = body.trim_start();
        if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
            return body.to_string();
        }
        let Ok(mut value) = serde_json::from_str::<Value>(body) else {
            return body.to_string();
        };
        if !self.redact(&mut value, true) {
            return body.to_string();
        }
        serde_json::to_string(&value).unwrap_or_else(|_| body.to_string())
    }

    fn redact(&self, value: &mut Value, top: bool) -> bool {
        if !top && !self.nested {
            return false;
        }
        let mut changed = false;
        match value {
            Value::Object(map) => {
                for (key, child) in map.iter_mut() {
                    if self.fields.contains(&key.to_ascii_lowercase()) {
                        if child.as_str() != Some(self.replacement.as_str()) {
                            *child = Value::String(self.replacement.clone());
                            changed = true;
                        }
                    } else {
                        changed |= self.redact(child, false);
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    changed |= self.redact(item, top);
                }
            }
            _ => {}
        }
        changed
    }
}

impl Sanitizer for BodyFieldSanitizer {
    fn before_record_request(&self, mut request: HttpRequest) -> HttpRequest {
        request.body = self.scrub_body(&request.body);
        request
    }

    fn before_record_response(&self, mut response: HttpResponse) -> HttpResponse {
        response.body = self.scrub_body(&response.body);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_nested_fields_and_array_items() {
        let s = BodyFieldSanitizer::new(["password", "token"], "REDACTED");
        let body = json!({
            "user": {"name": "ada", "Password": "pw"},
            "sessions": [{"token": "t1"}, {"token": "t2"}],
        })
        .to_string();

        let out: Value = serde_json::from_str(&s.scrub_body(&body)).unwrap();
        assert_eq!(out["user"]["Password"], "REDACTED");
        assert_eq!(out["user"]["name"], "ada");
        assert_eq!(out["sessions"][1]["token"], "REDACTED");
    }

    #[test]
    fn top_level_only_leaves_nested_values() {
        let s = BodyFieldSanitizer::new(["token"], "X").top_level_only();
        let out: Value =
            serde_json::from_str(&s.scrub_body(r#"{"token":"a","inner":{"token":"b"}}"#)).unwrap();
        assert_eq!(out, json!({"token": "X", "inner": {"token": "b"}}));
    }

    #[test]
    fn non_json_and_clean_bodies_are_untouched() {
        let s = BodyFieldSanitizer::new(["token"], "X");
        assert_eq!(s.scrub_body("token=abc"), "token=abc");
        let pretty = "{\n  \"name\": \"ada\"\n}";
        assert_eq!(s.scrub_body(pretty), pretty);
    }

    #[test]
    fn second_pass_is_a_no_op() {
        let s = BodyFieldSanitizer::new(["client_secret"], "REDACTED");
        let once = s.scrub_body(r#"{"client_secret": 42, "a": 1}"#);
        assert_eq!(s.scrub_body(&once), once);
    }

    #[test]
    fn key_order_survives_redaction() {
        let s = BodyFieldSanitizer::new(["password"], "REDACTED");
        assert_eq!(
            s.scrub_body(r#"{"zeta":1,"password":"p","alpha":2}"#),
            r#"{"zeta":1,"password":"REDACTED","alpha":2}"#
        );
        assert_eq!(
            s.scrub_body(r#"[{"b":{"password":"x","a":0},"a":[]}]"#),
            r#"[{"b":{"password":"REDACTED","a":0},"a":[]}]"#
        );
    }
}
