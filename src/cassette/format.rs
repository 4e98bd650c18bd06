//! Cassette data structures: the on-disk form of recorded interactions.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ports::http::{HttpRequest, HttpResponse};

/// A single recorded request/response pair. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Interaction {
    /// The (sanitized) outbound request.
    pub request: HttpRequest,
    /// The (sanitized) response that answered it.
    pub response: HttpResponse,
    /// Pinned clock reading at the time of the exchange.
    pub recorded_at: DateTime<Utc>,
}

impl Interaction {
    /// Pairs a request with its response at the given instant.
    #[must_use]
    pub fn new(request: HttpRequest, response: HttpResponse, recorded_at: DateTime<Utc>) -> Self {
        Self { request, response, recorded_at }
    }
}

/// A cassette file is a bare, ordered JSON array of interactions.
pub type Cassette = Vec<Interaction>;

/// How a cassette was recorded, stored in a sidecar next to it so the
/// cassette itself stays a bare array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CassetteMetadata {
    /// Wall-clock instant the recording was written.
    pub recorded_at: DateTime<Utc>,
    /// Instant the component's clock was frozen at; `None` for a live clock.
    pub freeze_time: Option<DateTime<Utc>>,
    /// Version of the harness that wrote the cassette.
    pub harness_version: String,
}

impl CassetteMetadata {
    /// Metadata for a recording finishing now.
    #[must_use]
    pub fn new(freeze_time: Option<DateTime<Utc>>) -> Self {
        Self {
            recorded_at: Utc::now(),
            freeze_time,
            harness_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Sidecar location for `cassette`: `requests.json` → `requests.meta.json`.
    #[must_use]
    pub fn path_for(cassette: &Path) -> PathBuf {
        cassette.with_extension("meta.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_documented_field_names() {
        let interaction = Interaction::new(
            HttpRequest::get("https://api.example.com/v1/status"),
            HttpResponse::new(200, r#"{"status":"ok"}"#),
            "2025-01-01T12:00:00Z".parse().unwrap(),
        );
        let value = serde_json::to_value(&interaction).unwrap();

        assert_eq!(value["request"]["method"], "GET");
        assert_eq!(value["request"]["uri"], "https://api.example.com/v1/status");
        assert_eq!(value["request"]["headers"], json!({}));
        assert_eq!(value["request"]["body"], "");
        assert_eq!(value["response"]["status"], 200);
        assert_eq!(value["response"]["body"], r#"{"status":"ok"}"#);
        assert_eq!(value["recorded_at"], "2025-01-01T12:00:00Z");
    }

    #[test]
    fn metadata_sits_beside_its_cassette() {
        let path = CassetteMetadata::path_for(Path::new("/fx/cassettes/requests.json"));
        assert_eq!(path, Path::new("/fx/cassettes/requests.meta.json"));

        let meta = CassetteMetadata::new(None);
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["freeze_time"], serde_json::Value::Null);
        assert_eq!(value["harness_version"], env!("CARGO_PKG_VERSION"));
    }
}
