//! The contract between the harness and the component under test.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::ports::clock::Clock;
use crate::ports::http::{HttpRequest, HttpResponse, HttpTransport, TransportError};

/// A termination request from the component, the analogue of calling
/// `exit(code)` in a standalone program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentExit {
    /// Requested process exit status.
    pub code: i32,
}

impl ComponentExit {
    /// Requests termination with `code`.
    #[must_use]
    pub fn new(code: i32) -> Self {
        Self { code }
    }
}

impl fmt::Display for ComponentExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component exited with code {}", self.code)
    }
}

impl std::error::Error for ComponentExit {}

/// Everything the component may touch: time, the network, and its config.
pub struct ComponentContext {
    /// The only time source the component should read.
    pub clock: Box<dyn Clock>,
    /// The only way the component should reach the network.
    pub http: Box<dyn HttpTransport>,
    /// Fully resolved component configuration.
    pub config: serde_json::Value,
}

impl ComponentContext {
    /// Current time from the harness clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Sends a request through the harness transport.
    ///
    /// # Errors
    ///
    /// Returns the transport's error unchanged.
    pub fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.http.send(request)
    }

    /// Looks up a dotted path in the config, e.g. `api.base_url`.
    #[must_use]
    pub fn config_value(&self, path: &str) -> Option<&serde_json::Value> {
        path.split('.').try_fold(&self.config, |value, key| value.get(key))
    }
}

impl fmt::Debug for ComponentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentContext")
            .field("pinned", &self.clock.is_pinned())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A black-box program driven by the harness.
///
/// Returning `Err(ComponentExit)` is how a component terminates with a
/// status; returning `Ok(())` is a normal return. Panics are caught by the
/// harness and never escape it.
pub trait Component {
    /// Runs the component once.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentExit`] to request termination with a status.
    fn run(&mut self, ctx: &ComponentContext) -> Result<(), ComponentExit>;
}

impl<F> Component for F
where
    F: FnMut(&ComponentContext) -> Result<(), ComponentExit>,
{
    fn run(&mut self, ctx: &ComponentContext) -> Result<(), ComponentExit> {
        self(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clock::PinnedClock;
    use serde_json::json;

    struct Offline;

    impl HttpTransport for Offline {
        fn send(&self, _request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::Connection("offline".into()))
        }
    }

    fn context() -> ComponentContext {
        ComponentContext {
            clock: Box::new(PinnedClock::new("2025-01-01T12:00:00Z".parse().unwrap())),
            http: Box::new(Offline),
            config: json!({"api": {"base_url": "https://api.example.com"}}),
        }
    }

    #[test]
    fn closures_are_components() {
        let mut calls = 0;
        let mut component = |ctx: &ComponentContext| {
            calls += 1;
            if ctx.send(&HttpRequest::get("https://x.test")).is_err() {
                return Err(ComponentExit::new(2));
            }
            Ok(())
        };
        assert_eq!(component.run(&context()), Err(ComponentExit::new(2)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn config_value_walks_dotted_paths() {
        let ctx = context();
        assert_eq!(ctx.config_value("api.base_url"), Some(&json!("https://api.example.com")));
        assert_eq!(ctx.config_value("api.missing"), None);
        assert_eq!(ctx.now().to_rfc3339(), "2025-01-01T12:00:00+00:00");
    }
}
