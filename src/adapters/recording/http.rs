//! Recording adapter for the `HttpTransport` port.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::cassette::format::Interaction;
use crate::cassette::store::InteractionStore;
use crate::ports::clock::Clock;
use crate::ports::http::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use crate::sanitize::SanitizationPipeline;

/// Forwards requests to a live transport and appends a sanitized copy of
/// each completed exchange to a shared store.
///
/// The component receives the live, unsanitized response. Exchanges that
/// fail at the transport level are not recorded, so a component that
/// tolerated such a failure live will hit a no-match for the same request
/// on replay.
pub struct RecordingHttp {
    inner: Box<dyn HttpTransport>,
    store: Arc<Mutex<InteractionStore>>,
    pipeline: Arc<SanitizationPipeline>,
    clock: Arc<dyn Clock>,
}

impl RecordingHttp {
    /// Creates a recording transport wrapping `inner`.
    pub fn new(
        inner: Box<dyn HttpTransport>,
        store: Arc<Mutex<InteractionStore>>,
        pipeline: Arc<SanitizationPipeline>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { inner, store, pipeline, clock }
    }
}

impl HttpTransport for RecordingHttp {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let response = match self.inner.send(request) {
            Ok(response) => response,
            Err(err) => {
                warn!(method = %request.method, uri = %request.uri, error = %err, "live request failed; not recorded");
                return Err(err);
            }
        };

        let interaction = self.pipeline.sanitize(Interaction::new(
            request.clone(),
            response.clone(),
            self.clock.now(),
        ));
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        store.append(interaction);
        debug!(method = %request.method, status = response.status, seq = store.len() - 1, "recorded interaction");

        Ok(response)
    }
}
