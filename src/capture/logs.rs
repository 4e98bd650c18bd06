//! Log capture during a component run and the persisted run result.

use std::fmt::{self, Write as _};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::error::HarnessError;
use crate::persist::write_json_atomic;
use crate::sanitize::TokenSanitizer;

/// Logger namespaces that belong to the harness or its HTTP stack and are
/// never attributed to the component.
pub const DEFAULT_IGNORED_LOGGERS: &[&str] =
    &["replay_harness", "reqwest", "hyper", "hyper_util", "h2", "rustls", "tokio_util"];

/// One log record emitted by the component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedLog {
    /// Level name, e.g. `INFO`.
    pub level: String,
    /// Emitting logger; the `tracing` target.
    #[serde(rename = "logger")]
    pub logger_name: String,
    /// Rendered message, with secrets already scrubbed.
    pub message: String,
}

impl CapturedLog {
    /// Builds a record.
    pub fn new(level: impl Into<String>, logger_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { level: level.into(), logger_name: logger_name.into(), message: message.into() }
    }
}

/// Observable result of one component run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRunResult {
    /// `None` for a normal return; the requested status otherwise.
    pub exit_code: Option<i32>,
    /// Captured records in emission order.
    #[serde(default)]
    pub logs: Vec<CapturedLog>,
}

impl ComponentRunResult {
    /// Builds a result.
    #[must_use]
    pub fn new(exit_code: Option<i32>, logs: Vec<CapturedLog>) -> Self {
        Self { exit_code, logs }
    }

    /// Writes the result to `path` atomically.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), HarnessError> {
        write_json_atomic(path, self)
    }

    /// Reads a result written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] if the file cannot be read and
    /// [`HarnessError::MalformedLogFile`] if it does not parse.
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        let content = std::fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| HarnessError::MalformedLogFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Shared buffer a [`CaptureLayer`] appends to.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    records: Arc<Mutex<Vec<CapturedLog>>>,
}

impl LogSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one record.
    pub fn push(&self, log: CapturedLog) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).push(log);
    }

    /// Removes and returns everything captured so far.
    #[must_use]
    pub fn take(&self) -> Vec<CapturedLog> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// `tracing` layer that records component events into a [`LogSink`].
///
/// Events whose target falls under an ignored namespace are skipped. Secret
/// values are scrubbed from the message before it is stored.
pub struct CaptureLayer {
    sink: LogSink,
    ignored: Vec<String>,
    scrubber: TokenSanitizer,
}

impl CaptureLayer {
    /// Creates a layer writing into `sink`.
    pub fn new(sink: LogSink, ignored: Vec<String>, scrubber: TokenSanitizer) -> Self {
        Self { sink, ignored, scrubber }
    }

    fn is_ignored(&self, target: &str) -> bool {
        self.ignored.iter().any(|ns| is_in_namespace(target, ns))
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if self.is_ignored(meta.target()) {
            return;
        }
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.sink.push(CapturedLog::new(
            meta.level().to_string(),
            meta.target(),
            self.scrubber.scrub(&visitor.finish()),
        ));
    }
}

/// Returns `true` if `target` is `namespace` or nested under it.
#[must_use]
pub fn is_in_namespace(target: &str, namespace: &str) -> bool {
    target == namespace
        || target.strip_prefix(namespace).is_some_and(|rest| rest.starts_with("::"))
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }

    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{name}={value}");
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field.name(), format_args!("{value}"));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.push_field(field.name(), format_args!("{value:?}"));
        }
    }
}
