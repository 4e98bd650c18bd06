//! Error types shared across the harness.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::capture::logs::ComponentRunResult;

/// Fatal conditions raised while preparing, running, or persisting a test run.
///
/// Comparison failures are not errors; see [`AssertionFailure`].
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Replay was requested but no cassette exists at the fixture path.
    #[error("no cassette found at {}; run in record mode to create one", path.display())]
    MissingCassette {
        /// Expected cassette location.
        path: PathBuf,
    },

    /// An outbound request during strict replay had no stored counterpart.
    #[error("no recorded interaction matches {method} {path}")]
    NoMatchingInteraction {
        /// HTTP method of the first unmatched request.
        method: String,
        /// Path (with query) of the first unmatched request.
        path: String,
        /// Exit code and logs of the run that issued the request, when the
        /// component ran to completion before the failure was reported.
        captured: Option<Box<ComponentRunResult>>,
    },

    /// A config placeholder references a missing environment variable or secret.
    #[error("unresolved placeholder {placeholder}")]
    SecretsUnresolved {
        /// The placeholder text as written, e.g. `{{env.API_URL}}`.
        placeholder: String,
    },

    /// A cassette file exists but does not match the on-disk schema.
    #[error("malformed cassette {}: {reason}", path.display())]
    MalformedCassette {
        /// Cassette location.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// An output snapshot file exists but does not match the on-disk schema.
    #[error("malformed snapshot {}: {reason}", path.display())]
    MalformedSnapshot {
        /// Snapshot location.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// A captured log file exists but does not match the on-disk schema.
    #[error("malformed log file {}: {reason}", path.display())]
    MalformedLogFile {
        /// Log file location.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// The secrets file could not be read or parsed.
    #[error("failed to load secrets from {}: {reason}", path.display())]
    SecretsLoad {
        /// Secrets file location.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// A user-supplied regular expression failed to compile.
    #[error("invalid {what} pattern {pattern:?}: {reason}")]
    InvalidPattern {
        /// Which setting the pattern came from.
        what: &'static str,
        /// The offending pattern.
        pattern: String,
        /// Compiler message.
        reason: String,
    },

    /// A run mode string was not one of `record`, `replay`, `auto`.
    #[error("invalid run mode {0:?}; expected record, replay or auto")]
    InvalidMode(String),

    /// Fixture settings or config could not be parsed.
    #[error("invalid settings in {}: {reason}", path.display())]
    Settings {
        /// Settings file location.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// Filesystem failure on a fixture or output path.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl HarnessError {
    /// Wraps an I/O error with the path it happened on.
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.to_path_buf(), source }
    }

    /// Builds an [`HarnessError::InvalidPattern`] from a regex error.
    pub fn pattern(what: &'static str, pattern: &str, err: &regex::Error) -> Self {
        Self::InvalidPattern { what, pattern: pattern.to_string(), reason: err.to_string() }
    }
}

/// Non-fatal comparison failures surfaced as test assertion failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssertionFailure {
    /// Recorded and replayed exit codes differ.
    #[error("exit code mismatch: recorded {recorded:?}, replayed {replayed:?}\n{details}")]
    ExitCodeMismatch {
        /// Exit code from the recorded run.
        recorded: Option<i32>,
        /// Exit code from the replayed run.
        replayed: Option<i32>,
        /// Rendered comparison report.
        details: String,
    },

    /// Log sequences differ after normalization.
    #[error("log mismatch\n{details}")]
    LogMismatch {
        /// Rendered comparison report.
        details: String,
    },

    /// The output tree differs from its snapshot.
    #[error("output mismatch\n{details}")]
    OutputMismatch {
        /// Rendered validation report.
        details: String,
    },
}
