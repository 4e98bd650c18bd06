//! File naming inside a per-test fixture directory.

use std::path::{Path, PathBuf};

/// Locations of every file the harness reads or writes for one test.
///
/// ```text
/// <root>/
///   config.json
///   config.secrets.json      (never committed)
///   .env                     (optional)
///   harness.yaml             (optional)
///   output_snapshot.json
///   cassettes/
///     requests.json
///     requests.meta.json
///     logs.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureLayout {
    root: PathBuf,
}

impl FixtureLayout {
    /// Layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Fixture directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Component configuration template.
    #[must_use]
    pub fn config(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Real credentials; read but never persisted elsewhere.
    #[must_use]
    pub fn secrets(&self) -> PathBuf {
        self.root.join("config.secrets.json")
    }

    /// Optional environment overlay.
    #[must_use]
    pub fn env_file(&self) -> PathBuf {
        self.root.join(".env")
    }

    /// Optional per-fixture harness settings.
    #[must_use]
    pub fn settings(&self) -> PathBuf {
        self.root.join("harness.yaml")
    }

    /// Directory holding the recorded artifacts.
    #[must_use]
    pub fn cassette_dir(&self) -> PathBuf {
        self.root.join("cassettes")
    }

    /// Recorded HTTP interactions.
    #[must_use]
    pub fn cassette(&self) -> PathBuf {
        self.cassette_dir().join("requests.json")
    }

    /// Recorded exit code and logs.
    #[must_use]
    pub fn logs(&self) -> PathBuf {
        self.cassette_dir().join("logs.json")
    }

    /// Recorded output tree fingerprint.
    #[must_use]
    pub fn output_snapshot(&self) -> PathBuf {
        self.root.join("output_snapshot.json")
    }

    /// Returns `true` if a cassette has been recorded.
    #[must_use]
    pub fn has_cassette(&self) -> bool {
        self.cassette().is_file()
    }
}
