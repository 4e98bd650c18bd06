//! The persisted, ordered collection of interactions for one fixture.

use std::path::{Path, PathBuf};

use tracing::info;

use super::format::{Cassette, CassetteMetadata, Interaction};
use crate::error::HarnessError;
use crate::persist::write_json_atomic;

/// Interactions for one test, identified by their storage path.
///
/// Append-only while recording; loaded once, fully, for replay and never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct InteractionStore {
    path: PathBuf,
    interactions: Cassette,
}

impl InteractionStore {
    /// Creates an empty store that will persist to `path`.
    ///
    /// Nothing touches disk until [`persist`](Self::persist).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), interactions: Vec::new() }
    }

    /// Returns `true` if a cassette file exists at `path`.
    #[must_use]
    pub fn exists(path: &Path) -> bool {
        path.is_file()
    }

    /// Loads every interaction stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::MissingCassette`] if the file does not exist and
    /// [`HarnessError::MalformedCassette`] if it does not parse.
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        if !Self::exists(path) {
            return Err(HarnessError::MissingCassette { path: path.to_path_buf() });
        }
        let content = std::fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
        let interactions: Cassette = serde_json::from_str(&content).map_err(|e| {
            HarnessError::MalformedCassette { path: path.to_path_buf(), reason: e.to_string() }
        })?;
        Ok(Self { path: path.to_path_buf(), interactions })
    }

    /// Appends an already-sanitized interaction.
    pub fn append(&mut self, interaction: Interaction) {
        self.interactions.push(interaction);
    }

    /// Storage path of this cassette.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored interactions in recording order.
    #[must_use]
    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    /// Number of stored interactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// Writes the full sequence to disk, replacing any previous cassette.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] if the file cannot be written.
    pub fn persist(&self) -> Result<PathBuf, HarnessError> {
        write_json_atomic(&self.path, &self.interactions)?;
        info!(
            path = %self.path.display(),
            interactions = self.interactions.len(),
            "persisted cassette"
        );
        Ok(self.path.clone())
    }

    /// Writes `metadata` to the sidecar next to this cassette.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] if the file cannot be written.
    pub fn persist_metadata(&self, metadata: &CassetteMetadata) -> Result<PathBuf, HarnessError> {
        let path = CassetteMetadata::path_for(&self.path);
        write_json_atomic(&path, metadata)?;
        Ok(path)
    }

    /// Reads the sidecar of the cassette at `path`. Cassettes recorded
    /// without one yield `None`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::MalformedCassette`] if the sidecar does not parse.
    pub fn load_metadata(path: &Path) -> Result<Option<CassetteMetadata>, HarnessError> {
        let meta_path = CassetteMetadata::path_for(path);
        if !meta_path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&meta_path).map_err(|e| HarnessError::io(&meta_path, e))?;
        serde_json::from_str(&content).map(Some).map_err(|e| HarnessError::MalformedCassette {
            path: meta_path.clone(),
            reason: e.to_string(),
        })
    }

    /// Deletes the cassette at `path` and its sidecar so the fixture can be
    /// re-recorded. Returns whether a cassette existed.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] if an existing file cannot be removed.
    pub fn clear(path: &Path) -> Result<bool, HarnessError> {
        let meta_path = CassetteMetadata::path_for(path);
        if meta_path.is_file() {
            std::fs::remove_file(&meta_path).map_err(|e| HarnessError::io(&meta_path, e))?;
        }
        if !Self::exists(path) {
            return Ok(false);
        }
        std::fs::remove_file(path).map_err(|e| HarnessError::io(path, e))?;
        info!(path = %path.display(), "deleted cassette");
        Ok(true)
    }

    /// Consumes the store, returning its interactions.
    #[must_use]
    pub fn into_interactions(self) -> Cassette {
        self.interactions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::http::{HttpRequest, HttpResponse};

    fn sample(uri: &str, body: &str) -> Interaction {
        Interaction::new(
            HttpRequest::get(uri),
            HttpResponse::new(200, body),
            "2025-01-01T12:00:00Z".parse().unwrap(),
        )
    }

    #[test]
    fn persist_then_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cassettes").join("requests.json");

        let mut store = InteractionStore::new(&path);
        store.append(sample("https://a.test/1", "one"));
        store.append(sample("https://a.test/2", "two"));
        let written = store.persist().unwrap();
        assert_eq!(written, path);

        let loaded = InteractionStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.interactions()[0].response.body, "one");
        assert_eq!(loaded.interactions()[1].response.body, "two");
    }

    #[test]
    fn load_missing_is_missing_cassette() {
        let dir = tempfile::tempdir().unwrap();
        let err = InteractionStore::load(&dir.path().join("requests.json")).unwrap_err();
        assert!(matches!(err, HarnessError::MissingCassette { .. }));
    }

    #[test]
    fn load_garbage_is_malformed_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.json");
        std::fs::write(&path, r#"{"interactions": "nope"}"#).unwrap();

        let err = InteractionStore::load(&path).unwrap_err();
        assert!(matches!(err, HarnessError::MalformedCassette { .. }));
        assert!(err.to_string().contains("requests.json"));
    }

    #[test]
    fn persist_replaces_previous_recording() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.json");

        let mut first = InteractionStore::new(&path);
        first.append(sample("https://a.test/old", "old"));
        first.append(sample("https://a.test/old2", "old2"));
        first.persist().unwrap();

        let mut second = InteractionStore::new(&path);
        second.append(sample("https://a.test/new", "new"));
        second.persist().unwrap();

        let loaded = InteractionStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.interactions()[0].response.body, "new");
    }

    #[test]
    fn clear_reports_whether_a_cassette_existed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cassettes").join("requests.json");
        assert!(!InteractionStore::clear(&path).unwrap());

        let mut store = InteractionStore::new(&path);
        store.append(sample("https://a.test/1", "one"));
        store.persist().unwrap();
        store.persist_metadata(&CassetteMetadata::new(None)).unwrap();

        assert!(InteractionStore::clear(&path).unwrap());
        assert!(!path.exists());
        assert!(!CassetteMetadata::path_for(&path).exists());
        assert!(!InteractionStore::clear(&path).unwrap());
    }

    #[test]
    fn metadata_round_trips_and_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.json");
        assert_eq!(InteractionStore::load_metadata(&path).unwrap(), None);

        let frozen = "2024-03-01T08:00:00Z".parse().unwrap();
        let meta = CassetteMetadata::new(Some(frozen));
        InteractionStore::new(&path).persist_metadata(&meta).unwrap();
        assert_eq!(InteractionStore::load_metadata(&path).unwrap(), Some(meta));

        std::fs::write(CassetteMetadata::path_for(&path), "[]").unwrap();
        assert!(matches!(
            InteractionStore::load_metadata(&path),
            Err(HarnessError::MalformedCassette { .. })
        ));
    }
}
