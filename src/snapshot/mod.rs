//! Content-addressed fingerprints of a run's output tree.
//!
//! Every file gets a `sha256:` hash and a size. CSV files additionally carry
//! their row count and header names, used only to make diff summaries
//! readable; equality is decided by the hash alone.

pub mod compare;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use walkdir::WalkDir;

pub use compare::{DiffSources, FileDiff, FileDiffKind, ValidationResult};

use crate::error::HarnessError;
use crate::persist::write_json_atomic;

/// File names skipped by default.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[".DS_Store", ".gitkeep", "*.manifest"];

/// Fingerprint of one output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// `sha256:<hex>` of the exact bytes.
    pub hash: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// CSV only: number of records, header row included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    /// CSV only: names from the first row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

impl FileRecord {
    /// Fingerprints `bytes`; `tabular` adds CSV metadata.
    #[must_use]
    pub fn from_bytes(bytes: &[u8], tabular: bool) -> Self {
        let (row_count, columns) = if tabular { csv_metadata(bytes) } else { (None, None) };
        Self {
            hash: format!("sha256:{}", hex::encode(Sha256::digest(bytes))),
            size_bytes: bytes.len() as u64,
            row_count,
            columns,
        }
    }
}

/// Mapping from `/`-separated relative path to its record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    files: BTreeMap<String, FileRecord>,
}

impl Snapshot {
    /// Wraps an existing mapping.
    #[must_use]
    pub fn from_files(files: BTreeMap<String, FileRecord>) -> Self {
        Self { files }
    }

    /// Records keyed by relative path.
    #[must_use]
    pub fn files(&self) -> &BTreeMap<String, FileRecord> {
        &self.files
    }

    /// Record for `path`, if present.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    /// Number of files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if the tree had no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Writes the snapshot to `path` atomically.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), HarnessError> {
        write_json_atomic(path, self)?;
        info!(path = %path.display(), files = self.files.len(), "saved output snapshot");
        Ok(())
    }

    /// Reads a snapshot written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] if the file cannot be read and
    /// [`HarnessError::MalformedSnapshot`] if it does not parse.
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        let content = std::fs::read_to_string(path).map_err(|e| HarnessError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| HarnessError::MalformedSnapshot {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Captures and compares output trees.
#[derive(Debug, Clone)]
pub struct OutputSnapshot {
    ignore_patterns: Vec<String>,
}

impl Default for OutputSnapshot {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORE_PATTERNS.iter().map(ToString::to_string).collect())
    }
}

impl OutputSnapshot {
    /// Skips files whose name equals a pattern, or ends with the suffix of a
    /// `*suffix` pattern.
    #[must_use]
    pub fn new(ignore_patterns: Vec<String>) -> Self {
        Self { ignore_patterns }
    }

    fn is_ignored(&self, file_name: &str) -> bool {
        self.ignore_patterns.iter().any(|pattern| match pattern.strip_prefix('*') {
            Some(suffix) => file_name.ends_with(suffix),
            None => file_name == pattern,
        })
    }

    /// Fingerprints every file under `root`. A missing root is an empty tree.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] if a directory or file cannot be read.
    pub fn capture(&self, root: &Path) -> Result<Snapshot, HarnessError> {
        let mut files = BTreeMap::new();
        if !root.exists() {
            debug!(root = %root.display(), "output root does not exist; empty snapshot");
            return Ok(Snapshot { files });
        }

        for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                HarnessError::io(&path, e.into())
            })?;
            if !entry.file_type().is_file() || self.is_ignored(&entry.file_name().to_string_lossy()) {
                continue;
            }
            let path = entry.path();
            let bytes = std::fs::read(path).map_err(|e| HarnessError::io(path, e))?;
            files.insert(relative_key(root, path), FileRecord::from_bytes(&bytes, is_tabular(path)));
        }

        debug!(root = %root.display(), files = files.len(), "captured output snapshot");
        Ok(Snapshot { files })
    }

    /// Captures `root` and writes the snapshot to `path`.
    ///
    /// # Errors
    ///
    /// Propagates capture and write failures.
    pub fn capture_to(&self, root: &Path, path: &Path) -> Result<Snapshot, HarnessError> {
        let snapshot = self.capture(root)?;
        snapshot.save(path)?;
        Ok(snapshot)
    }

    /// Compares two snapshots without reading file contents.
    #[must_use]
    pub fn compare(&self, expected: &Snapshot, actual: &Snapshot, verbose: bool) -> ValidationResult {
        compare::compare(expected, actual, verbose, None)
    }

    /// Compares two snapshots; in verbose mode, changed text files are
    /// diffed line by line using the files under `sources`.
    #[must_use]
    pub fn compare_with_sources(
        &self,
        expected: &Snapshot,
        actual: &Snapshot,
        verbose: bool,
        sources: &DiffSources,
    ) -> ValidationResult {
        compare::compare(expected, actual, verbose, Some(sources))
    }
}

fn relative_key(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/")
}

fn is_tabular(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn csv_metadata(bytes: &[u8]) -> (Option<u64>, Option<Vec<String>>) {
    let mut reader = csv::ReaderBuilder::new().has_headers(false).flexible(true).from_reader(bytes);
    let mut rows = 0_u64;
    let mut columns = None;
    for record in reader.byte_records() {
        let Ok(record) = record else {
            break;
        };
        if columns.is_none() {
            columns = Some(record.iter().map(|f| String::from_utf8_lossy(f).into_owned()).collect());
        }
        rows += 1;
    }
    (Some(rows), columns)
}

/// Joins `relative` onto `root`, accepting the `/` separators used in
/// snapshot keys.
#[must_use]
pub fn resolve_relative(root: &Path, relative: &str) -> PathBuf {
    relative.split('/').fold(root.to_path_buf(), |acc, part| acc.join(part))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = resolve_relative(root, rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn captures_nested_files_with_csv_metadata() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "tables/main.CSV", "id,name\n1,a\n2,b\n");
        write(dir.path(), "files/report.txt", "hello");
        write(dir.path(), "tables/.gitkeep", "");
        write(dir.path(), "tables/main.csv.manifest", "{}");

        let snapshot = OutputSnapshot::default().capture(dir.path()).unwrap();
        let keys: Vec<&str> = snapshot.files().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["files/report.txt", "tables/main.CSV"]);

        let csv = snapshot.get("tables/main.CSV").unwrap();
        assert_eq!(csv.row_count, Some(3));
        assert_eq!(csv.columns.as_deref(), Some(&["id".to_string(), "name".to_string()][..]));
        assert_eq!(csv.size_bytes, 16);

        let txt = snapshot.get("files/report.txt").unwrap();
        assert_eq!(
            txt.hash,
            "sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(txt.row_count, None);
    }

    #[test]
    fn empty_csv_has_zero_rows_and_no_columns() {
        let record = FileRecord::from_bytes(b"", true);
        assert_eq!(record.row_count, Some(0));
        assert_eq!(record.columns, None);
    }

    #[test]
    fn optional_fields_are_omitted_on_disk() {
        let snapshot = Snapshot::from_files(BTreeMap::from([(
            "a.txt".to_string(),
            FileRecord::from_bytes(b"x", false),
        )]));
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["a.txt"]["size_bytes"], 1);
        assert!(value["a.txt"].get("row_count").is_none());
    }

    #[test]
    fn save_load_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "out/x.csv", "a\n1\n");
        let path = dir.path().join("output_snapshot.json");
        let snapshot = OutputSnapshot::default().capture_to(&dir.path().join("out"), &path).unwrap();
        assert_eq!(Snapshot::load(&path).unwrap(), snapshot);

        std::fs::write(&path, r#"{"x.csv": {"hash": 3}}"#).unwrap();
        assert!(matches!(Snapshot::load(&path), Err(HarnessError::MalformedSnapshot { .. })));
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = OutputSnapshot::default().capture(&dir.path().join("nope")).unwrap();
        assert!(snapshot.is_empty());
    }
}
