//! Atomic file persistence for cassettes, logs and snapshots.

use std::fs::{self, File};
use std::io::Write as _;
use std::path::Path;

use crate::error::HarnessError;

/// Writes `bytes` to `path` through a sibling temp file and a rename, so
/// readers observe either the previous file or the complete new one. The
/// temp file is flushed to disk before the rename.
///
/// Parent directories are created as needed.
///
/// # Errors
///
/// Returns [`HarnessError::Io`] if the directory, temp file, or rename fails.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), HarnessError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| HarnessError::io(parent, e))?;
    }
    let tmp_path = path.with_extension(format!("tmp-{}", std::process::id()));
    write_synced(&tmp_path, bytes).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        HarnessError::io(&tmp_path, e)
    })?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        HarnessError::io(path, e)
    })
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Serializes `value` as indented JSON and writes it atomically.
///
/// # Errors
///
/// Returns [`HarnessError::Io`] on serialization or write failure.
pub fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), HarnessError> {
    let mut json = serde_json::to_vec_pretty(value)
        .map_err(|e| HarnessError::io(path, std::io::Error::other(e)))?;
    json.push(b'\n');
    write_atomic(path, &json)
}
