//! Snapshot comparison and its report.

use std::fmt::Write as _;
use std::path::PathBuf;

use serde::Serialize;
use similar::TextDiff;

use super::{resolve_relative, FileRecord, Snapshot};
use crate::error::AssertionFailure;

/// Where a changed file's content can be read from for a line diff.
#[derive(Debug, Clone)]
pub struct DiffSources {
    /// Root of the tree the expected snapshot was taken from.
    pub expected_root: PathBuf,
    /// Root of the tree just produced.
    pub actual_root: PathBuf,
}

/// How a file differs between snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileDiffKind {
    /// Present only in the actual tree.
    Added,
    /// Present only in the expected tree.
    Removed,
    /// Present in both with different hashes.
    Changed,
}

/// One differing file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDiff {
    /// Relative path.
    pub path: String,
    /// Kind of difference.
    pub kind: FileDiffKind,
    /// Expected record, if the file was expected.
    pub expected: Option<FileRecord>,
    /// Actual record, if the file was produced.
    pub actual: Option<FileRecord>,
    /// Verbose mode only: unified line diff, or a note that it is binary.
    pub unified_diff: Option<String>,
}

impl FileDiff {
    fn describe(&self) -> String {
        match self.kind {
            FileDiffKind::Added => format!("+ {} (added)", self.path),
            FileDiffKind::Removed => format!("- {} (removed)", self.path),
            FileDiffKind::Changed => {
                let mut line = format!("~ {} (changed", self.path);
                if let (Some(expected), Some(actual)) = (&self.expected, &self.actual) {
                    if let (Some(before), Some(after)) = (expected.row_count, actual.row_count) {
                        if before != after {
                            let delta = i128::from(after) - i128::from(before);
                            let _ = write!(line, ", rows {before} -> {after} ({delta:+})");
                        }
                    }
                    if expected.columns != actual.columns {
                        line.push_str(", columns differ");
                    }
                    if expected.size_bytes != actual.size_bytes {
                        let _ = write!(line, ", size {} -> {}", expected.size_bytes, actual.size_bytes);
                    }
                }
                line.push(')');
                line
            }
        }
    }
}

/// Outcome of an output validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    /// `true` if no file was added, removed or changed.
    pub success: bool,
    /// Counts plus one line per differing file.
    pub summary: String,
    /// Differing files in path order.
    pub file_diffs: Vec<FileDiff>,
}

impl ValidationResult {
    /// Renders the result; `verbose` appends line diffs where available.
    #[must_use]
    pub fn format_output(&self, verbose: bool) -> String {
        let mut out = self.summary.clone();
        if verbose {
            for diff in &self.file_diffs {
                if let Some(text) = &diff.unified_diff {
                    let _ = write!(out, "\n\n{text}");
                }
            }
        }
        out
    }

    /// Converts a failed validation into an assertion failure; line diffs
    /// are included only when `verbose`.
    ///
    /// # Errors
    ///
    /// Returns [`AssertionFailure::OutputMismatch`] when `success` is false.
    pub fn check(&self, verbose: bool) -> Result<(), AssertionFailure> {
        if self.success {
            Ok(())
        } else {
            Err(AssertionFailure::OutputMismatch { details: self.format_output(verbose) })
        }
    }
}

pub(super) fn compare(
    expected: &Snapshot,
    actual: &Snapshot,
    verbose: bool,
    sources: Option<&DiffSources>,
) -> ValidationResult {
    let mut paths: Vec<&String> = expected.files().keys().chain(actual.files().keys()).collect();
    paths.sort();
    paths.dedup();

    let mut file_diffs = Vec::new();
    for path in paths {
        let before = expected.get(path);
        let after = actual.get(path);
        let kind = match (before, after) {
            (Some(_), None) => FileDiffKind::Removed,
            (None, Some(_)) => FileDiffKind::Added,
            (Some(b), Some(a)) if b.hash != a.hash => FileDiffKind::Changed,
            _ => continue,
        };
        let unified_diff = match (verbose, kind, sources) {
            (true, FileDiffKind::Changed, Some(sources)) => Some(line_diff(path, sources)),
            _ => None,
        };
        file_diffs.push(FileDiff {
            path: path.clone(),
            kind,
            expected: before.cloned(),
            actual: after.cloned(),
            unified_diff,
        });
    }

    let summary = summarize(expected, &file_diffs);
    ValidationResult { success: file_diffs.is_empty(), summary, file_diffs }
}

fn summarize(expected: &Snapshot, diffs: &[FileDiff]) -> String {
    if diffs.is_empty() {
        return format!("output matches snapshot ({} file(s))", expected.len());
    }
    let count = |kind: FileDiffKind| diffs.iter().filter(|d| d.kind == kind).count();
    let mut summary = format!(
        "output differs from snapshot: {} added, {} removed, {} changed",
        count(FileDiffKind::Added),
        count(FileDiffKind::Removed),
        count(FileDiffKind::Changed),
    );
    for diff in diffs {
        let _ = write!(summary, "\n  {}", diff.describe());
    }
    summary
}

fn line_diff(path: &str, sources: &DiffSources) -> String {
    let read = |root: &PathBuf| std::fs::read(resolve_relative(root, path));
    let (Ok(before), Ok(after)) = (read(&sources.expected_root), read(&sources.actual_root)) else {
        return format!("{path}: content unavailable for diff");
    };
    let (Some(before), Some(after)) = (as_text(&before), as_text(&after)) else {
        return format!("Binary files expected/{path} and actual/{path} differ");
    };
    TextDiff::from_lines(before, after)
        .unified_diff()
        .context_radius(3)
        .header(&format!("expected/{path}"), &format!("actual/{path}"))
        .to_string()
}

fn as_text(bytes: &[u8]) -> Option<&str> {
    if bytes.contains(&0) {
        return None;
    }
    std::str::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::OutputSnapshot;
    use std::collections::BTreeMap;
    use std::fmt::Write as _;

    fn csv_rows(n: usize) -> String {
        let mut s = String::from("id,value\n");
        for i in 0..n {
            let _ = writeln!(s, "{i},{}", i * 2);
        }
        s
    }

    fn snapshot(files: &[(&str, &[u8])]) -> Snapshot {
        Snapshot::from_files(
            files
                .iter()
                .map(|(p, b)| ((*p).to_string(), FileRecord::from_bytes(b, p.ends_with(".csv"))))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn identical_trees_succeed() {
        let a = snapshot(&[("x.txt", &b"same"[..])]);
        let result = OutputSnapshot::default().compare(&a, &a.clone(), false);
        assert!(result.success);
        assert!(result.check(false).is_ok());
        assert_eq!(result.summary, "output matches snapshot (1 file(s))");
    }

    #[test]
    fn same_size_different_bytes_is_changed() {
        let expected = snapshot(&[("x.txt", &b"abcd"[..])]);
        let actual = snapshot(&[("x.txt", &b"abce"[..])]);
        let result = OutputSnapshot::default().compare(&expected, &actual, false);
        assert!(!result.success);
        assert_eq!(result.file_diffs[0].kind, FileDiffKind::Changed);
    }

    #[test]
    fn added_removed_and_row_delta_summary() {
        let before = csv_rows(149);
        let after = csv_rows(174);
        let expected = snapshot(&[("main.csv", before.as_bytes()), ("old.txt", &b"o"[..])]);
        let actual = snapshot(&[("main.csv", after.as_bytes()), ("new.txt", &b"n"[..])]);

        let result = OutputSnapshot::default().compare(&expected, &actual, false);
        assert!(!result.success);
        assert!(result.summary.contains("1 added, 1 removed, 1 changed"), "{}", result.summary);
        assert!(result.summary.contains("main.csv (changed, rows 150 -> 175 (+25)"), "{}", result.summary);
        assert!(matches!(result.check(false), Err(AssertionFailure::OutputMismatch { .. })));
        let kinds: Vec<FileDiffKind> = result.file_diffs.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![FileDiffKind::Changed, FileDiffKind::Added, FileDiffKind::Removed]);
    }

    #[test]
    fn verbose_with_sources_renders_unified_diff() {
        let expected_dir = tempfile::tempdir().unwrap();
        let actual_dir = tempfile::tempdir().unwrap();
        std::fs::write(expected_dir.path().join("r.txt"), "a\nb\nc\n").unwrap();
        std::fs::write(actual_dir.path().join("r.txt"), "a\nB\nc\n").unwrap();
        std::fs::write(expected_dir.path().join("blob.bin"), [0_u8, 1, 2]).unwrap();
        std::fs::write(actual_dir.path().join("blob.bin"), [0_u8, 1, 3]).unwrap();

        let snap = OutputSnapshot::default();
        let expected = snap.capture(expected_dir.path()).unwrap();
        let actual = snap.capture(actual_dir.path()).unwrap();
        let sources = DiffSources {
            expected_root: expected_dir.path().to_path_buf(),
            actual_root: actual_dir.path().to_path_buf(),
        };

        let result = snap.compare_with_sources(&expected, &actual, true, &sources);
        let text = result.format_output(true);
        assert!(text.contains("--- expected/r.txt"), "{text}");
        assert!(text.contains("-b\n"), "{text}");
        assert!(text.contains("+B\n"), "{text}");
        assert!(text.contains("Binary files expected/blob.bin and actual/blob.bin differ"), "{text}");

        let concise = snap.compare_with_sources(&expected, &actual, false, &sources);
        assert!(concise.file_diffs.iter().all(|d| d.unified_diff.is_none()));

        let Err(AssertionFailure::OutputMismatch { details }) = result.check(false) else {
            panic!("expected an output mismatch");
        };
        assert!(details.contains("2 changed"), "{details}");
        assert!(!details.contains("--- expected/r.txt"), "{details}");
        let Err(AssertionFailure::OutputMismatch { details }) = result.check(true) else {
            panic!("expected an output mismatch");
        };
        assert!(details.contains("--- expected/r.txt"), "{details}");
    }
}
