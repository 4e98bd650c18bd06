//! Positional comparison of recorded and replayed run results.

use std::fmt::Write as _;

use serde::Serialize;

use super::normalize::{normalize, Normalizer};
use crate::capture::logs::{CapturedLog, ComponentRunResult};
use crate::error::AssertionFailure;

/// One position where the two log sequences disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageDiff {
    /// Zero-based position in the sequences.
    pub index: usize,
    /// Recorded entry at `index`, message normalized; `None` past its end.
    pub expected: Option<CapturedLog>,
    /// Replayed entry at `index`, message normalized; `None` past its end.
    pub actual: Option<CapturedLog>,
    /// Extra context, e.g. the trailing-message count on a length mismatch.
    pub note: Option<String>,
}

/// Outcome of comparing two runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogComparisonResult {
    /// `true` only if exit codes are equal and no message differs.
    pub success: bool,
    /// Exit codes compared for exact equality.
    pub exit_code_match: bool,
    /// Recorded exit code.
    pub recorded_exit_code: Option<i32>,
    /// Replayed exit code.
    pub replayed_exit_code: Option<i32>,
    /// Differences in position order.
    pub message_diffs: Vec<MessageDiff>,
    /// One-line description of the outcome.
    pub summary: String,
}

impl LogComparisonResult {
    /// Renders the result for humans; `verbose` adds every differing entry.
    #[must_use]
    pub fn format_output(&self, verbose: bool) -> String {
        let mut out = self.summary.clone();
        if !verbose {
            if !self.message_diffs.is_empty() {
                out.push_str("\n(run with --verbose for message details)");
            }
            return out;
        }
        for diff in &self.message_diffs {
            let _ = write!(out, "\n  [{}]", diff.index);
            if let Some(note) = &diff.note {
                let _ = write!(out, " {note}");
            }
            let _ = write!(out, "\n    - recorded: {}", render(diff.expected.as_ref()));
            let _ = write!(out, "\n    + replayed: {}", render(diff.actual.as_ref()));
        }
        out
    }

    /// Converts a failed comparison into an assertion failure whose details
    /// are the concise summary, or every differing entry when `verbose`.
    ///
    /// # Errors
    ///
    /// Returns [`AssertionFailure::ExitCodeMismatch`] if exit codes differ,
    /// otherwise [`AssertionFailure::LogMismatch`] if any message differs.
    pub fn check(&self, verbose: bool) -> Result<(), AssertionFailure> {
        if !self.exit_code_match {
            return Err(AssertionFailure::ExitCodeMismatch {
                recorded: self.recorded_exit_code,
                replayed: self.replayed_exit_code,
                details: self.format_output(verbose),
            });
        }
        if !self.message_diffs.is_empty() {
            return Err(AssertionFailure::LogMismatch { details: self.format_output(verbose) });
        }
        Ok(())
    }
}

fn render(log: Option<&CapturedLog>) -> String {
    match log {
        Some(log) => format!("{} {}: {}", log.level, log.logger_name, log.message),
        None => "<none>".to_string(),
    }
}

fn exit_label(code: Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

/// Compares run results after normalizing messages.
#[derive(Debug, Clone, Default)]
pub struct LogComparator {
    extra: Vec<Normalizer>,
}

impl LogComparator {
    /// Comparator using the built-in normalizers, then `extra` in order.
    #[must_use]
    pub fn new(extra: Vec<Normalizer>) -> Self {
        Self { extra }
    }

    fn normalized(&self, log: &CapturedLog) -> CapturedLog {
        CapturedLog {
            level: log.level.clone(),
            logger_name: log.logger_name.clone(),
            message: normalize(&log.message, &self.extra),
        }
    }

    /// Compares exit codes exactly and logs position by position.
    #[must_use]
    pub fn compare(&self, recorded: &ComponentRunResult, replayed: &ComponentRunResult) -> LogComparisonResult {
        let exit_code_match = recorded.exit_code == replayed.exit_code;
        let mut message_diffs = Vec::new();

        for (index, (expected, actual)) in recorded.logs.iter().zip(&replayed.logs).enumerate() {
            let expected = self.normalized(expected);
            let actual = self.normalized(actual);
            if expected != actual {
                message_diffs.push(MessageDiff {
                    index,
                    expected: Some(expected),
                    actual: Some(actual),
                    note: None,
                });
            }
        }

        let (shorter, longer) = (
            recorded.logs.len().min(replayed.logs.len()),
            recorded.logs.len().max(replayed.logs.len()),
        );
        if shorter != longer {
            let extra = longer - shorter;
            let side = if recorded.logs.len() > replayed.logs.len() { "recorded" } else { "replayed" };
            message_diffs.push(MessageDiff {
                index: shorter,
                expected: recorded.logs.get(shorter).map(|l| self.normalized(l)),
                actual: replayed.logs.get(shorter).map(|l| self.normalized(l)),
                note: Some(format!("{extra} extra trailing message(s) in {side}")),
            });
        }

        let success = exit_code_match && message_diffs.is_empty();
        let summary = if success {
            format!(
                "logs match: {} message(s), exit code {}",
                recorded.logs.len(),
                exit_label(recorded.exit_code)
            )
        } else {
            let mut parts = Vec::new();
            if !exit_code_match {
                parts.push(format!(
                    "exit code mismatch: recorded {}, replayed {}",
                    exit_label(recorded.exit_code),
                    exit_label(replayed.exit_code)
                ));
            }
            if !message_diffs.is_empty() {
                parts.push(format!("{} log difference(s)", message_diffs.len()));
            }
            parts.join("; ")
        };

        LogComparisonResult {
            success,
            exit_code_match,
            recorded_exit_code: recorded.exit_code,
            replayed_exit_code: replayed.exit_code,
            message_diffs,
            summary,
        }
    }
}

/// Compares two run results with the built-ins plus `extra` normalizers.
#[must_use]
pub fn compare_logs(
    recorded: &ComponentRunResult,
    replayed: &ComponentRunResult,
    extra: &[Normalizer],
) -> LogComparisonResult {
    LogComparator::new(extra.to_vec()).compare(recorded, replayed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(exit_code: Option<i32>, messages: &[&str]) -> ComponentRunResult {
        ComponentRunResult::new(
            exit_code,
            messages.iter().map(|m| CapturedLog::new("INFO", "app", *m)).collect(),
        )
    }

    #[test]
    fn messages_differing_only_in_timestamp_match() {
        let result = compare_logs(
            &run(None, &["Finished at 2025-01-01T12:00:00"]),
            &run(None, &["Finished at 2025-01-01T12:00:05"]),
            &[],
        );
        assert!(result.success, "{}", result.format_output(true));
        assert!(result.check(false).is_ok());
    }

    #[test]
    fn exit_code_mismatch_fails_despite_identical_logs() {
        let result = compare_logs(&run(Some(1), &["same"]), &run(Some(0), &["same"]), &[]);
        assert!(!result.success);
        assert!(!result.exit_code_match);
        assert!(result.message_diffs.is_empty());
        assert!(result.summary.contains("recorded 1, replayed 0"));
        assert!(matches!(
            result.check(false),
            Err(AssertionFailure::ExitCodeMismatch { recorded: Some(1), replayed: Some(0), .. })
        ));
    }

    #[test]
    fn level_and_logger_participate() {
        let recorded = ComponentRunResult::new(None, vec![CapturedLog::new("INFO", "app", "x")]);
        let replayed = ComponentRunResult::new(None, vec![CapturedLog::new("WARN", "app", "x")]);
        let result = compare_logs(&recorded, &replayed, &[]);
        assert_eq!(result.message_diffs.len(), 1);
        assert!(matches!(result.check(false), Err(AssertionFailure::LogMismatch { .. })));
    }

    #[test]
    fn length_mismatch_reports_first_divergent_index() {
        let result = compare_logs(&run(None, &["a", "b", "c", "d"]), &run(None, &["a", "b"]), &[]);
        assert_eq!(result.message_diffs.len(), 1);
        let diff = &result.message_diffs[0];
        assert_eq!(diff.index, 2);
        assert_eq!(diff.expected.as_ref().map(|l| l.message.as_str()), Some("c"));
        assert_eq!(diff.actual, None);
        assert_eq!(diff.note.as_deref(), Some("2 extra trailing message(s) in recorded"));
    }

    #[test]
    fn verbose_output_lists_entries() {
        let result = compare_logs(&run(None, &["alpha"]), &run(None, &["beta"]), &[]);
        let concise = result.format_output(false);
        assert!(!concise.contains("alpha"));
        let verbose = result.format_output(true);
        assert!(verbose.contains("- recorded: INFO app: alpha"));
        assert!(verbose.contains("+ replayed: INFO app: beta"));
    }

    #[test]
    fn check_details_follow_verbosity() {
        let result = compare_logs(&run(None, &["alpha"]), &run(None, &["beta"]), &[]);
        let Err(AssertionFailure::LogMismatch { details }) = result.check(false) else {
            panic!("expected a log mismatch");
        };
        assert!(!details.contains("alpha"), "{details}");
        assert!(details.contains("--verbose"), "{details}");

        let Err(AssertionFailure::LogMismatch { details }) = result.check(true) else {
            panic!("expected a log mismatch");
        };
        assert!(details.contains("- recorded: INFO app: alpha"), "{details}");
    }
}
