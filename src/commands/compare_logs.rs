//! `replay-harness compare-logs` command.

use std::path::Path;

use crate::capture::ComponentRunResult;
use crate::compare::LogComparator;
use crate::settings::HarnessSettings;

/// Compares two `logs.json` files.
///
/// # Errors
///
/// Returns an error string if a file cannot be loaded, the settings are
/// invalid, or the runs differ.
pub fn run(recorded: &Path, replayed: &Path, settings: Option<&Path>, verbose: bool) -> Result<(), String> {
    let extra = match settings {
        Some(path) => HarnessSettings::load(path)
            .and_then(|s| s.normalizers())
            .map_err(|e| e.to_string())?,
        None => Vec::new(),
    };
    let recorded = ComponentRunResult::load(recorded).map_err(|e| e.to_string())?;
    let replayed = ComponentRunResult::load(replayed).map_err(|e| e.to_string())?;

    let result = LogComparator::new(extra).compare(&recorded, &replayed);
    if result.success {
        println!("{}", result.summary);
        Ok(())
    } else {
        Err(result.format_output(verbose))
    }
}

#[cfg(test)]
mod tests {
    use super::run;
    use crate::capture::{CapturedLog, ComponentRunResult};

    #[test]
    fn timestamps_are_normalized_but_exit_codes_are_not() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        let c = dir.path().join("c.json");
        ComponentRunResult::new(None, vec![CapturedLog::new("INFO", "app", "at 2025-01-01T12:00:00")])
            .save(&a)
            .unwrap();
        ComponentRunResult::new(None, vec![CapturedLog::new("INFO", "app", "at 2025-01-01T12:00:05")])
            .save(&b)
            .unwrap();
        ComponentRunResult::new(Some(1), vec![CapturedLog::new("INFO", "app", "at 2025-01-01T12:00:05")])
            .save(&c)
            .unwrap();

        assert!(run(&a, &b, None, false).is_ok());
        let err = run(&a, &c, None, false).unwrap_err();
        assert!(err.contains("exit code mismatch"), "{err}");
    }

    #[test]
    fn settings_add_normalizers() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.json");
        let b = dir.path().join("b.json");
        let settings = dir.path().join("harness.yaml");
        ComponentRunResult::new(None, vec![CapturedLog::new("INFO", "app", "job job-1a2b3c4d")]).save(&a).unwrap();
        ComponentRunResult::new(None, vec![CapturedLog::new("INFO", "app", "job job-99ffee00")]).save(&b).unwrap();
        std::fs::write(&settings, "normalizers:\n  - { pattern: \"job-[0-9a-f]{8}\", replacement: \"<JOB>\" }\n")
            .unwrap();

        assert!(run(&a, &b, None, false).is_err());
        assert!(run(&a, &b, Some(&settings), false).is_ok());
    }
}
