//! `replay-harness validate` command.

use std::path::Path;

use crate::fixture::FixtureLayout;
use crate::snapshot::{DiffSources, OutputSnapshot, Snapshot};

/// Compares `output` against the fixture's stored snapshot.
///
/// # Errors
///
/// Returns an error string if the snapshot cannot be loaded, the tree cannot
/// be read, or the tree does not match.
pub fn run(fixture: &Path, output: &Path, expected: Option<&Path>, verbose: bool) -> Result<(), String> {
    let layout = FixtureLayout::new(fixture);
    let stored = Snapshot::load(&layout.output_snapshot()).map_err(|e| e.to_string())?;
    let snapshotter = OutputSnapshot::default();
    let actual = snapshotter.capture(output).map_err(|e| e.to_string())?;

    let result = match expected {
        Some(expected_root) => {
            let sources = DiffSources {
                expected_root: expected_root.to_path_buf(),
                actual_root: output.to_path_buf(),
            };
            snapshotter.compare_with_sources(&stored, &actual, verbose, &sources)
        }
        None => snapshotter.compare(&stored, &actual, verbose),
    };

    if result.success {
        println!("{}", result.summary);
        Ok(())
    } else {
        Err(result.format_output(verbose))
    }
}
