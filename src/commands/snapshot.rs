//! `replay-harness snapshot` command.

use std::path::Path;

use crate::fixture::FixtureLayout;
use crate::snapshot::OutputSnapshot;

/// Fingerprints `output` into the fixture's snapshot file.
///
/// # Errors
///
/// Returns an error string if the tree cannot be read or the snapshot
/// cannot be written.
pub fn run(fixture: &Path, output: &Path) -> Result<(), String> {
    let layout = FixtureLayout::new(fixture);
    let target = layout.output_snapshot();
    let snapshot = OutputSnapshot::default().capture_to(output, &target).map_err(|e| e.to_string())?;
    println!("Saved snapshot of {} file(s) to {}", snapshot.len(), target.display());
    Ok(())
}
