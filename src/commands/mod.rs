//! Command dispatch and handlers.

pub mod compare_logs;
pub mod snapshot;
pub mod validate;

use crate::cli::Command;

/// Dispatch a parsed command to its handler.
///
/// # Errors
///
/// Returns an error string if the selected command fails or reports a
/// mismatch.
pub fn dispatch(command: &Command) -> Result<(), String> {
    match command {
        Command::Snapshot { fixture, output } => snapshot::run(fixture, output),
        Command::Validate { fixture, output, expected, verbose } => {
            validate::run(fixture, output, expected.as_deref(), *verbose)
        }
        Command::CompareLogs { recorded, replayed, settings, verbose } => {
            compare_logs::run(recorded, replayed, settings.as_deref(), *verbose)
        }
    }
}
