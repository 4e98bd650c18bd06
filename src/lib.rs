//! Deterministic record/replay harness for components that talk HTTP.
//!
//! A component runs once in record mode against the real network; its
//! traffic is sanitized and stored as a cassette next to its logs, exit
//! code and output snapshot. Later runs replay the cassette with a frozen
//! clock and are compared against what was recorded.
//!
//! ```no_run
//! use replay_harness::capture::{ComponentContext, ComponentExit, RunCapture, RunMode};
//! use replay_harness::fixture::FixtureLayout;
//! use replay_harness::ports::HttpRequest;
//!
//! let mut component = |ctx: &ComponentContext| -> Result<(), ComponentExit> {
//!     let status = ctx
//!         .send(&HttpRequest::get("https://api.example.com/v1/status"))
//!         .map_err(|_| ComponentExit::new(1))?;
//!     tracing::info!("status {}", status.body);
//!     Ok(())
//! };
//!
//! let fixture = FixtureLayout::new("tests/fixtures/status");
//! let outcome = RunCapture::from_fixture(fixture, RunMode::Auto)?.run(&mut component)?;
//! assert_eq!(outcome.result.exit_code, None);
//! # Ok::<(), replay_harness::error::HarnessError>(())
//! ```

pub mod adapters;
pub mod capture;
pub mod cassette;
pub mod cli;
pub mod commands;
pub mod compare;
pub mod config;
pub mod error;
pub mod fixture;
pub mod logging;
pub mod persist;
pub mod ports;
pub mod sanitize;
pub mod secrets;
pub mod settings;
pub mod snapshot;

use clap::Parser;

/// Run the CLI with the provided arguments.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or command execution fails.
pub fn run<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Cli::try_parse_from(args).map_err(|err| err.to_string())?;
    logging::init(cli.command.verbose());
    commands::dispatch(&cli.command)
}

#[cfg(test)]
mod tests {
    use super::run;

    #[test]
    fn run_errors_on_unknown_subcommand() {
        let result = run(["replay-harness", "unknown"]);
        assert!(result.is_err());
    }

    #[test]
    fn run_executes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out");
        std::fs::create_dir_all(&output).unwrap();
        let fixture = dir.path().join("fx");
        let result = run([
            "replay-harness",
            "snapshot",
            fixture.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
        ]);
        assert!(result.is_ok(), "{result:?}");
        assert!(fixture.join("output_snapshot.json").is_file());
    }
}
