//! Binary entrypoint for the `replay-harness` CLI.

use std::process::ExitCode;

fn main() -> ExitCode {
    match replay_harness::run(std::env::args()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
