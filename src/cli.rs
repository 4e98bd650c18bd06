//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Top-level CLI parser for `replay-harness`.
#[derive(Debug, Parser)]
#[command(
    name = "replay-harness",
    version,
    about = "Snapshot outputs and compare recorded runs of a component under test"
)]
pub struct Cli {
    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fingerprint an output directory into the fixture's `output_snapshot.json`.
    Snapshot {
        /// Fixture directory.
        fixture: PathBuf,
        /// Output directory produced by the component.
        #[arg(long)]
        output: PathBuf,
    },
    /// Compare an output directory against the fixture's snapshot.
    Validate {
        /// Fixture directory.
        fixture: PathBuf,
        /// Output directory produced by the component.
        #[arg(long)]
        output: PathBuf,
        /// Directory the snapshot was taken from, for line diffs.
        #[arg(long)]
        expected: Option<PathBuf>,
        /// Show line-level diffs of changed files.
        #[arg(long, short)]
        verbose: bool,
    },
    /// Compare two captured log files (`logs.json`).
    CompareLogs {
        /// Log file from the recorded run.
        recorded: PathBuf,
        /// Log file from the replayed run.
        replayed: PathBuf,
        /// `harness.yaml` whose extra normalizers apply.
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Show every differing entry.
        #[arg(long, short)]
        verbose: bool,
    },
}

impl Command {
    /// Whether the user asked for verbose output.
    #[must_use]
    pub fn verbose(&self) -> bool {
        match self {
            Self::Snapshot { .. } => false,
            Self::Validate { verbose, .. } | Self::CompareLogs { verbose, .. } => *verbose,
        }
    }
}
