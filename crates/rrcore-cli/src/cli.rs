use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "rrcore", version, about = "Inspect and verify record/replay ledgers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an empty ledger root with a default `record-replay.toml`.
    Init {
        /// Directory to create. Must not already exist.
        dir: PathBuf,
    },
    /// Print a run's manifest and per-segment stats.
    Inspect {
        /// Path to a single run's directory (e.g. `<ledger-root>/<run-id>`).
        run_dir: PathBuf,
    },
    /// Re-check a run's segment and manifest integrity without replaying it.
    Verify {
        /// Path to a single run's directory.
        run_dir: PathBuf,
    },
    /// Print an event-type histogram and stream completeness for a run.
    Stats {
        /// Path to a single run's directory.
        run_dir: PathBuf,
    },
}
