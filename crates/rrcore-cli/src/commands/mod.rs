mod init;
mod inspect;
mod stats;
mod verify;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rrcore_ledger::RunLayout;

use crate::cli::Commands;

pub fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Init { dir } => init::run(&dir),
        Commands::Inspect { run_dir } => inspect::run(&run_dir),
        Commands::Verify { run_dir } => verify::run(&run_dir),
        Commands::Stats { run_dir } => stats::run(&run_dir),
    }
}

/// Reconstructs the `RunLayout` for an already-existing run directory.
/// `RunLayout::new` takes a ledger root plus a run ID and joins them, so a
/// `run_dir` argument splits back into `(parent, file_name)` to recover the
/// same path `RunLayout` would have produced at record time.
fn layout_for(run_dir: &Path) -> Result<RunLayout> {
    if !run_dir.is_dir() {
        bail!("{} is not a directory", run_dir.display());
    }
    let run_id = run_dir
        .file_name()
        .context("run directory has no final path component")?
        .to_string_lossy()
        .into_owned();
    let ledger_root: PathBuf = run_dir
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(RunLayout::new(&ledger_root, &run_id))
}
