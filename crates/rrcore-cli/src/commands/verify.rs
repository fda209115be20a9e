use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use owo_colors::OwoColorize;
use rrcore_ledger::{hash_file, read_manifest, read_segment};

use super::layout_for;
use crate::config;

/// Re-checks a run's integrity without loading a Player index: every segment
/// is re-read (which recomputes its rolling hash and record count against
/// the trailer, per `read_segment`), and every file the manifest lists is
/// re-hashed and compared against the stored `FileEntry`.
pub fn run(run_dir: &Path) -> Result<()> {
    let layout = layout_for(run_dir)?;
    let manifest = read_manifest(&layout).context("reading manifest")?;
    tracing::debug!(run_id = %manifest.run_id, "verifying run");

    warn_on_config_drift(run_dir, &manifest);

    let mut failures = Vec::new();

    let segment_paths = layout.list_segment_paths().context("listing segments")?;
    for path in &segment_paths {
        if let Err(err) = read_segment(path, manifest.compression) {
            failures.push(format!("{}: {err}", path.display()));
        }
    }

    for entry in &manifest.files {
        let path = layout.root().join(&entry.path);
        match hash_file(&path) {
            Ok(actual) if actual.blake3 == entry.blake3 && actual.size == entry.size => {}
            Ok(actual) => failures.push(format!(
                "{}: expected blake3={} size={}, got blake3={} size={}",
                entry.path, entry.blake3, entry.size, actual.blake3, actual.size
            )),
            Err(err) => failures.push(format!("{}: {err}", entry.path)),
        }
    }

    if failures.is_empty() {
        println!("{}", format!("{} ok: integrity verified", manifest.run_id).green());
        Ok(())
    } else {
        println!("{}", "integrity check failed:".red().bold());
        for failure in &failures {
            println!("  {} {failure}", "✗".red());
        }
        bail!("{} of {} checks failed", failures.len(), segment_paths.len() + manifest.files.len());
    }
}

/// The manifest records the SHA256 digest of the `LedgerConfig` a run was
/// closed under (spec.md §3.4). A mismatch against the ledger root's current
/// `record-replay.toml` means the run was recorded under different settings
/// than whatever a replay would load today — worth surfacing, but not itself
/// evidence of on-disk corruption, so it only warns.
fn warn_on_config_drift(run_dir: &Path, manifest: &rrcore_types::Manifest) {
    let ledger_root: PathBuf = run_dir.parent().map(Path::to_path_buf).unwrap_or_default();
    let Ok(config) = config::load_config(&ledger_root) else {
        return;
    };
    let current_digest = rrcore_core::config_digest(&config);
    if current_digest != manifest.config_digest {
        tracing::warn!(
            run_id = %manifest.run_id,
            "config digest differs from the run's recorded config"
        );
        println!(
            "  {} config_digest differs from {}'s current record-replay.toml",
            "warning:".yellow(),
            ledger_root.display()
        );
    }
}
