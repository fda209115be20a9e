use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use rrcore_ledger::{read_manifest, read_segment};

use super::layout_for;

pub fn run(run_dir: &Path) -> Result<()> {
    let layout = layout_for(run_dir)?;
    let manifest = read_manifest(&layout).context("reading manifest")?;
    tracing::debug!(run_id = %manifest.run_id, "inspecting run");

    println!("{}", "manifest".bold());
    println!("  run_id:          {}", manifest.run_id);
    println!("  adapter:         {} ({})", manifest.adapter, manifest.adapter_version);
    println!("  schema_version:  {}", manifest.schema_version);
    println!("  created_at:      {}", manifest.created_at);
    match &manifest.closed_at {
        Some(closed_at) => println!("  closed_at:       {closed_at}"),
        None => println!("  closed_at:       {}", "(run not closed)".yellow()),
    }
    println!("  config_digest:   {}", manifest.config_digest);
    println!("  compression:     {:?}", manifest.compression);
    println!("  total_events:    {}", manifest.total_events);
    println!("  redaction:       {}", manifest.redaction_applied);
    if !manifest.incomplete_streams.is_empty() {
        println!(
            "  {} {} incomplete stream(s): {:?}",
            "warning:".yellow(),
            manifest.incomplete_streams.len(),
            manifest.incomplete_streams
        );
    }

    println!();
    println!("{}", "segments".bold());
    let segment_paths = layout.list_segment_paths().context("listing segments")?;
    if segment_paths.is_empty() {
        println!("  (none)");
    }
    for path in &segment_paths {
        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let record_count = read_segment(path, manifest.compression)
            .map(|contents| contents.trailer.record_count)
            .unwrap_or(0);
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        println!("  {name:<28} {size:>10} bytes   {record_count:>6} records");
    }

    Ok(())
}
