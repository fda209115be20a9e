use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use rrcore_ledger::{read_manifest, read_segment};

use super::layout_for;

pub fn run(run_dir: &Path) -> Result<()> {
    let layout = layout_for(run_dir)?;
    let manifest = read_manifest(&layout).context("reading manifest")?;
    tracing::debug!(run_id = %manifest.run_id, "computing stats");

    let mut histogram: BTreeMap<&'static str, u64> = BTreeMap::new();
    for path in layout.list_segment_paths().context("listing segments")? {
        let contents = read_segment(&path, manifest.compression)
            .with_context(|| format!("reading segment {}", path.display()))?;
        for event in &contents.events {
            *histogram.entry(event.event_type.as_str()).or_insert(0) += 1;
        }
    }

    println!("{}", "event-type histogram".bold());
    if histogram.is_empty() {
        println!("  (no events)");
    }
    for (event_type, count) in &histogram {
        println!("  {event_type:<20} {count:>8}");
    }

    println!();
    println!("{}", "stream completeness".bold());
    println!("  total_chunks:       {}", manifest.total_chunks);
    if manifest.incomplete_streams.is_empty() {
        println!("  {}", "all streams finalized".green());
    } else {
        println!(
            "  {} {} stream(s) never finalized: {:?}",
            "warning:".yellow(),
            manifest.incomplete_streams.len(),
            manifest.incomplete_streams
        );
    }

    Ok(())
}
