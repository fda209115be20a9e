use std::path::Path;

use anyhow::{bail, Context, Result};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use rrcore_types::LedgerConfig;

use crate::config;

pub fn run(dir: &Path) -> Result<()> {
    if dir.exists() {
        let has_entries = std::fs::read_dir(dir)
            .with_context(|| format!("reading {}", dir.display()))?
            .next()
            .is_some();
        if has_entries {
            bail!("{} already exists and is not empty", dir.display());
        }
    } else {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let defaults = LedgerConfig::default();
    config::write_default_config(dir, &defaults)?;
    tracing::info!(dir = %dir.display(), "initialized ledger root");

    let message = format!("initialized ledger root at {}", dir.display());
    if std::io::stdout().is_terminal() {
        println!("{}", message.green());
    } else {
        println!("{message}");
    }
    Ok(())
}
