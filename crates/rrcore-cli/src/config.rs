//! Loads the `record-replay.toml` config file that `init` writes into a
//! ledger root (SPEC_FULL.md §6.7). `LedgerConfig` already carries
//! `#[serde(deny_unknown_fields, default)]`, so it is the TOML schema
//! directly — no separate wrapper struct.

use std::path::Path;

use rrcore_types::{CoreError, ErrorCode, LedgerConfig, Result};

pub const CONFIG_FILE_NAME: &str = "record-replay.toml";

/// Load the config file from `ledger_root` if present, falling back to
/// `LedgerConfig::default()` when it doesn't exist yet.
pub fn load_config(ledger_root: &Path) -> Result<LedgerConfig> {
    let path = ledger_root.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(LedgerConfig::default());
    }
    let text = std::fs::read_to_string(&path)
        .map_err(|e| CoreError::io(format!("reading {}", path.display()), e))?;
    let config: LedgerConfig = toml::from_str(&text)
        .map_err(|e| CoreError::new(ErrorCode::Config, format!("{}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

/// Write `config` into `ledger_root` as `record-replay.toml`. Used by `init`
/// to seed a fresh ledger with the documented defaults.
pub fn write_default_config(ledger_root: &Path, config: &LedgerConfig) -> Result<()> {
    let path = ledger_root.join(CONFIG_FILE_NAME);
    let text = toml::to_string_pretty(config)
        .map_err(|e| CoreError::new(ErrorCode::Config, format!("serializing default config: {e}")))?;
    std::fs::write(&path, text)
        .map_err(|e| CoreError::io(format!("writing {}", path.display()), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_yields_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let config = load_config(temp.path()).unwrap();
        assert_eq!(config.max_segment_size_mb, LedgerConfig::default().max_segment_size_mb);
    }

    #[test]
    fn written_config_round_trips() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = LedgerConfig::default();
        config.max_segment_size_mb = 50;
        write_default_config(temp.path(), &config).unwrap();

        let loaded = load_config(temp.path()).unwrap();
        assert_eq!(loaded.max_segment_size_mb, 50);
    }
}
