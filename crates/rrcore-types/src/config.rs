use serde::{Deserialize, Serialize};

use crate::error::{CoreError, ErrorCode};
use crate::manifest::Compression;

/// `{fail_fast, block}` per spec.md §6.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueFullPolicy {
    FailFast,
    Block,
}

impl Default for QueueFullPolicy {
    fn default() -> Self {
        QueueFullPolicy::FailFast
    }
}

/// `{strict, warn, hybrid}` per spec.md §4.7, §6.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayMode {
    Strict,
    Warn,
    Hybrid,
}

impl Default for ReplayMode {
    fn default() -> Self {
        ReplayMode::Strict
    }
}

/// One ordered redaction rule (spec.md §4.9, §6.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionRule {
    pub id: String,
    pub pattern: String,
    pub replacement: String,
}

/// The closed set of recognized options (spec.md §6.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LedgerConfig {
    pub compression: Compression,
    pub max_segment_size_mb: u32,
    pub write_queue_capacity: usize,
    pub queue_full_policy: QueueFullPolicy,
    pub replay_mode: ReplayMode,
    pub preserve_timing: bool,
    pub volatile_field_paths: Vec<String>,
    pub redaction_rules: Vec<RedactionRule>,
    pub max_preview_bytes: usize,
    /// Outputs at or above this size are offloaded to `outputs/<id>.bin`
    /// instead of inlined in the ledger (SPEC_FULL.md §3 supplement).
    pub inline_output_threshold_bytes: usize,
    /// Upper bound on a single `preserve_timing` sleep between stream chunks
    /// (SPEC_FULL.md §9 resolution #3).
    pub max_chunk_wait_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            compression: Compression::Zstd,
            max_segment_size_mb: 100,
            write_queue_capacity: 65_536,
            queue_full_policy: QueueFullPolicy::FailFast,
            replay_mode: ReplayMode::Strict,
            preserve_timing: true,
            volatile_field_paths: default_volatile_field_paths(),
            redaction_rules: Vec::new(),
            max_preview_bytes: 2048,
            inline_output_threshold_bytes: 64 * 1024,
            max_chunk_wait_ms: 5000,
        }
    }
}

/// Conservative default volatile-field list (SPEC_FULL.md §4.1 supplement).
/// Adapters extend, never shrink, this list. A leading `*` is a suffix
/// wildcard (`*_at` matches any key ending in `_at`); the normalizer further
/// gates `id`, `uuid`, and `*_id` entries on the value actually looking like
/// a UUID, so a stable business field merely named `id` survives.
pub fn default_volatile_field_paths() -> Vec<String> {
    vec![
        "timestamp".to_string(),
        "created_at".to_string(),
        "updated_at".to_string(),
        "*_at".to_string(),
        "id".to_string(),
        "uuid".to_string(),
        "*_id".to_string(),
        "request_id".to_string(),
        "trace_id".to_string(),
    ]
}

impl LedgerConfig {
    /// Validate the closed option set's documented ranges (spec.md §6.5).
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(10..=1024).contains(&self.max_segment_size_mb) {
            return Err(CoreError::new(
                ErrorCode::Config,
                format!(
                    "max_segment_size_mb must be in [10, 1024], got {}",
                    self.max_segment_size_mb
                ),
            ));
        }
        if !(1024..=1_048_576).contains(&self.write_queue_capacity) {
            return Err(CoreError::new(
                ErrorCode::Config,
                format!(
                    "write_queue_capacity must be in [1024, 1048576], got {}",
                    self.write_queue_capacity
                ),
            ));
        }
        if self.max_preview_bytes == 0 {
            return Err(CoreError::new(
                ErrorCode::Config,
                "max_preview_bytes must be positive",
            ));
        }
        Ok(())
    }

    pub fn max_segment_size_bytes(&self) -> u64 {
        self.max_segment_size_mb as u64 * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(LedgerConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_segment_size() {
        let mut cfg = LedgerConfig::default();
        cfg.max_segment_size_mb = 4;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_queue_capacity() {
        let mut cfg = LedgerConfig::default();
        cfg.write_queue_capacity = 10;
        assert!(cfg.validate().is_err());
    }
}
