use rrcore_types::LedgerConfig;
use sha2::{Digest, Sha256};

/// Hex SHA256 digest of a run's effective `LedgerConfig`, recorded as
/// `Manifest.config_digest` (spec.md §3.4) so replay can detect a run that
/// was closed under different settings than the one currently loaded.
///
/// Serializes via `serde_json` to get a stable byte representation rather
/// than hashing the in-memory struct layout directly.
pub fn config_digest(config: &LedgerConfig) -> String {
    let canonical =
        serde_json::to_vec(config).expect("LedgerConfig serialization is infallible");
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_for_equal_configs() {
        let a = LedgerConfig::default();
        let b = LedgerConfig::default();
        assert_eq!(config_digest(&a), config_digest(&b));
    }

    #[test]
    fn digest_changes_with_config() {
        let a = LedgerConfig::default();
        let mut b = LedgerConfig::default();
        b.max_segment_size_mb = 50;
        assert_ne!(config_digest(&a), config_digest(&b));
    }
}
