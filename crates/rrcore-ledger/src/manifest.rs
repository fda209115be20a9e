use std::fs::File;
use std::io::Write;
use std::path::Path;

use rrcore_types::{CoreError, ErrorCode, FileEntry, Manifest, Result};

use crate::layout::RunLayout;

/// BLAKE3-hash a file by re-reading it from disk rather than trusting
/// whatever bytes the writer last held in memory (spec.md §4.4).
pub fn hash_file(path: &Path) -> Result<FileEntry> {
    let bytes =
        std::fs::read(path).map_err(|e| CoreError::io(format!("reading {}", path.display()), e))?;
    let hash = blake3::hash(&bytes);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    Ok(FileEntry {
        path: name,
        size: bytes.len() as u64,
        blake3: hash.to_hex().to_string(),
    })
}

/// Serialize `manifest` as canonical YAML and write it atomically: a
/// temp file, fsync, then rename over the final path (spec.md §4.4).
pub fn write_manifest_atomic(layout: &RunLayout, manifest: &Manifest) -> Result<()> {
    let final_path = layout.manifest_path();
    let tmp_path = final_path.with_extension("yaml.tmp");

    let yaml = serde_yaml::to_string(manifest)
        .map_err(|e| CoreError::new(ErrorCode::Io, format!("serializing manifest: {e}")))?;

    {
        let mut file = File::create(&tmp_path)
            .map_err(|e| CoreError::io(format!("creating {}", tmp_path.display()), e))?;
        file.write_all(yaml.as_bytes())
            .map_err(|e| CoreError::io("writing manifest contents", e))?;
        file.sync_all()
            .map_err(|e| CoreError::io("fsyncing manifest temp file", e))?;
    }

    std::fs::rename(&tmp_path, &final_path)
        .map_err(|e| CoreError::io("renaming manifest into place", e))?;

    Ok(())
}

/// Load and parse a run's manifest.
pub fn read_manifest(layout: &RunLayout) -> Result<Manifest> {
    let path = layout.manifest_path();
    let text = std::fs::read_to_string(&path)
        .map_err(|e| CoreError::new(ErrorCode::RunNotFound, format!("{}: {e}", path.display())))?;
    serde_yaml::from_str(&text)
        .map_err(|e| CoreError::new(ErrorCode::LedgerIntegrityError, format!("corrupt manifest: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_manifest() -> Manifest {
        Manifest {
            schema_version: rrcore_types::SCHEMA_VERSION.to_string(),
            run_id: "run-1".to_string(),
            adapter: "test".to_string(),
            adapter_version: "0.1.0".to_string(),
            created_at: Utc::now(),
            closed_at: Some(Utc::now()),
            git_sha: None,
            config_digest: "deadbeef".to_string(),
            model_ids: vec!["gpt-test".to_string()],
            seeds: vec![],
            files: vec![],
            redaction_applied: false,
            compression: rrcore_types::Compression::Zstd,
            total_events: 0,
            total_chunks: 0,
            incomplete_streams: vec![],
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let temp = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(temp.path(), &"run-1".to_string());
        layout.ensure_dirs().unwrap();

        let manifest = sample_manifest();
        write_manifest_atomic(&layout, &manifest).unwrap();

        let loaded = read_manifest(&layout).unwrap();
        assert_eq!(loaded.run_id, manifest.run_id);
        assert_eq!(loaded.config_digest, manifest.config_digest);
    }

    #[test]
    fn manifest_keys_are_in_stable_order() {
        let temp = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(temp.path(), &"run-1".to_string());
        layout.ensure_dirs().unwrap();
        write_manifest_atomic(&layout, &sample_manifest()).unwrap();

        let text = std::fs::read_to_string(layout.manifest_path()).unwrap();
        let schema_pos = text.find("schema_version").unwrap();
        let run_id_pos = text.find("run_id").unwrap();
        assert!(schema_pos < run_id_pos);
    }

    #[test]
    fn hash_file_matches_blake3_of_contents() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("segment.bin");
        std::fs::write(&path, b"hello world").unwrap();

        let entry = hash_file(&path).unwrap();
        assert_eq!(entry.size, 11);
        assert_eq!(entry.blake3, blake3::hash(b"hello world").to_hex().to_string());
    }
}
