use std::path::{Path, PathBuf};

use rrcore_types::{Compression, CoreError, RunId};

/// Bit-exact on-disk layout for a single run, per spec.md §6.1:
///
/// ```text
/// <root>/<run_id>/
///   manifest.yaml
///   events-000000.jsonl.zst
///   events-000001.jsonl.zst
///   inputs/
///   outputs/
/// ```
///
/// The optional `streams/<stream_id>.jsonl.zst` split named in §6.1 is not
/// produced by this implementation: stream chunks are recorded inline as
/// ordinary `llm_stream_chunk` events (see rrcore-engine), which the layout
/// itself already allows for ("else inline with events").
#[derive(Debug, Clone)]
pub struct RunLayout {
    root: PathBuf,
}

impl RunLayout {
    pub fn new(ledger_root: &Path, run_id: &RunId) -> Self {
        Self {
            root: ledger_root.join(run_id),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("manifest.yaml")
    }

    pub fn segment_path(&self, index: u32, compression: Compression) -> PathBuf {
        let ext = match compression {
            Compression::Zstd => "jsonl.zst",
            Compression::None => "jsonl",
        };
        self.root.join(format!("events-{index:06}.{ext}"))
    }

    pub fn inputs_dir(&self) -> PathBuf {
        self.root.join("inputs")
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.root.join("outputs")
    }

    pub fn diffs_dir(&self) -> PathBuf {
        self.root.join("diffs")
    }

    /// Create the run directory plus the always-present subdirectories.
    /// `diffs/` is optional per §6.1 and created lazily by whatever writes
    /// into it.
    pub fn ensure_dirs(&self) -> Result<(), CoreError> {
        std::fs::create_dir_all(&self.root)
            .map_err(|e| CoreError::io(format!("creating run directory {}", self.root.display()), e))?;
        std::fs::create_dir_all(self.inputs_dir())
            .map_err(|e| CoreError::io("creating inputs directory", e))?;
        std::fs::create_dir_all(self.outputs_dir())
            .map_err(|e| CoreError::io("creating outputs directory", e))?;
        Ok(())
    }

    /// All segment files under the run root, in ascending segment order.
    pub fn list_segment_paths(&self) -> Result<Vec<PathBuf>, CoreError> {
        let mut paths = Vec::new();
        let entries = std::fs::read_dir(&self.root)
            .map_err(|e| CoreError::io(format!("listing run directory {}", self.root.display()), e))?;
        for entry in entries {
            let entry = entry.map_err(|e| CoreError::io("reading directory entry", e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with("events-") {
                paths.push(entry.path());
            }
        }
        paths.sort();
        Ok(paths)
    }
}
