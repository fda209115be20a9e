use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{RunId, StreamId};

/// `{none, zstd}` per spec.md §6.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    None,
    Zstd,
}

impl Default for Compression {
    fn default() -> Self {
        Compression::Zstd
    }
}

/// One entry in the manifest's `files` list (spec.md §3.4, §6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub size: u64,
    pub blake3: String,
}

/// A run's durable metadata and integrity record (spec.md §3.4).
///
/// Field order here is the YAML key order on disk: `serde_yaml` preserves
/// struct declaration order, which is how §6.3's "stable key order"
/// requirement is met without a custom serializer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: String,
    pub run_id: RunId,
    pub adapter: String,
    pub adapter_version: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_sha: Option<String>,
    pub config_digest: String,
    pub model_ids: Vec<String>,
    pub seeds: Vec<String>,
    pub files: Vec<FileEntry>,
    pub redaction_applied: bool,
    pub compression: Compression,
    pub total_events: u64,
    pub total_chunks: u64,
    /// Streams started but never finalized before `stop()`; non-empty marks
    /// the run as incomplete without refusing it outright (spec.md §4.5).
    pub incomplete_streams: Vec<StreamId>,
}
