use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One chunk in an ordered streaming event (spec.md §3.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// 0-based, contiguous within the stream.
    pub index: u64,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Exactly one chunk in a finalized stream has `is_final = true`, and it
    /// is the last element by `index`.
    pub is_final: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Aggregate stats recorded on the owning event's `outputs` once a stream is
/// finalized (spec.md §3.3, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSummary {
    pub chunk_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    pub content: String,
}
