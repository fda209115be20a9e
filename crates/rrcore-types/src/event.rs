use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque ASCII token, unique per ledger directory (spec.md §3.1).
pub type RunId = String;

/// Identifier of a stream owned by exactly one event (spec.md §3.3).
pub type StreamId = String;

/// The kind of external I/O edge a single event records (spec.md §3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    LlmCall,
    ToolCall,
    SandboxExec,
    VcsAction,
    IoRead,
    IoWrite,
    IoNetwork,
    LlmStreamStart,
    LlmStreamChunk,
    LlmStreamFinish,
    RecordingNote,
    ReplayCheckpoint,
    ReplayAssert,
    PolicyViolation,
    Error,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::LlmCall => "llm_call",
            EventType::ToolCall => "tool_call",
            EventType::SandboxExec => "sandbox_exec",
            EventType::VcsAction => "vcs_action",
            EventType::IoRead => "io_read",
            EventType::IoWrite => "io_write",
            EventType::IoNetwork => "io_network",
            EventType::LlmStreamStart => "llm_stream_start",
            EventType::LlmStreamChunk => "llm_stream_chunk",
            EventType::LlmStreamFinish => "llm_stream_finish",
            EventType::RecordingNote => "recording_note",
            EventType::ReplayCheckpoint => "replay_checkpoint",
            EventType::ReplayAssert => "replay_assert",
            EventType::PolicyViolation => "policy_violation",
            EventType::Error => "error",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 32-byte BLAKE3 digest of normalized inputs (spec.md §3.2, §4.2).
///
/// Stored as a plain byte array; the hashing itself happens in
/// `rrcore-normalize` so this crate stays free of hashing dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        if s.len() != 64 {
            return None;
        }
        let mut bytes = [0u8; 32];
        for i in 0..32 {
            bytes[i] = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Fingerprint(bytes))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Fingerprint::from_hex(&s)
            .ok_or_else(|| serde::de::Error::custom("invalid fingerprint hex string"))
    }
}

/// The lookup key used to locate a recorded event at replay time
/// (spec.md §3.2, §6.4): `(event_type, adapter, agent_id, tool_name, call_index)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LookupKey {
    pub event_type: EventType,
    pub adapter: String,
    pub agent_id: String,
    pub tool_name: Option<String>,
    pub call_index: u64,
}

impl LookupKey {
    pub fn new(
        event_type: EventType,
        adapter: impl Into<String>,
        agent_id: impl Into<String>,
        tool_name: Option<String>,
        call_index: u64,
    ) -> Self {
        Self {
            event_type,
            adapter: adapter.into(),
            agent_id: agent_id.into(),
            tool_name,
            call_index,
        }
    }

    /// Per §6.4 the tuple components form a `:`-joined string; any `:` inside
    /// a component must be percent-encoded before forming the key.
    pub fn to_wire_string(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.event_type.as_str(),
            percent_encode_colons(&self.adapter),
            percent_encode_colons(&self.agent_id),
            percent_encode_colons(self.tool_name.as_deref().unwrap_or("")),
            self.call_index
        )
    }

    /// The tuple ignoring `call_index`, used to form the per-tuple counters
    /// in spec.md §4.6 / §4.7.
    pub fn counter_tuple(&self) -> (EventType, String, String, Option<String>) {
        (
            self.event_type,
            self.adapter.clone(),
            self.agent_id.clone(),
            self.tool_name.clone(),
        )
    }
}

fn percent_encode_colons(s: &str) -> String {
    s.replace(':', "%3A")
}

/// Per-edge token accounting, present only when the adapter reports it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

/// Pointer to an output blob offloaded to `outputs/` (SPEC_FULL.md §3
/// supplement: outputs above `inline_output_threshold_bytes` are offloaded).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobRef {
    pub path: String,
    pub size: u64,
    pub blake3: String,
}

/// The recorded output of an event: either inlined in the ledger record or
/// offloaded to a content-addressed file under `outputs/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputValue {
    Inline { value: Value },
    Blob { blob: BlobRef },
}

impl OutputValue {
    pub fn inline(value: Value) -> Self {
        OutputValue::Inline { value }
    }

    pub fn as_inline(&self) -> Option<&Value> {
        match self {
            OutputValue::Inline { value } => Some(value),
            OutputValue::Blob { .. } => None,
        }
    }
}

/// One external I/O edge (spec.md §3.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub schema_version: String,
    pub event_type: EventType,
    /// Monotonic within the run; the source of truth for ordering.
    pub step: u64,
    pub timestamp: DateTime<Utc>,
    pub run_id: RunId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    pub adapter: String,
    pub agent_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Monotonic per `(event_type, adapter, agent_id, tool_name)` tuple.
    pub call_index: u64,
    pub inputs_fp: Fingerprint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs_preview: Option<String>,
    pub outputs: OutputValue,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_ref: Option<StreamId>,
    /// Open map; must never be consulted for lookup key formation (§3.2).
    #[serde(default = "default_metadata")]
    pub metadata: Value,
}

fn default_metadata() -> Value {
    Value::Object(Default::default())
}

impl Event {
    pub fn lookup_key(&self) -> LookupKey {
        LookupKey::new(
            self.event_type,
            self.adapter.clone(),
            self.agent_id.clone(),
            self.tool_name.clone(),
            self.call_index,
        )
    }
}
