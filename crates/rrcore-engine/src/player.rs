use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rrcore_ledger::{read_manifest, read_segment, RunLayout};
use rrcore_normalize::{fingerprint, Normalizer};
use rrcore_types::{
    Chunk, CoreError, ErrorCode, Event, EventType, Fingerprint, LedgerConfig, LookupKey, Manifest,
    OutputValue, ReplayMode, Result, RunId, StreamId, SCHEMA_VERSION,
};
use serde_json::Value;

type CounterTuple = (EventType, String, String, Option<String>);

/// Why a lookup did not produce a direct match (spec.md §4.7 "Mismatch
/// classification").
#[derive(Debug, Clone)]
pub enum Mismatch {
    KeyMiss,
    /// The key matched but the recorded inputs fingerprint differs.
    /// `available` carries the recorded outputs so `warn`/`hybrid` modes can
    /// fall back to them (spec.md §4.7).
    FingerprintMiss { available: Option<OutputValue> },
    /// The key matched but the recorded event's type differs.
    TypeMismatch {
        recorded: EventType,
        available: Option<OutputValue>,
    },
    OrderMismatch { expected: u64, requested: u64 },
}

impl Mismatch {
    fn code(&self) -> ErrorCode {
        match self {
            Mismatch::KeyMiss => ErrorCode::KeyMiss,
            Mismatch::FingerprintMiss { .. } => ErrorCode::FingerprintMiss,
            Mismatch::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            Mismatch::OrderMismatch { .. } => ErrorCode::OrderMismatch,
        }
    }

    /// The recorded output available to fall back to in `warn`/`hybrid`
    /// replay modes, if the key matched but inputs or type diverged
    /// (spec.md §4.7).
    pub fn available(&self) -> Option<&OutputValue> {
        match self {
            Mismatch::FingerprintMiss { available } => available.as_ref(),
            Mismatch::TypeMismatch { available, .. } => available.as_ref(),
            Mismatch::KeyMiss | Mismatch::OrderMismatch { .. } => None,
        }
    }
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mismatch::KeyMiss => write!(f, "no recording for this call"),
            Mismatch::FingerprintMiss { .. } => {
                write!(f, "recorded inputs differ from the requested inputs")
            }
            Mismatch::TypeMismatch { recorded, .. } => {
                write!(f, "recorded event type {recorded} differs from the requested type")
            }
            Mismatch::OrderMismatch { expected, requested } => {
                write!(f, "call_index {requested} out of order, expected {expected}")
            }
        }
    }
}

/// Outcome of `Player::lookup` (spec.md §4.7).
#[derive(Debug, Clone)]
pub enum MatchResult {
    Matched {
        outputs: OutputValue,
        stream_ref: Option<StreamId>,
    },
    Mismatch(Mismatch),
}

impl MatchResult {
    pub fn outputs(&self) -> Option<&OutputValue> {
        match self {
            MatchResult::Matched { outputs, .. } => Some(outputs),
            MatchResult::Mismatch(_) => None,
        }
    }
}

/// Success rate and mismatch breakdown (spec.md §4.7 `statistics`).
#[derive(Debug, Clone, Default)]
pub struct ReplayStats {
    pub total_lookups: u64,
    pub matched: u64,
    pub key_miss: u64,
    pub fingerprint_miss: u64,
    pub type_mismatch: u64,
    pub order_mismatch: u64,
    pub by_event_type: HashMap<String, u64>,
}

impl ReplayStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_lookups == 0 {
            return 1.0;
        }
        self.matched as f64 / self.total_lookups as f64
    }
}

fn mismatch_to_error(mismatch: &Mismatch, run_id: &str) -> CoreError {
    CoreError::new(mismatch.code(), mismatch.to_string()).with_run(run_id.to_string(), None)
}

/// Classify a key-miss given the highest call_index ever recorded for the
/// tuple (`max_seen`, exclusive) and the `requested` call_index (spec.md §8
/// Scenario 3). Nothing was ever recorded at or beyond `requested` yields
/// `KeyMiss` in every replay mode; a call_index inside the recorded range
/// that still didn't hit the index (a gap) yields `OrderMismatch`.
fn classify_call_index_miss(max_seen: Option<u64>, requested: u64) -> Mismatch {
    match max_seen {
        None => Mismatch::KeyMiss,
        Some(max_seen) if requested >= max_seen => Mismatch::KeyMiss,
        Some(max_seen) => Mismatch::OrderMismatch {
            expected: max_seen,
            requested,
        },
    }
}

/// Loads a run, indexes its events by lookup key, and serves substitutions
/// (spec.md §4.7). Read-only once `load` returns; safe to share across
/// threads behind an `Arc` as long as no writer touches the same run.
pub struct Player {
    run_id: RunId,
    manifest: Manifest,
    config: LedgerConfig,
    normalizer: Normalizer,
    index: HashMap<LookupKey, Event>,
    tuple_max_call_index: HashMap<CounterTuple, u64>,
    streams: HashMap<StreamId, Vec<Event>>,
    replay_mode: ReplayMode,
    replay_call_index_counters: Mutex<HashMap<CounterTuple, u64>>,
    stats: Mutex<ReplayStats>,
}

impl Player {
    /// Load a run's manifest and every segment it references, building the
    /// lookup-key index (spec.md §4.7 `load`).
    pub fn load(
        ledger_root: &Path,
        run_id: impl Into<RunId>,
        config: LedgerConfig,
        project_root: Option<PathBuf>,
        replay_mode: ReplayMode,
    ) -> Result<Self> {
        let run_id = run_id.into();
        let layout = RunLayout::new(ledger_root, &run_id);
        let manifest = read_manifest(&layout)?;

        if rrcore_types::schema_major(&manifest.schema_version) != rrcore_types::schema_major(SCHEMA_VERSION) {
            return Err(CoreError::new(
                ErrorCode::SchemaUnsupported,
                format!("unsupported schema major version {}", manifest.schema_version),
            )
            .with_run(run_id, None));
        }

        let expected_digest = rrcore_core::config_digest(&config);
        if expected_digest != manifest.config_digest {
            tracing::warn!(
                run_id = %run_id,
                "replay config_digest does not match the recorded config; normalization may diverge"
            );
        }

        let segment_paths = layout.list_segment_paths()?;
        if segment_paths.is_empty() && manifest.total_events > 0 {
            return Err(CoreError::new(
                ErrorCode::LedgerIntegrityError,
                "manifest references events but no segment files are present",
            )
            .with_run(run_id, None));
        }

        let mut index = HashMap::new();
        let mut tuple_max_call_index: HashMap<CounterTuple, u64> = HashMap::new();
        let mut streams: HashMap<StreamId, Vec<Event>> = HashMap::new();

        for path in &segment_paths {
            let contents = read_segment(path, manifest.compression)?;
            for event in contents.events {
                let key = event.lookup_key();
                let tuple = key.counter_tuple();
                let max = tuple_max_call_index.entry(tuple).or_insert(0);
                *max = (*max).max(event.call_index + 1);

                if event.event_type == EventType::LlmStreamChunk {
                    if let Some(stream_ref) = &event.stream_ref {
                        streams.entry(stream_ref.clone()).or_default().push(event.clone());
                    }
                }
                index.insert(key, event);
            }
        }

        let normalizer = Normalizer::new(&config, project_root);

        Ok(Self {
            run_id,
            manifest,
            config,
            normalizer,
            index,
            tuple_max_call_index,
            streams,
            replay_mode,
            replay_call_index_counters: Mutex::new(HashMap::new()),
            stats: Mutex::new(ReplayStats::default()),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Begin replaying, optionally under a new run identity (spec.md §4.7
    /// `start_replay`). Consumes `self` since the replaying state is
    /// terminal-adjacent (`Replaying` only ever moves forward to `Drained`).
    pub fn start_replay(self, new_run_id: Option<String>) -> ReplaySession {
        let replay_id = new_run_id.unwrap_or_else(|| self.run_id.clone());
        ReplaySession {
            player: self,
            replay_id,
        }
    }

    /// Resolve one lookup against the loaded index (spec.md §4.7 "Lookup
    /// algorithm").
    pub fn lookup(
        &self,
        event_type: EventType,
        adapter: impl Into<String>,
        agent_id: impl Into<String>,
        tool_name: Option<String>,
        inputs: &Value,
        call_index: Option<u64>,
    ) -> Result<MatchResult> {
        let adapter = adapter.into();
        let agent_id = agent_id.into();

        let normalized = self.normalizer.normalize(inputs)?;
        let fp = fingerprint(&normalized.bytes);

        let tuple: CounterTuple = (event_type, adapter.clone(), agent_id.clone(), tool_name.clone());
        let resolved_call_index = match call_index {
            Some(idx) => idx,
            None => {
                let mut counters = self.replay_call_index_counters.lock().unwrap();
                let entry = counters.entry(tuple.clone()).or_insert(0);
                let idx = *entry;
                *entry += 1;
                idx
            }
        };

        let key = LookupKey::new(event_type, adapter, agent_id, tool_name, resolved_call_index);

        let result = match self.index.get(&key) {
            Some(event) if event.event_type != event_type => MatchResult::Mismatch(Mismatch::TypeMismatch {
                recorded: event.event_type,
                available: Some(event.outputs.clone()),
            }),
            Some(event) if event.inputs_fp != fp => MatchResult::Mismatch(Mismatch::FingerprintMiss {
                available: Some(event.outputs.clone()),
            }),
            Some(event) => MatchResult::Matched {
                outputs: event.outputs.clone(),
                stream_ref: event.stream_ref.clone(),
            },
            None => MatchResult::Mismatch(self.classify_miss(&tuple, resolved_call_index)),
        };

        self.record_stat(event_type, &result);
        self.apply_replay_mode(result)
    }

    fn classify_miss(&self, tuple: &CounterTuple, requested: u64) -> Mismatch {
        classify_call_index_miss(self.tuple_max_call_index.get(tuple).copied(), requested)
    }

    fn record_stat(&self, event_type: EventType, result: &MatchResult) {
        let mut stats = self.stats.lock().unwrap();
        stats.total_lookups += 1;
        *stats.by_event_type.entry(event_type.to_string()).or_insert(0) += 1;
        match result {
            MatchResult::Matched { .. } => stats.matched += 1,
            MatchResult::Mismatch(Mismatch::KeyMiss) => stats.key_miss += 1,
            MatchResult::Mismatch(Mismatch::FingerprintMiss { .. }) => stats.fingerprint_miss += 1,
            MatchResult::Mismatch(Mismatch::TypeMismatch { .. }) => stats.type_mismatch += 1,
            MatchResult::Mismatch(Mismatch::OrderMismatch { .. }) => stats.order_mismatch += 1,
        }
    }

    /// Apply the replay-mode policy to a raw match result (spec.md §4.7
    /// "Replay modes"). `strict` turns any mismatch into an error; `warn`
    /// logs and returns the mismatch as data; `hybrid` returns it silently.
    fn apply_replay_mode(&self, result: MatchResult) -> Result<MatchResult> {
        match (&result, self.replay_mode) {
            (MatchResult::Mismatch(m), ReplayMode::Strict) => Err(mismatch_to_error(m, &self.run_id)),
            (MatchResult::Mismatch(m), ReplayMode::Warn) => {
                tracing::warn!(run_id = %self.run_id, code = %m.code(), "{m}");
                Ok(result)
            }
            _ => Ok(result),
        }
    }

    /// Return an ordered, single-pass iterator over one stream's chunks
    /// (spec.md §4.7 `replay_stream`).
    pub fn replay_stream(&self, stream_ref: &str, preserve_timing: bool) -> Result<StreamReplay> {
        let events = self.streams.get(stream_ref).ok_or_else(|| {
            CoreError::new(ErrorCode::StreamMissing, format!("stream {stream_ref} not found"))
                .with_run(self.run_id.clone(), None)
        })?;

        let mut sorted = events.clone();
        sorted.sort_by_key(|e| e.call_index);

        Ok(StreamReplay {
            events: sorted,
            position: 0,
            preserve_timing,
            max_wait: Duration::from_millis(self.config.max_chunk_wait_ms),
            last_timestamp: None,
        })
    }

    pub fn statistics(&self) -> ReplayStats {
        self.stats.lock().unwrap().clone()
    }
}

/// A loaded run that has transitioned into active replay (spec.md §4.10
/// `Loaded → Replaying`). Thin wrapper: all state lives on the underlying
/// `Player`.
pub struct ReplaySession {
    player: Player,
    replay_id: RunId,
}

impl ReplaySession {
    pub fn replay_id(&self) -> &str {
        &self.replay_id
    }

    #[allow(clippy::too_many_arguments)]
    pub fn lookup(
        &self,
        event_type: EventType,
        adapter: impl Into<String>,
        agent_id: impl Into<String>,
        tool_name: Option<String>,
        inputs: &Value,
        call_index: Option<u64>,
    ) -> Result<MatchResult> {
        self.player.lookup(event_type, adapter, agent_id, tool_name, inputs, call_index)
    }

    pub fn replay_stream(&self, stream_ref: &str, preserve_timing: bool) -> Result<StreamReplay> {
        self.player.replay_stream(stream_ref, preserve_timing)
    }

    pub fn statistics(&self) -> ReplayStats {
        self.player.statistics()
    }
}

/// Single-pass, cancellable iterator over one stream's chunks (spec.md
/// §4.7 "Streaming replay"). Dropping it mid-iteration is safe; it holds no
/// resources beyond its own buffered chunk list.
pub struct StreamReplay {
    events: Vec<Event>,
    position: usize,
    preserve_timing: bool,
    max_wait: Duration,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Iterator for StreamReplay {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let event = self.events.get(self.position)?;
        let chunk: Chunk = serde_json::from_value(event.outputs.as_inline()?.clone()).ok()?;

        if self.preserve_timing {
            if let Some(previous) = self.last_timestamp {
                let gap = (chunk.timestamp - previous).to_std().unwrap_or(Duration::ZERO);
                std::thread::sleep(gap.min(self.max_wait));
            }
        }

        self.last_timestamp = Some(chunk.timestamp);
        self.position += 1;
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::{Recorder, RunMeta};
    use serde_json::json;

    fn meta() -> RunMeta {
        RunMeta {
            adapter: "test-adapter".to_string(),
            adapter_version: "0.1.0".to_string(),
            ..Default::default()
        }
    }

    fn record_sample_run(root: &Path, run_id: &str) {
        let (recorder, _telemetry) =
            Recorder::start(root, run_id.to_string(), meta(), LedgerConfig::default(), None).unwrap();
        recorder
            .record_event(
                EventType::ToolCall,
                "claude-code",
                "agent-1",
                Some("bash".to_string()),
                &json!({"cmd": "ls"}),
                json!({"stdout": "a.txt\n"}),
                5,
                None,
            )
            .unwrap();
        recorder.stop().unwrap();
    }

    #[test]
    fn exact_replay_matches_recorded_output() {
        let temp = tempfile::tempdir().unwrap();
        record_sample_run(temp.path(), "run-1");

        let player = Player::load(temp.path(), "run-1", LedgerConfig::default(), None, ReplayMode::Strict).unwrap();
        let result = player
            .lookup(
                EventType::ToolCall,
                "claude-code",
                "agent-1",
                Some("bash".to_string()),
                &json!({"cmd": "ls"}),
                None,
            )
            .unwrap();
        assert!(matches!(result, MatchResult::Matched { .. }));
        assert_eq!(result.outputs().unwrap().as_inline().unwrap()["stdout"], "a.txt\n");
    }

    #[test]
    fn fingerprint_drift_is_detected_in_strict_mode() {
        let temp = tempfile::tempdir().unwrap();
        record_sample_run(temp.path(), "run-1");

        let player = Player::load(temp.path(), "run-1", LedgerConfig::default(), None, ReplayMode::Strict).unwrap();
        let err = player
            .lookup(
                EventType::ToolCall,
                "claude-code",
                "agent-1",
                Some("bash".to_string()),
                &json!({"cmd": "rm -rf /"}),
                None,
            )
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::FingerprintMiss);
    }

    #[test]
    fn fingerprint_drift_is_returned_as_data_in_hybrid_mode() {
        let temp = tempfile::tempdir().unwrap();
        record_sample_run(temp.path(), "run-1");

        let player = Player::load(temp.path(), "run-1", LedgerConfig::default(), None, ReplayMode::Hybrid).unwrap();
        let result = player
            .lookup(
                EventType::ToolCall,
                "claude-code",
                "agent-1",
                Some("bash".to_string()),
                &json!({"cmd": "rm -rf /"}),
                None,
            )
            .unwrap();
        assert!(matches!(result, MatchResult::Mismatch(Mismatch::FingerprintMiss { .. })));
    }

    #[test]
    fn fingerprint_drift_returns_recorded_output_in_hybrid_mode() {
        let temp = tempfile::tempdir().unwrap();
        record_sample_run(temp.path(), "run-1");

        let player = Player::load(temp.path(), "run-1", LedgerConfig::default(), None, ReplayMode::Hybrid).unwrap();
        let result = player
            .lookup(
                EventType::ToolCall,
                "claude-code",
                "agent-1",
                Some("bash".to_string()),
                &json!({"cmd": "rm -rf /"}),
                None,
            )
            .unwrap();
        match result {
            MatchResult::Mismatch(mismatch) => {
                let available = mismatch.available().expect("recorded output available");
                assert_eq!(available.as_inline().unwrap()["stdout"], "a.txt\n");
            }
            other => panic!("expected a mismatch, got {other:?}"),
        }
    }

    #[test]
    fn key_miss_on_unrecorded_tool() {
        let temp = tempfile::tempdir().unwrap();
        record_sample_run(temp.path(), "run-1");

        let player = Player::load(temp.path(), "run-1", LedgerConfig::default(), None, ReplayMode::Hybrid).unwrap();
        let result = player
            .lookup(
                EventType::ToolCall,
                "claude-code",
                "agent-1",
                Some("never-recorded".to_string()),
                &json!({}),
                None,
            )
            .unwrap();
        assert!(matches!(result, MatchResult::Mismatch(Mismatch::KeyMiss)));
    }

    #[test]
    fn key_miss_on_call_index_beyond_recorded_range() {
        let temp = tempfile::tempdir().unwrap();
        record_sample_run(temp.path(), "run-1");

        let player = Player::load(temp.path(), "run-1", LedgerConfig::default(), None, ReplayMode::Hybrid).unwrap();
        let result = player
            .lookup(
                EventType::ToolCall,
                "claude-code",
                "agent-1",
                Some("bash".to_string()),
                &json!({"cmd": "ls"}),
                Some(5),
            )
            .unwrap();
        assert!(matches!(result, MatchResult::Mismatch(Mismatch::KeyMiss)));
    }

    #[test]
    fn classify_call_index_miss_distinguishes_key_miss_from_order_mismatch() {
        // Nothing recorded at all for the tuple.
        assert!(matches!(classify_call_index_miss(None, 0), Mismatch::KeyMiss));
        // Beyond the recorded range, in every mode: KeyMiss.
        assert!(matches!(classify_call_index_miss(Some(1), 1), Mismatch::KeyMiss));
        assert!(matches!(classify_call_index_miss(Some(1), 5), Mismatch::KeyMiss));
        // Inside the recorded range but the exact call_index still missed
        // the index (a gap): OrderMismatch.
        match classify_call_index_miss(Some(3), 0) {
            Mismatch::OrderMismatch { expected, requested } => {
                assert_eq!(expected, 3);
                assert_eq!(requested, 0);
            }
            other => panic!("expected OrderMismatch, got {other:?}"),
        }
    }

    #[test]
    fn statistics_tracks_matches_and_misses() {
        let temp = tempfile::tempdir().unwrap();
        record_sample_run(temp.path(), "run-1");

        let player = Player::load(temp.path(), "run-1", LedgerConfig::default(), None, ReplayMode::Hybrid).unwrap();
        player
            .lookup(EventType::ToolCall, "claude-code", "agent-1", Some("bash".to_string()), &json!({"cmd": "ls"}), None)
            .unwrap();
        player
            .lookup(EventType::ToolCall, "claude-code", "agent-1", Some("missing".to_string()), &json!({}), None)
            .unwrap();

        let stats = player.statistics();
        assert_eq!(stats.total_lookups, 2);
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.key_miss, 1);
    }

    #[test]
    fn streaming_replay_yields_chunks_in_order() {
        let temp = tempfile::tempdir().unwrap();
        let (recorder, _telemetry) =
            Recorder::start(temp.path(), "run-1".to_string(), meta(), LedgerConfig::default(), None).unwrap();
        let stream_id = recorder.start_stream("claude-code", "agent-1", None, &json!({"prompt": "hi"})).unwrap();
        recorder.append_chunk(&stream_id, "hello ", None, false).unwrap();
        recorder.append_chunk(&stream_id, "world", None, true).unwrap();
        recorder.stop().unwrap();

        let player = Player::load(temp.path(), "run-1", LedgerConfig::default(), None, ReplayMode::Strict).unwrap();
        let chunks: Vec<Chunk> = player.replay_stream(&stream_id, false).unwrap().collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, "hello ");
        assert_eq!(chunks[1].content, "world");
        assert!(chunks[1].is_final);
    }
}
