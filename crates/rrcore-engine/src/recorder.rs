use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use rrcore_ledger::{write_manifest_atomic, BackgroundWriter, RunLayout};
use rrcore_normalize::{fingerprint, Normalizer, Redactor};
use rrcore_types::{
    Chunk, CoreError, ErrorCode, Event, EventType, LedgerConfig, Manifest, OutputValue, Result,
    RunId, StreamId, StreamSummary, TokenUsage, SCHEMA_VERSION,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::state::RunState;
use crate::telemetry::{channel, TelemetryEvent, TelemetrySender};

type CounterTuple = (EventType, String, String, Option<String>);

/// Static identity of a run, supplied once at `start()` (spec.md §4.6
/// `start(run_meta)`).
#[derive(Debug, Clone, Default)]
pub struct RunMeta {
    pub session_id: Option<String>,
    pub task_id: Option<String>,
    pub trace_id: Option<String>,
    pub adapter: String,
    pub adapter_version: String,
    pub seeds: Vec<String>,
    pub model_ids: Vec<String>,
    pub git_sha: Option<String>,
}

/// What `record_event` hands back (spec.md §4.6 `record_event` result
/// column: `event_id, step, call_index`; `event_id` is the `(step, run_id)`
/// pair, which already uniquely addresses the event).
#[derive(Debug, Clone, Copy)]
pub struct RecordedEvent {
    pub step: u64,
    pub call_index: u64,
    pub inputs_fp: rrcore_types::Fingerprint,
}

struct StreamState {
    adapter: String,
    agent_id: String,
    tool_name: Option<String>,
    chunks: Vec<Chunk>,
    finalized: bool,
}

/// Orchestrates capture: opens a run, ingests events, manages streams, emits
/// telemetry, closes with a manifest (spec.md §4.6).
pub struct Recorder {
    run_id: RunId,
    layout: RunLayout,
    meta: RunMeta,
    config: LedgerConfig,
    config_digest: String,
    created_at: chrono::DateTime<Utc>,
    state: Mutex<RunState>,
    step_counter: Mutex<u64>,
    call_index_counters: Mutex<HashMap<CounterTuple, u64>>,
    streams: Mutex<HashMap<StreamId, StreamState>>,
    writer: Mutex<Option<BackgroundWriter>>,
    normalizer: Normalizer,
    telemetry: TelemetrySender,
}

impl Recorder {
    /// Opens a new run under `ledger_root` (spec.md §4.6 `start`).
    ///
    /// `RunAlreadyOpen` is raised when a manifest already exists at the
    /// target run directory — the one collision `start()` can actually
    /// observe, since every call constructs a fresh `Recorder`.
    pub fn start(
        ledger_root: &Path,
        run_id: impl Into<RunId>,
        meta: RunMeta,
        config: LedgerConfig,
        project_root: Option<PathBuf>,
    ) -> Result<(Self, std::sync::mpsc::Receiver<TelemetryEvent>)> {
        config.validate()?;
        let run_id = run_id.into();
        let layout = RunLayout::new(ledger_root, &run_id);

        if layout.manifest_path().exists() {
            return Err(CoreError::new(
                ErrorCode::RunAlreadyOpen,
                format!("a manifest already exists for run {run_id}"),
            )
            .with_run(run_id, None));
        }

        let config_digest = rrcore_core::config_digest(&config);
        let redactor = Redactor::new(&config.redaction_rules)?;
        let writer = BackgroundWriter::start(layout.clone(), run_id.clone(), config.clone(), redactor)?;
        let normalizer = Normalizer::new(&config, project_root);
        let (telemetry, rx) = channel();
        telemetry.send(TelemetryEvent::RunOpened { run_id: run_id.clone() });

        let recorder = Self {
            run_id,
            layout,
            meta,
            config,
            config_digest,
            created_at: Utc::now(),
            state: Mutex::new(RunState::Open),
            step_counter: Mutex::new(0),
            call_index_counters: Mutex::new(HashMap::new()),
            streams: Mutex::new(HashMap::new()),
            writer: Mutex::new(Some(writer)),
            normalizer,
            telemetry,
        };
        Ok((recorder, rx))
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap()
    }

    fn ensure_open(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match *state {
            RunState::Draining | RunState::Closed => Err(CoreError::new(
                ErrorCode::RunNotOpen,
                "run is draining or already closed",
            )
            .with_run(self.run_id.clone(), None)),
            RunState::Open => {
                *state = RunState::Active;
                Ok(())
            }
            RunState::Active => Ok(()),
        }
    }

    fn next_step(&self) -> u64 {
        let mut counter = self.step_counter.lock().unwrap();
        let step = *counter;
        *counter += 1;
        step
    }

    fn next_call_index(&self, tuple: CounterTuple) -> u64 {
        let mut counters = self.call_index_counters.lock().unwrap();
        let entry = counters.entry(tuple).or_insert(0);
        let index = *entry;
        *entry += 1;
        index
    }

    fn enqueue(&self, event: Event) -> Result<()> {
        let guard = self.writer.lock().unwrap();
        match guard.as_ref() {
            Some(writer) => match writer.enqueue_event(event) {
                Ok(()) => Ok(()),
                Err(err) if err.code == ErrorCode::QueueOverflow => {
                    self.telemetry.send(TelemetryEvent::QueueFull);
                    Err(err)
                }
                Err(err) if err.code == ErrorCode::WriterFailed => {
                    self.telemetry.send(TelemetryEvent::WriterFailed {
                        message: err.message.clone(),
                    });
                    Err(err)
                }
                Err(err) => Err(err),
            },
            None => Err(CoreError::new(ErrorCode::RunNotOpen, "run already stopped")
                .with_run(self.run_id.clone(), None)),
        }
    }

    fn base_event(&self, event_type: EventType, step: u64, adapter: String, agent_id: String, tool_name: Option<String>, call_index: u64) -> Event {
        Event {
            schema_version: SCHEMA_VERSION.to_string(),
            event_type,
            step,
            timestamp: Utc::now(),
            run_id: self.run_id.clone(),
            session_id: self.meta.session_id.clone(),
            task_id: self.meta.task_id.clone(),
            trace_id: self.meta.trace_id.clone(),
            span_id: None,
            adapter,
            agent_id,
            tool_name,
            call_index,
            inputs_fp: rrcore_types::Fingerprint([0u8; 32]),
            inputs_preview: None,
            outputs: OutputValue::inline(Value::Null),
            duration_ms: 0,
            cost: None,
            tokens: None,
            stream_ref: None,
            metadata: json!({}),
        }
    }

    /// Record one external I/O edge (spec.md §4.6 `record_event`).
    #[allow(clippy::too_many_arguments)]
    pub fn record_event(
        &self,
        event_type: EventType,
        adapter: impl Into<String>,
        agent_id: impl Into<String>,
        tool_name: Option<String>,
        inputs: &Value,
        outputs: Value,
        duration_ms: u64,
        metadata: Option<Value>,
    ) -> Result<RecordedEvent> {
        self.ensure_open()?;

        let adapter = adapter.into();
        let agent_id = agent_id.into();

        let normalized = self.normalizer.normalize(inputs)?;
        let fp = fingerprint(&normalized.bytes);

        let step = self.next_step();
        let tuple = (event_type, adapter.clone(), agent_id.clone(), tool_name.clone());
        let call_index = self.next_call_index(tuple);

        let outputs = offload_if_large(
            &self.layout,
            OutputValue::inline(outputs),
            self.config.inline_output_threshold_bytes,
        )?;

        let mut event = self.base_event(event_type, step, adapter, agent_id, tool_name, call_index);
        event.inputs_fp = fp;
        event.inputs_preview = Some(normalized.preview);
        event.outputs = outputs;
        event.duration_ms = duration_ms;
        event.metadata = metadata.unwrap_or_else(|| json!({}));

        self.enqueue(event)?;
        self.telemetry.send(TelemetryEvent::EventRecorded { event_type, step });

        Ok(RecordedEvent { step, call_index, inputs_fp: fp })
    }

    /// Open a stream and emit its `llm_stream_start` event (spec.md §4.6,
    /// §4.5).
    pub fn start_stream(
        &self,
        adapter: impl Into<String>,
        agent_id: impl Into<String>,
        tool_name: Option<String>,
        inputs: &Value,
    ) -> Result<StreamId> {
        self.ensure_open()?;

        let adapter = adapter.into();
        let agent_id = agent_id.into();

        let normalized = self.normalizer.normalize(inputs)?;
        let fp = fingerprint(&normalized.bytes);

        let step = self.next_step();
        let tuple = (EventType::LlmStreamStart, adapter.clone(), agent_id.clone(), tool_name.clone());
        let call_index = self.next_call_index(tuple);

        let stream_id = format!("stream-{}", Uuid::new_v4());

        let mut event = self.base_event(
            EventType::LlmStreamStart,
            step,
            adapter.clone(),
            agent_id.clone(),
            tool_name.clone(),
            call_index,
        );
        event.inputs_fp = fp;
        event.inputs_preview = Some(normalized.preview);
        event.stream_ref = Some(stream_id.clone());

        self.enqueue(event)?;

        self.streams.lock().unwrap().insert(
            stream_id.clone(),
            StreamState {
                adapter,
                agent_id,
                tool_name,
                chunks: Vec::new(),
                finalized: false,
            },
        );
        self.telemetry.send(TelemetryEvent::StreamStarted { stream_id: stream_id.clone() });

        Ok(stream_id)
    }

    /// Append one chunk to an open stream (spec.md §4.6 `append_chunk`).
    /// `is_final=true` finalizes the stream after recording the chunk.
    pub fn append_chunk(
        &self,
        stream_id: &str,
        content: impl Into<String>,
        metadata: Option<Value>,
        is_final: bool,
    ) -> Result<u64> {
        self.ensure_open()?;

        let (index, adapter, agent_id, tool_name) = {
            let mut streams = self.streams.lock().unwrap();
            let stream = streams.get_mut(stream_id).ok_or_else(|| {
                CoreError::new(ErrorCode::StreamNotOpen, format!("stream {stream_id} is not open"))
                    .with_run(self.run_id.clone(), None)
            })?;
            if stream.finalized {
                return Err(CoreError::new(
                    ErrorCode::StreamAlreadyFinalized,
                    format!("stream {stream_id} is already finalized"),
                )
                .with_run(self.run_id.clone(), None));
            }
            let index = stream.chunks.len() as u64;
            let chunk = Chunk {
                index,
                content: content.into(),
                timestamp: Utc::now(),
                is_final,
                metadata: metadata.clone(),
            };
            stream.chunks.push(chunk);
            (index, stream.adapter.clone(), stream.agent_id.clone(), stream.tool_name.clone())
        };

        let step = self.next_step();
        let mut event = self.base_event(
            EventType::LlmStreamChunk,
            step,
            adapter,
            agent_id,
            tool_name,
            index,
        );
        let chunk = self.streams.lock().unwrap().get(stream_id).unwrap().chunks[index as usize].clone();
        event.outputs = OutputValue::inline(serde_json::to_value(&chunk).unwrap());
        event.stream_ref = Some(stream_id.to_string());

        self.enqueue(event)?;

        if is_final {
            self.finalize_stream(stream_id, None)?;
        }

        Ok(index)
    }

    /// Close a stream: append the terminal chunk if missing, then emit the
    /// `llm_stream_finish` summary event (spec.md §4.6, §4.5).
    pub fn finalize_stream(&self, stream_id: &str, total_tokens: Option<u64>) -> Result<u64> {
        self.ensure_open()?;

        let (chunk_count, adapter, agent_id, tool_name, needs_terminal) = {
            let mut streams = self.streams.lock().unwrap();
            let stream = streams.get_mut(stream_id).ok_or_else(|| {
                CoreError::new(ErrorCode::StreamNotOpen, format!("stream {stream_id} is not open"))
                    .with_run(self.run_id.clone(), None)
            })?;
            if stream.finalized {
                return Err(CoreError::new(
                    ErrorCode::StreamAlreadyFinalized,
                    format!("stream {stream_id} is already finalized"),
                )
                .with_run(self.run_id.clone(), None));
            }
            let needs_terminal = !stream.chunks.last().map(|c| c.is_final).unwrap_or(false);
            (
                stream.chunks.len() as u64 + if needs_terminal { 1 } else { 0 },
                stream.adapter.clone(),
                stream.agent_id.clone(),
                stream.tool_name.clone(),
                needs_terminal,
            )
        };

        if needs_terminal {
            self.append_terminal_chunk(stream_id, &adapter, &agent_id, &tool_name)?;
        }

        let content: String = {
            let mut streams = self.streams.lock().unwrap();
            let stream = streams.get_mut(stream_id).unwrap();
            stream.finalized = true;
            stream.chunks.iter().map(|c| c.content.as_str()).collect()
        };

        let step = self.next_step();
        let tuple = (EventType::LlmStreamFinish, adapter.clone(), agent_id.clone(), tool_name.clone());
        let call_index = self.next_call_index(tuple);

        let summary = StreamSummary {
            chunk_count,
            total_tokens,
            content,
        };

        let mut event = self.base_event(EventType::LlmStreamFinish, step, adapter, agent_id, tool_name, call_index);
        event.outputs = OutputValue::inline(serde_json::to_value(&summary).unwrap());
        event.stream_ref = Some(stream_id.to_string());
        event.tokens = total_tokens.map(|t| TokenUsage {
            input_tokens: None,
            output_tokens: None,
            total_tokens: Some(t),
        });

        self.enqueue(event)?;
        self.telemetry.send(TelemetryEvent::StreamFinalized {
            stream_id: stream_id.to_string(),
            chunk_count,
        });

        Ok(chunk_count)
    }

    fn append_terminal_chunk(
        &self,
        stream_id: &str,
        adapter: &str,
        agent_id: &str,
        tool_name: &Option<String>,
    ) -> Result<()> {
        let index = {
            let mut streams = self.streams.lock().unwrap();
            let stream = streams.get_mut(stream_id).unwrap();
            let index = stream.chunks.len() as u64;
            stream.chunks.push(Chunk {
                index,
                content: String::new(),
                timestamp: Utc::now(),
                is_final: true,
                metadata: None,
            });
            index
        };

        let step = self.next_step();
        let mut event = self.base_event(
            EventType::LlmStreamChunk,
            step,
            adapter.to_string(),
            agent_id.to_string(),
            tool_name.clone(),
            index,
        );
        let chunk = self.streams.lock().unwrap().get(stream_id).unwrap().chunks[index as usize].clone();
        event.outputs = OutputValue::inline(serde_json::to_value(&chunk).unwrap());
        event.stream_ref = Some(stream_id.to_string());
        self.enqueue(event)
    }

    /// Emit a `replay_checkpoint` marker event (spec.md §4.6 `checkpoint`).
    pub fn checkpoint(&self, label: impl Into<String>, metadata: Option<Value>) -> Result<()> {
        self.ensure_open()?;
        let step = self.next_step();
        let mut event = self.base_event(
            EventType::ReplayCheckpoint,
            step,
            "core".to_string(),
            "core".to_string(),
            None,
            0,
        );
        event.outputs = OutputValue::inline(Value::String(label.into()));
        event.metadata = metadata.unwrap_or_else(|| json!({}));
        self.enqueue(event)
    }

    /// Drain the writer, write the manifest, and close the run (spec.md
    /// §4.6 `stop`). Streams left unfinalized are recorded in the manifest's
    /// `incomplete_streams` and the call still fails with
    /// `IncompleteStreams` once the manifest is durably written — the
    /// manifest is not held hostage to the error (spec.md §4.5 "surfaced in
    /// the manifest as `incomplete_streams`").
    pub fn stop(self) -> Result<Manifest> {
        {
            let mut state = self.state.lock().unwrap();
            *state = RunState::Draining;
        }

        let incomplete_streams: Vec<StreamId> = self
            .streams
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, s)| !s.finalized)
            .map(|(id, _)| id.clone())
            .collect();

        let writer = self
            .writer
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| CoreError::new(ErrorCode::RunNotOpen, "run already stopped"))?;
        let outcome = writer.stop()?;

        let manifest = Manifest {
            schema_version: SCHEMA_VERSION.to_string(),
            run_id: self.run_id.clone(),
            adapter: self.meta.adapter.clone(),
            adapter_version: self.meta.adapter_version.clone(),
            created_at: self.created_at,
            closed_at: Some(Utc::now()),
            git_sha: self.meta.git_sha.clone(),
            config_digest: self.config_digest.clone(),
            model_ids: self.meta.model_ids.clone(),
            seeds: self.meta.seeds.clone(),
            files: outcome.segments,
            redaction_applied: outcome.redaction_applied,
            compression: self.config.compression,
            total_events: outcome.total_events,
            total_chunks: 0,
            incomplete_streams: incomplete_streams.clone(),
        };

        write_manifest_atomic(&self.layout, &manifest)?;

        {
            let mut state = self.state.lock().unwrap();
            *state = RunState::Closed;
        }
        self.telemetry.send(TelemetryEvent::RunClosed {
            run_id: self.run_id.clone(),
            total_events: manifest.total_events,
        });

        if !incomplete_streams.is_empty() {
            return Err(CoreError::new(
                ErrorCode::IncompleteStreams,
                format!("{} stream(s) never finalized", incomplete_streams.len()),
            )
            .with_run(self.run_id.clone(), None));
        }

        Ok(manifest)
    }
}

fn offload_if_large(layout: &RunLayout, outputs: OutputValue, threshold: usize) -> Result<OutputValue> {
    let OutputValue::Inline { value } = &outputs else {
        return Ok(outputs);
    };
    let encoded = serde_json::to_vec(value)
        .map_err(|e| CoreError::new(ErrorCode::Io, format!("serializing output: {e}")))?;
    if encoded.len() < threshold {
        return Ok(outputs);
    }

    let blob_id = Uuid::new_v4().to_string();
    let path = layout.outputs_dir().join(format!("{blob_id}.bin"));
    std::fs::write(&path, &encoded).map_err(|e| CoreError::io("writing offloaded output blob", e))?;
    let hash = blake3::hash(&encoded).to_hex().to_string();

    Ok(OutputValue::Blob {
        blob: rrcore_types::BlobRef {
            path: format!("outputs/{blob_id}.bin"),
            size: encoded.len() as u64,
            blake3: hash,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta() -> RunMeta {
        RunMeta {
            adapter: "test-adapter".to_string(),
            adapter_version: "0.1.0".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn records_events_and_produces_a_manifest_on_stop() {
        let temp = tempfile::tempdir().unwrap();
        let (recorder, _telemetry) =
            Recorder::start(temp.path(), "run-1".to_string(), meta(), LedgerConfig::default(), None).unwrap();

        let recorded = recorder
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
        assert_eq!(recorded.step, 0);
        assert_eq!(recorded.call_index, 0);

        let manifest = recorder.stop().unwrap();
        assert_eq!(manifest.total_events, 1);
        assert!(manifest.incomplete_streams.is_empty());
    }

    #[test]
    fn call_index_increments_per_tuple_independently() {
        let temp = tempfile::tempdir().unwrap();
        let (recorder, _telemetry) =
            Recorder::start(temp.path(), "run-1".to_string(), meta(), LedgerConfig::default(), None).unwrap();

        let a0 = recorder
            .record_event(EventType::ToolCall, "a", "agent-1", Some("bash".to_string()), &json!({}), json!({}), 1, None)
            .unwrap();
        let b0 = recorder
            .record_event(EventType::ToolCall, "a", "agent-1", Some("python".to_string()), &json!({}), json!({}), 1, None)
            .unwrap();
        let a1 = recorder
            .record_event(EventType::ToolCall, "a", "agent-1", Some("bash".to_string()), &json!({}), json!({}), 1, None)
            .unwrap();

        assert_eq!(a0.call_index, 0);
        assert_eq!(b0.call_index, 0);
        assert_eq!(a1.call_index, 1);

        recorder.stop().unwrap();
    }

    #[test]
    fn unfinalized_stream_fails_stop_but_still_writes_manifest() {
        let temp = tempfile::tempdir().unwrap();
        let (recorder, _telemetry) =
            Recorder::start(temp.path(), "run-1".to_string(), meta(), LedgerConfig::default(), None).unwrap();

        let stream_id = recorder
            .start_stream("claude-code", "agent-1", None, &json!({"prompt": "hi"}))
            .unwrap();
        recorder.append_chunk(&stream_id, "partial", None, false).unwrap();

        let err = recorder.stop().unwrap_err();
        assert_eq!(err.code, ErrorCode::IncompleteStreams);
    }

    #[test]
    fn finalized_stream_emits_start_chunk_and_finish_events() {
        let temp = tempfile::tempdir().unwrap();
        let (recorder, _telemetry) =
            Recorder::start(temp.path(), "run-1".to_string(), meta(), LedgerConfig::default(), None).unwrap();

        let stream_id = recorder
            .start_stream("claude-code", "agent-1", None, &json!({"prompt": "hi"}))
            .unwrap();
        recorder.append_chunk(&stream_id, "hello ", None, false).unwrap();
        let chunk_count = recorder.append_chunk(&stream_id, "world", None, true).unwrap();
        assert_eq!(chunk_count, 1);

        let manifest = recorder.stop().unwrap();
        assert!(manifest.incomplete_streams.is_empty());
        assert_eq!(manifest.total_events, 4); // start, chunk, chunk(final), finish
    }

    #[test]
    fn run_already_open_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let (recorder, _telemetry) =
            Recorder::start(temp.path(), "run-1".to_string(), meta(), LedgerConfig::default(), None).unwrap();
        recorder.stop().unwrap();

        let err = Recorder::start(temp.path(), "run-1".to_string(), meta(), LedgerConfig::default(), None)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::RunAlreadyOpen);
    }
}
