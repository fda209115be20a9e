use std::time::Instant;

use rrcore_engine::{MatchResult, Recorder, ReplaySession, StreamReplay};
use rrcore_types::{EventType, OutputValue, StreamId};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::hook::Hook;

/// The record-mode half of the interception surface: wraps a `Recorder`
/// without exposing it, so adapters only ever see `call`/stream methods.
pub struct RecordHandle<'a> {
    recorder: &'a Recorder,
}

impl<'a> RecordHandle<'a> {
    pub fn new(recorder: &'a Recorder) -> Self {
        Self { recorder }
    }

    pub fn start_stream(
        &self,
        adapter: impl Into<String>,
        agent_id: impl Into<String>,
        tool_name: Option<String>,
        inputs: &Value,
    ) -> Result<StreamId> {
        Ok(self.recorder.start_stream(adapter, agent_id, tool_name, inputs)?)
    }

    pub fn append_chunk(
        &self,
        stream_id: &str,
        content: impl Into<String>,
        metadata: Option<Value>,
        is_final: bool,
    ) -> Result<u64> {
        Ok(self.recorder.append_chunk(stream_id, content, metadata, is_final)?)
    }

    pub fn finalize_stream(&self, stream_id: &str, total_tokens: Option<u64>) -> Result<u64> {
        Ok(self.recorder.finalize_stream(stream_id, total_tokens)?)
    }
}

/// The replay-mode half of the interception surface: wraps a `ReplaySession`
/// without exposing it.
pub struct ReplayHandle<'a> {
    session: &'a ReplaySession,
}

impl<'a> ReplayHandle<'a> {
    pub fn new(session: &'a ReplaySession) -> Self {
        Self { session }
    }

    pub fn stream(&self, stream_ref: &str, preserve_timing: bool) -> Result<StreamReplay> {
        Ok(self.session.replay_stream(stream_ref, preserve_timing)?)
    }
}

/// Resolves an `OutputValue` to the `Value` a hook call should yield. Blob
/// outputs can't be inlined without the ledger's layout, which this surface
/// deliberately never exposes, so they surface as a reference the caller can
/// follow manually instead of being read transparently.
fn resolve_outputs(outputs: &OutputValue) -> Value {
    match outputs {
        OutputValue::Inline { value } => value.clone(),
        OutputValue::Blob { blob } => serde_json::json!({
            "blob_path": blob.path,
            "blob_size": blob.size,
            "blob_blake3": blob.blake3,
        }),
    }
}

/// Executes the live call through `hook`, then records it (spec.md §4.8:
/// "In record mode: execute the live call, then invoke Recorder").
#[allow(clippy::too_many_arguments)]
pub fn record_call(
    handle: &RecordHandle<'_>,
    event_type: EventType,
    adapter: impl Into<String>,
    agent_id: impl Into<String>,
    tool_name: Option<String>,
    inputs: &Value,
    hook: &dyn Hook,
) -> Result<Value> {
    let adapter = adapter.into();
    let agent_id = agent_id.into();

    let started = Instant::now();
    let outputs = hook.invoke(inputs).map_err(Error::Hook)?;
    let duration_ms = started.elapsed().as_millis() as u64;

    handle.recorder.record_event(
        event_type,
        adapter,
        agent_id,
        tool_name,
        inputs,
        outputs.clone(),
        duration_ms,
        None,
    )?;

    Ok(outputs)
}

/// Looks up a recorded call and returns its outputs without invoking any live
/// dependency (spec.md §4.8: "In replay mode: invoke Player.lookup; on match
/// return recorded outputs ... on miss, follow the active mode's policy").
/// In `strict` mode a miss surfaces as an `Err` from `lookup` itself, so by
/// the time this ever sees a `Mismatch` the active mode is `warn` or
/// `hybrid`: both fall back to the recorded output when the key matched but
/// inputs or type diverged (spec.md §4.7), falling back to `Value::Null`
/// only when nothing was ever recorded for the call.
pub fn replay_call(
    handle: &ReplayHandle<'_>,
    event_type: EventType,
    adapter: impl Into<String>,
    agent_id: impl Into<String>,
    tool_name: Option<String>,
    inputs: &Value,
) -> Result<Value> {
    let result = handle
        .session
        .lookup(event_type, adapter, agent_id, tool_name, inputs, None)?;

    Ok(match result {
        MatchResult::Matched { outputs, .. } => resolve_outputs(&outputs),
        MatchResult::Mismatch(mismatch) => mismatch
            .available()
            .map(resolve_outputs)
            .unwrap_or(Value::Null),
    })
}
