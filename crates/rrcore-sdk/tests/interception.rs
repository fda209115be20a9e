//! Exercises the interception surface end to end: record through a live
//! hook, then replay the same call without invoking it again.

use rrcore_engine::recorder::{Recorder, RunMeta};
use rrcore_engine::player::Player;
use rrcore_sdk::{record_call, replay_call, RecordHandle, ReplayHandle};
use rrcore_types::{EventType, LedgerConfig, ReplayMode};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

fn meta() -> RunMeta {
    RunMeta {
        adapter: "bash-adapter".to_string(),
        adapter_version: "0.1.0".to_string(),
        ..Default::default()
    }
}

struct CountingHook<'a> {
    calls: &'a AtomicUsize,
}

impl<'a> rrcore_sdk::Hook for CountingHook<'a> {
    fn invoke(&self, inputs: &Value) -> std::result::Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"echo": inputs["cmd"]}))
    }
}

#[test]
fn record_then_replay_without_invoking_the_live_hook_again() {
    let temp = tempfile::tempdir().unwrap();
    let config = LedgerConfig::default();

    let live_calls = AtomicUsize::new(0);
    let hook = CountingHook { calls: &live_calls };

    let (recorder, _telemetry) =
        Recorder::start(temp.path(), "run-sdk".to_string(), meta(), config.clone(), None).unwrap();
    let record_handle = RecordHandle::new(&recorder);

    let inputs = json!({"cmd": "ls -la"});
    let outputs = record_call(
        &record_handle,
        EventType::ToolCall,
        "bash-adapter",
        "agent-1",
        Some("bash".to_string()),
        &inputs,
        &hook,
    )
    .unwrap();
    assert_eq!(outputs, json!({"echo": "ls -la"}));
    assert_eq!(live_calls.load(Ordering::SeqCst), 1);

    recorder.stop().unwrap();

    let player = Player::load(temp.path(), "run-sdk", config, None, ReplayMode::Strict).unwrap();
    let session = player.start_replay(None);
    let replay_handle = ReplayHandle::new(&session);

    let replayed = replay_call(
        &replay_handle,
        EventType::ToolCall,
        "bash-adapter",
        "agent-1",
        Some("bash".to_string()),
        &inputs,
    )
    .unwrap();

    assert_eq!(replayed, json!({"echo": "ls -la"}));
    // the hook was never invoked a second time: replay substituted the
    // recorded output instead of touching the live dependency
    assert_eq!(live_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn replay_miss_in_strict_mode_surfaces_as_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let config = LedgerConfig::default();

    let (recorder, _telemetry) =
        Recorder::start(temp.path(), "run-sdk-miss".to_string(), meta(), config.clone(), None).unwrap();
    recorder
        .record_event(
            EventType::ToolCall,
            "bash-adapter",
            "agent-1",
            Some("bash".to_string()),
            &json!({"cmd": "ls"}),
            json!({"stdout": "a.txt\n"}),
            1,
            None,
        )
        .unwrap();
    recorder.stop().unwrap();

    let player = Player::load(temp.path(), "run-sdk-miss", config, None, ReplayMode::Strict).unwrap();
    let session = player.start_replay(None);
    let replay_handle = ReplayHandle::new(&session);

    let err = replay_call(
        &replay_handle,
        EventType::ToolCall,
        "bash-adapter",
        "agent-1",
        Some("python".to_string()),
        &json!({"cmd": "print(1)"}),
    )
    .unwrap_err();

    assert!(matches!(err, rrcore_sdk::Error::Core(_)));
}

#[test]
fn replay_mismatch_in_hybrid_mode_falls_back_to_recorded_output() {
    let temp = tempfile::tempdir().unwrap();
    let config = LedgerConfig::default();

    let (recorder, _telemetry) =
        Recorder::start(temp.path(), "run-sdk-hybrid".to_string(), meta(), config.clone(), None).unwrap();
    recorder
        .record_event(
            EventType::ToolCall,
            "bash-adapter",
            "agent-1",
            Some("bash".to_string()),
            &json!({"cmd": "ls"}),
            json!({"stdout": "a.txt\n"}),
            1,
            None,
        )
        .unwrap();
    recorder.stop().unwrap();

    let player = Player::load(temp.path(), "run-sdk-hybrid", config, None, ReplayMode::Hybrid).unwrap();
    let session = player.start_replay(None);
    let replay_handle = ReplayHandle::new(&session);

    // Same key, drifted inputs: a fingerprint miss whose recorded output is
    // still available and must be returned, not `Value::Null`.
    let replayed = replay_call(
        &replay_handle,
        EventType::ToolCall,
        "bash-adapter",
        "agent-1",
        Some("bash".to_string()),
        &json!({"cmd": "ls -la"}),
    )
    .unwrap();

    assert_eq!(replayed, json!({"stdout": "a.txt\n"}));
}
