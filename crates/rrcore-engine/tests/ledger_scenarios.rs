//! End-to-end scenarios spanning normalize → ledger → engine: segment
//! rollover under sustained load and tamper detection on replay.

use rrcore_engine::recorder::{Recorder, RunMeta};
use rrcore_types::{Compression, EventType, LedgerConfig};
use serde_json::json;

fn meta() -> RunMeta {
    RunMeta {
        adapter: "load-test-adapter".to_string(),
        adapter_version: "0.1.0".to_string(),
        ..Default::default()
    }
}

#[test]
fn sustained_recording_rolls_over_multiple_segments() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = LedgerConfig::default();
    // Uncompressed so the rollover threshold depends only on serialized
    // record size, not on how well the payload happens to compress.
    config.compression = Compression::None;
    config.max_segment_size_mb = 10; // the floor allowed by validate()

    let (recorder, _telemetry) =
        Recorder::start(temp.path(), "run-rollover".to_string(), meta(), config, None).unwrap();

    let padding = "x".repeat(1200);
    for i in 0..11_000u32 {
        recorder
            .record_event(
                EventType::ToolCall,
                "load-test",
                "agent-1",
                Some("bash".to_string()),
                &json!({"cmd": format!("step-{i}")}),
                json!({"stdout": padding}),
                1,
                None,
            )
            .unwrap();
    }

    let manifest = recorder.stop().unwrap();
    assert_eq!(manifest.total_events, 11_000);
    assert!(
        manifest.files.len() > 1,
        "expected sustained recording to roll over at least one segment, got {} segment(s)",
        manifest.files.len()
    );
}

#[test]
fn corrupted_segment_is_rejected_on_load() {
    let temp = tempfile::tempdir().unwrap();
    let mut config = LedgerConfig::default();
    // Uncompressed so a flipped byte always surfaces as a malformed record
    // or a trailer mismatch, rather than risking a zstd frame-level error
    // that bypasses our own integrity classification.
    config.compression = Compression::None;

    let (recorder, _telemetry) =
        Recorder::start(temp.path(), "run-tamper".to_string(), meta(), config, None).unwrap();
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

    let layout = rrcore_ledger::RunLayout::new(temp.path(), &"run-tamper".to_string());
    let segment_path = layout.segment_path(0, Compression::None);
    let mut bytes = std::fs::read(&segment_path).unwrap();
    for (i, byte) in bytes.iter_mut().enumerate() {
        if i % 7 == 0 {
            *byte ^= 0xFF;
        }
    }
    std::fs::write(&segment_path, bytes).unwrap();

    let err = rrcore_engine::player::Player::load(
        temp.path(),
        "run-tamper",
        LedgerConfig::default(),
        None,
        rrcore_types::ReplayMode::Strict,
    )
    .unwrap_err();
    assert_eq!(err.code, rrcore_types::ErrorCode::LedgerIntegrityError);
}
