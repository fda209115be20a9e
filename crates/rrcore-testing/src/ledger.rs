use std::path::PathBuf;

use rrcore_engine::recorder::{Recorder, RunMeta};
use rrcore_engine::player::Player;
use rrcore_types::{EventType, LedgerConfig, ReplayMode};
use serde_json::Value;
use tempfile::TempDir;

/// One pre-recorded call to seed into a `TestLedger`.
struct PlannedEvent {
    event_type: EventType,
    adapter: String,
    agent_id: String,
    tool_name: Option<String>,
    inputs: Value,
    outputs: Value,
    duration_ms: u64,
}

/// Fluent builder for a fully recorded run: declare the events a test needs,
/// then `build()` records them against a real `Recorder` in an isolated
/// temp directory and hands back a loadable `TestLedger`.
pub struct RunBuilder {
    run_id: String,
    meta: RunMeta,
    config: LedgerConfig,
    events: Vec<PlannedEvent>,
}

impl RunBuilder {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            meta: RunMeta {
                adapter: "test-adapter".to_string(),
                adapter_version: "0.0.0".to_string(),
                ..Default::default()
            },
            config: LedgerConfig::default(),
            events: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: LedgerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_meta(mut self, meta: RunMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_tool_call(
        self,
        adapter: impl Into<String>,
        agent_id: impl Into<String>,
        tool_name: impl Into<String>,
        inputs: Value,
        outputs: Value,
    ) -> Self {
        self.with_event(
            EventType::ToolCall,
            adapter,
            agent_id,
            Some(tool_name.into()),
            inputs,
            outputs,
        )
    }

    pub fn with_event(
        mut self,
        event_type: EventType,
        adapter: impl Into<String>,
        agent_id: impl Into<String>,
        tool_name: Option<String>,
        inputs: Value,
        outputs: Value,
    ) -> Self {
        self.events.push(PlannedEvent {
            event_type,
            adapter: adapter.into(),
            agent_id: agent_id.into(),
            tool_name,
            inputs,
            outputs,
            duration_ms: 1,
        });
        self
    }

    /// Records every planned event, stops the run, and returns a handle onto
    /// the resulting ledger directory.
    pub fn build(self) -> TestLedger {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let ledger_root = temp_dir.path().to_path_buf();

        let (recorder, _telemetry) = Recorder::start(
            &ledger_root,
            self.run_id.clone(),
            self.meta,
            self.config.clone(),
            None,
        )
        .expect("failed to start recorder");

        for event in self.events {
            recorder
                .record_event(
                    event.event_type,
                    event.adapter,
                    event.agent_id,
                    event.tool_name,
                    &event.inputs,
                    event.outputs,
                    event.duration_ms,
                    None,
                )
                .expect("failed to record planned event");
        }

        let manifest = recorder.stop().expect("failed to stop recorder");

        TestLedger {
            _temp_dir: temp_dir,
            ledger_root,
            run_id: self.run_id,
            config: self.config,
            total_events: manifest.total_events,
        }
    }
}

/// An isolated, already-recorded ledger directory, ready to be loaded back
/// with a `Player` under whatever `ReplayMode` a test needs.
pub struct TestLedger {
    _temp_dir: TempDir,
    ledger_root: PathBuf,
    run_id: String,
    config: LedgerConfig,
    total_events: u64,
}

impl TestLedger {
    pub fn ledger_root(&self) -> &PathBuf {
        &self.ledger_root
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn total_events(&self) -> u64 {
        self.total_events
    }

    pub fn load_player(&self, replay_mode: ReplayMode) -> Player {
        Player::load(
            &self.ledger_root,
            self.run_id.clone(),
            self.config.clone(),
            None,
            replay_mode,
        )
        .expect("failed to load player")
    }
}
