//! The Run state machine: Recorder, Player, and the Stream Buffer built on
//! top of the event ledger (spec.md §4.5–§4.7, §4.10).

pub mod player;
pub mod recorder;
pub mod state;
pub mod telemetry;

pub use player::{MatchResult, Mismatch, Player, ReplaySession, ReplayStats, StreamReplay};
pub use recorder::{RecordedEvent, Recorder, RunMeta};
pub use state::{ReplayState, RunState};
pub use telemetry::{TelemetryEvent, TelemetrySender};
