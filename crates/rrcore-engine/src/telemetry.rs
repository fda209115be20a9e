use rrcore_types::{EventType, RunId};

/// Side-channel events emitted alongside the durable ledger (spec.md §4.6
/// "telemetry events emitted through a sibling channel"). Never durable —
/// losing the receiver end loses telemetry, never data.
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    RunOpened { run_id: RunId },
    EventRecorded { event_type: EventType, step: u64 },
    StreamStarted { stream_id: String },
    StreamFinalized { stream_id: String, chunk_count: u64 },
    SegmentRolled { index: u32 },
    QueueFull,
    WriterFailed { message: String },
    RunClosed { run_id: RunId, total_events: u64 },
}

/// Sending half held by the Recorder. `send` never blocks and never fails
/// the caller's operation: telemetry is best-effort.
#[derive(Clone)]
pub struct TelemetrySender(std::sync::mpsc::Sender<TelemetryEvent>);

impl TelemetrySender {
    pub fn send(&self, event: TelemetryEvent) {
        let _ = self.0.send(event);
    }
}

/// Creates a telemetry channel. The receiver is handed to the caller of
/// `Recorder::start`; dropping it is safe and simply silences telemetry.
pub fn channel() -> (TelemetrySender, std::sync::mpsc::Receiver<TelemetryEvent>) {
    let (tx, rx) = std::sync::mpsc::channel();
    (TelemetrySender(tx), rx)
}
