use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use rrcore_normalize::Redactor;
use rrcore_types::{
    CoreError, ErrorCode, Event, FileEntry, LedgerConfig, OutputValue, QueueFullPolicy, Result,
    RunId, SCHEMA_VERSION,
};

use crate::layout::RunLayout;
use crate::manifest::hash_file;
use crate::segment::{zero_hash, SegmentHeader, SegmentWriter};

enum WriteCommand {
    Event(Box<Event>),
    Stop,
}

/// What the writer produced over the lifetime of a run, handed back to the
/// Recorder at `stop()` to build the manifest (spec.md §4.6).
pub struct WriterOutcome {
    pub segments: Vec<FileEntry>,
    pub total_events: u64,
    pub redaction_applied: bool,
}

/// The single writer task every producer funnels through (spec.md §4.3,
/// §5). Owns the segment file handles; no other task touches them.
pub struct BackgroundWriter {
    sender: SyncSender<WriteCommand>,
    handle: Option<JoinHandle<Result<WriterOutcome>>>,
    policy: QueueFullPolicy,
    sticky_failure: Arc<Mutex<Option<String>>>,
}

impl BackgroundWriter {
    pub fn start(
        layout: RunLayout,
        run_id: RunId,
        config: LedgerConfig,
        redactor: Redactor,
    ) -> Result<Self> {
        layout.ensure_dirs()?;

        let (sender, receiver) = sync_channel(config.write_queue_capacity);
        let sticky_failure = Arc::new(Mutex::new(None));
        let sticky_for_thread = sticky_failure.clone();
        let policy = config.queue_full_policy;

        let handle = std::thread::Builder::new()
            .name("rrcore-background-writer".to_string())
            .spawn(move || {
                let outcome = writer_loop(layout, run_id, config, redactor, receiver);
                if let Err(err) = &outcome {
                    *sticky_for_thread.lock().unwrap() = Some(err.to_string());
                }
                outcome
            })
            .map_err(|e| CoreError::io("spawning background writer thread", e))?;

        Ok(Self {
            sender,
            handle: Some(handle),
            policy,
            sticky_failure,
        })
    }

    fn check_sticky(&self) -> Result<()> {
        if let Some(message) = self.sticky_failure.lock().unwrap().clone() {
            return Err(CoreError::new(ErrorCode::WriterFailed, message));
        }
        Ok(())
    }

    /// Enqueue an event for durable storage. Non-blocking under
    /// `fail_fast`; blocks the caller under `block` (spec.md §4.6, §5).
    pub fn enqueue_event(&self, event: Event) -> Result<()> {
        self.check_sticky()?;
        let command = WriteCommand::Event(Box::new(event));
        match self.policy {
            QueueFullPolicy::FailFast => match self.sender.try_send(command) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => {
                    Err(CoreError::new(ErrorCode::QueueOverflow, "write queue is full"))
                }
                Err(TrySendError::Disconnected(_)) => Err(CoreError::new(
                    ErrorCode::WriterFailed,
                    "background writer has stopped",
                )),
            },
            QueueFullPolicy::Block => self.sender.send(command).map_err(|_| {
                CoreError::new(ErrorCode::WriterFailed, "background writer has stopped")
            }),
        }
    }

    /// Drain the queue, finalize the current segment, and join the writer
    /// thread (spec.md §4.6 `stop`, §5 "`stop()` blocks the caller until
    /// the writer has drained").
    pub fn stop(mut self) -> Result<WriterOutcome> {
        let _ = self.sender.send(WriteCommand::Stop);
        let handle = self
            .handle
            .take()
            .expect("BackgroundWriter::stop called more than once");
        match handle.join() {
            Ok(outcome) => outcome,
            Err(_) => Err(CoreError::new(
                ErrorCode::WriterFailed,
                "background writer thread panicked",
            )),
        }
    }
}

fn writer_loop(
    layout: RunLayout,
    run_id: RunId,
    config: LedgerConfig,
    redactor: Redactor,
    receiver: Receiver<WriteCommand>,
) -> Result<WriterOutcome> {
    let max_bytes = config.max_segment_size_bytes();
    let mut segment_index: u32 = 0;
    let mut previous_hash = zero_hash();
    let mut segments = Vec::new();
    let mut total_events = 0u64;
    let mut redaction_applied = false;

    let mut writer = open_segment(&layout, &run_id, segment_index, &previous_hash, config.compression)?;

    loop {
        let command = receiver.recv().map_err(|_| {
            CoreError::new(
                ErrorCode::WriterFailed,
                "write queue sender dropped without a Stop command",
            )
        })?;

        match command {
            WriteCommand::Event(mut event) => {
                if redact_event(&redactor, &mut event) {
                    redaction_applied = true;
                }
                writer.append_event(&event)?;
                total_events += 1;
            }
            WriteCommand::Stop => break,
        }

        if writer.bytes_written() >= max_bytes {
            let finalized = writer.finalize()?;
            segments.push(hash_file(&finalized.path)?);
            previous_hash = finalized.rolling_hash;
            segment_index += 1;
            writer = open_segment(&layout, &run_id, segment_index, &previous_hash, config.compression)?;
        }
    }

    let finalized = writer.finalize()?;
    segments.push(hash_file(&finalized.path)?);

    Ok(WriterOutcome {
        segments,
        total_events,
        redaction_applied,
    })
}

fn open_segment(
    layout: &RunLayout,
    run_id: &RunId,
    segment_index: u32,
    previous_hash: &str,
    compression: rrcore_types::Compression,
) -> Result<SegmentWriter> {
    SegmentWriter::open(
        layout.segment_path(segment_index, compression),
        SegmentHeader {
            schema_version: SCHEMA_VERSION.to_string(),
            run_id: run_id.clone(),
            segment_index,
            previous_segment_hash: previous_hash.to_string(),
        },
        compression,
    )
}

/// Redact an event's preview and inline output in place. Runs after
/// fingerprinting so redaction never changes what a fingerprint means
/// (spec.md §4.9).
fn redact_event(redactor: &Redactor, event: &mut Event) -> bool {
    let mut applied = false;

    if let Some(preview) = &event.inputs_preview {
        let (redacted, fired) = redactor.redact(preview);
        applied |= fired;
        event.inputs_preview = Some(redacted);
    }

    if let OutputValue::Inline { value } = &mut event.outputs {
        let (redacted, fired) = redactor.redact_value(value);
        applied |= fired;
        *value = redacted;
    }

    applied
}
