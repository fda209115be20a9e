use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rrcore_types::{Compression, CoreError, ErrorCode, Event, Result, RunId};
use serde::{Deserialize, Serialize};

/// First record of every segment (spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentHeader {
    pub schema_version: String,
    pub run_id: RunId,
    pub segment_index: u32,
    /// Hex BLAKE3 rolling hash of the previous segment, or 64 zero chars
    /// for segment 0.
    pub previous_segment_hash: String,
}

/// Last record of every segment (spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentTrailer {
    pub record_count: u64,
    pub rolling_hash: String,
}

/// One physical record written into a segment file. Events are tagged so a
/// reader can distinguish the bracketing header/trailer from the event body
/// without relying on position alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentRecord {
    Header(SegmentHeader),
    Event(Box<Event>),
    Trailer(SegmentTrailer),
}

pub fn zero_hash() -> String {
    "0".repeat(64)
}

struct CountingWriter<W> {
    inner: W,
    count: Arc<AtomicU64>,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

enum Sink {
    Plain(CountingWriter<File>),
    Zstd(Box<zstd::stream::write::Encoder<'static, CountingWriter<File>>>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            Sink::Zstd(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Zstd(w) => w.flush(),
        }
    }
}

pub struct SegmentFinalizeResult {
    pub path: PathBuf,
    pub rolling_hash: String,
}

/// Writes one segment: a header, a run of event records, and a trailer,
/// with a rolling BLAKE3 hash over the event bodies (spec.md §4.3).
pub struct SegmentWriter {
    sink: Sink,
    bytes_written: Arc<AtomicU64>,
    event_hasher: blake3::Hasher,
    record_count: u64,
    path: PathBuf,
}

impl SegmentWriter {
    pub fn open(path: PathBuf, header: SegmentHeader, compression: Compression) -> Result<Self> {
        let file = File::create(&path)
            .map_err(|e| CoreError::io(format!("creating segment {}", path.display()), e))?;
        let bytes_written = Arc::new(AtomicU64::new(0));
        let counting = CountingWriter {
            inner: file,
            count: bytes_written.clone(),
        };
        let sink = match compression {
            Compression::Zstd => {
                let encoder = zstd::stream::write::Encoder::new(counting, 0)
                    .map_err(|e| CoreError::io("opening zstd encoder", e))?;
                Sink::Zstd(Box::new(encoder))
            }
            Compression::None => Sink::Plain(counting),
        };

        let mut writer = Self {
            sink,
            bytes_written,
            event_hasher: blake3::Hasher::new(),
            record_count: 0,
            path,
        };
        writer.write_raw(&SegmentRecord::Header(header))?;
        Ok(writer)
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    pub fn append_event(&mut self, event: &Event) -> Result<()> {
        let record = SegmentRecord::Event(Box::new(event.clone()));
        let body = self.write_raw(&record)?;
        self.event_hasher.update(&body);
        self.record_count += 1;
        Ok(())
    }

    /// Serialize `record`, write its length-prefixed frame, and return the
    /// serialized body (so callers can feed it into the rolling hash).
    fn write_raw(&mut self, record: &SegmentRecord) -> Result<Vec<u8>> {
        let body = serde_json::to_vec(record)
            .map_err(|e| CoreError::new(ErrorCode::Io, format!("serializing segment record: {e}")))?;
        let len = u32::try_from(body.len())
            .map_err(|_| CoreError::new(ErrorCode::Io, "segment record exceeds 4 GiB frame limit"))?;
        self.sink
            .write_all(&len.to_be_bytes())
            .map_err(|e| CoreError::io("writing segment record length prefix", e))?;
        self.sink
            .write_all(&body)
            .map_err(|e| CoreError::io("writing segment record body", e))?;
        Ok(body)
    }

    /// Write the trailer, finish zstd framing, and fsync the segment file
    /// (spec.md §4.3: "finalized (trailer written, fsync'd) before a new
    /// segment is opened").
    pub fn finalize(mut self) -> Result<SegmentFinalizeResult> {
        let rolling_hash = self.event_hasher.finalize().to_hex().to_string();
        self.write_raw(&SegmentRecord::Trailer(SegmentTrailer {
            record_count: self.record_count,
            rolling_hash: rolling_hash.clone(),
        }))?;

        let counting = match self.sink {
            Sink::Plain(w) => w,
            Sink::Zstd(encoder) => encoder
                .finish()
                .map_err(|e| CoreError::io("finishing zstd frame", e))?,
        };
        counting
            .inner
            .sync_all()
            .map_err(|e| CoreError::io("fsyncing segment file", e))?;

        Ok(SegmentFinalizeResult {
            path: self.path,
            rolling_hash,
        })
    }
}

/// Contents of a fully validated segment, as read by the Player.
pub struct SegmentContents {
    pub header: SegmentHeader,
    pub events: Vec<Event>,
    pub trailer: SegmentTrailer,
}

/// Read and validate one segment file (spec.md §4.3 read algorithm): the
/// rolling hash over event bodies and the record count are recomputed and
/// checked against the trailer; any mismatch is a `LedgerIntegrityError`.
pub fn read_segment(path: &Path, compression: Compression) -> Result<SegmentContents> {
    let file = File::open(path).map_err(|e| CoreError::io(format!("opening segment {}", path.display()), e))?;
    let mut reader: Box<dyn Read> = match compression {
        Compression::Zstd => Box::new(
            zstd::stream::read::Decoder::new(file)
                .map_err(|e| CoreError::io("opening zstd decoder", e))?,
        ),
        Compression::None => Box::new(file),
    };

    let mut header = None;
    let mut trailer = None;
    let mut events = Vec::new();
    let mut hasher = blake3::Hasher::new();
    let mut record_count = 0u64;

    loop {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(CoreError::io("reading segment record length prefix", e)),
        }
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut body = vec![0u8; len];
        reader
            .read_exact(&mut body)
            .map_err(|e| CoreError::io("reading segment record body", e))?;

        let record: SegmentRecord = serde_json::from_slice(&body).map_err(|e| {
            integrity_error(path, format!("corrupt record: {e}"))
        })?;

        match record {
            SegmentRecord::Header(h) => header = Some(h),
            SegmentRecord::Event(event) => {
                hasher.update(&body);
                record_count += 1;
                events.push(*event);
            }
            SegmentRecord::Trailer(t) => trailer = Some(t),
        }
    }

    let header = header.ok_or_else(|| integrity_error(path, "missing segment header"))?;
    let trailer = trailer.ok_or_else(|| integrity_error(path, "missing segment trailer"))?;

    let computed_hash = hasher.finalize().to_hex().to_string();
    if computed_hash != trailer.rolling_hash {
        return Err(integrity_error(
            path,
            "rolling hash mismatch: segment truncated or tampered",
        ));
    }
    if record_count != trailer.record_count {
        return Err(integrity_error(path, "record count mismatch in trailer"));
    }

    Ok(SegmentContents {
        header,
        events,
        trailer,
    })
}

fn integrity_error(path: &Path, reason: impl std::fmt::Display) -> CoreError {
    CoreError::new(
        ErrorCode::LedgerIntegrityError,
        format!("segment {}: {reason}", path.display()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rrcore_types::{EventType, Fingerprint, OutputValue};
    use serde_json::json;

    fn sample_event(step: u64) -> Event {
        Event {
            schema_version: rrcore_types::SCHEMA_VERSION.to_string(),
            event_type: EventType::ToolCall,
            step,
            timestamp: chrono::Utc::now(),
            run_id: "run-1".to_string(),
            session_id: None,
            task_id: None,
            trace_id: None,
            span_id: None,
            adapter: "test".to_string(),
            agent_id: "agent-1".to_string(),
            tool_name: Some("bash".to_string()),
            call_index: step,
            inputs_fp: Fingerprint([step as u8; 32]),
            inputs_preview: None,
            outputs: OutputValue::inline(json!({"ok": true})),
            duration_ms: 10,
            cost: None,
            tokens: None,
            stream_ref: None,
            metadata: json!({}),
        }
    }

    #[test]
    fn round_trips_events_through_zstd_segment() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("events-000000.jsonl.zst");

        let header = SegmentHeader {
            schema_version: rrcore_types::SCHEMA_VERSION.to_string(),
            run_id: "run-1".to_string(),
            segment_index: 0,
            previous_segment_hash: zero_hash(),
        };
        let mut writer = SegmentWriter::open(path.clone(), header, Compression::Zstd).unwrap();
        writer.append_event(&sample_event(0)).unwrap();
        writer.append_event(&sample_event(1)).unwrap();
        writer.finalize().unwrap();

        let contents = read_segment(&path, Compression::Zstd).unwrap();
        assert_eq!(contents.events.len(), 2);
        assert_eq!(contents.trailer.record_count, 2);
        assert_eq!(contents.header.segment_index, 0);
    }

    #[test]
    fn round_trips_events_through_uncompressed_segment() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("events-000000.jsonl");

        let header = SegmentHeader {
            schema_version: rrcore_types::SCHEMA_VERSION.to_string(),
            run_id: "run-1".to_string(),
            segment_index: 0,
            previous_segment_hash: zero_hash(),
        };
        let mut writer = SegmentWriter::open(path.clone(), header, Compression::None).unwrap();
        writer.append_event(&sample_event(0)).unwrap();
        writer.finalize().unwrap();

        let contents = read_segment(&path, Compression::None).unwrap();
        assert_eq!(contents.events.len(), 1);
    }

    #[test]
    fn truncated_segment_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("events-000000.jsonl");

        let header = SegmentHeader {
            schema_version: rrcore_types::SCHEMA_VERSION.to_string(),
            run_id: "run-1".to_string(),
            segment_index: 0,
            previous_segment_hash: zero_hash(),
        };
        let mut writer = SegmentWriter::open(path.clone(), header, Compression::None).unwrap();
        writer.append_event(&sample_event(0)).unwrap();
        writer.finalize().unwrap();

        let mut bytes = std::fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 5);
        std::fs::write(&path, bytes).unwrap();

        let result = read_segment(&path, Compression::None);
        assert!(result.is_err());
    }
}
