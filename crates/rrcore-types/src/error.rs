use std::fmt;

use crate::event::RunId;

/// Result type alias used throughout the record/replay core.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Stable error codes, matching the taxonomy in spec.md §7. The code is part
/// of the public contract: adapters may match on it, so variants are never
/// renamed once shipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    RunAlreadyOpen,
    RunNotOpen,
    NormalizationError,
    QueueOverflow,
    WriterFailed,
    IncompleteStreams,
    StreamNotOpen,
    StreamAlreadyFinalized,
    RunNotFound,
    LedgerIntegrityError,
    SchemaUnsupported,
    KeyMiss,
    FingerprintMiss,
    TypeMismatch,
    OrderMismatch,
    NotLoaded,
    StreamMissing,
    Io,
    Config,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RunAlreadyOpen => "run_already_open",
            ErrorCode::RunNotOpen => "run_not_open",
            ErrorCode::NormalizationError => "normalization_error",
            ErrorCode::QueueOverflow => "queue_overflow",
            ErrorCode::WriterFailed => "writer_failed",
            ErrorCode::IncompleteStreams => "incomplete_streams",
            ErrorCode::StreamNotOpen => "stream_not_open",
            ErrorCode::StreamAlreadyFinalized => "stream_already_finalized",
            ErrorCode::RunNotFound => "run_not_found",
            ErrorCode::LedgerIntegrityError => "ledger_integrity_error",
            ErrorCode::SchemaUnsupported => "schema_unsupported",
            ErrorCode::KeyMiss => "key_miss",
            ErrorCode::FingerprintMiss => "fingerprint_miss",
            ErrorCode::TypeMismatch => "type_mismatch",
            ErrorCode::OrderMismatch => "order_mismatch",
            ErrorCode::NotLoaded => "not_loaded",
            ErrorCode::StreamMissing => "stream_missing",
            ErrorCode::Io => "io",
            ErrorCode::Config => "config",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error type shared by every layer of the core. Carries the stable code,
/// a short human message, and (when available) the run ID and step the
/// error occurred at — never any payload content, per spec.md §7
/// ("no sensitive data appears in error messages").
#[derive(Debug)]
pub struct CoreError {
    pub code: ErrorCode,
    pub message: String,
    pub run_id: Option<RunId>,
    pub step: Option<u64>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl CoreError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            run_id: None,
            step: None,
            source: None,
        }
    }

    pub fn with_run(mut self, run_id: impl Into<RunId>, step: Option<u64>) -> Self {
        self.run_id = Some(run_id.into());
        self.step = step;
        self
    }

    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::new(ErrorCode::Io, message).with_source(err)
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(run_id) = &self.run_id {
            write!(f, " (run_id={run_id}")?;
            if let Some(step) = self.step {
                write!(f, ", step={step}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::io("I/O operation failed", err)
    }
}
