//! Shared schema for the record/replay core.
//!
//! This crate carries only data definitions — `Event`, `Manifest`, `Stream`
//! chunks, the lookup key, configuration, and the error taxonomy. No I/O, no
//! hashing, no normalization logic lives here; those belong to
//! `rrcore-normalize` and `rrcore-ledger`, which depend on this crate rather
//! than the other way around.

pub mod config;
pub mod error;
pub mod event;
pub mod manifest;
pub mod stream;

pub use config::{LedgerConfig, QueueFullPolicy, RedactionRule, ReplayMode};
pub use error::{CoreError, ErrorCode, Result};
pub use event::{
    BlobRef, Event, EventType, Fingerprint, LookupKey, OutputValue, RunId, StreamId, TokenUsage,
};
pub use manifest::{Compression, FileEntry, Manifest};
pub use stream::{Chunk, StreamSummary};

/// Major.minor schema version for the event wire format. Consumers reject
/// unknown majors and tolerate unknown minors (spec.md §4.3).
pub const SCHEMA_VERSION: &str = "1.0";

/// Parse the major component out of a `schema_version` string such as `"1.3"`.
pub fn schema_major(version: &str) -> Option<&str> {
    version.split('.').next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_major_splits_on_dot() {
        assert_eq!(schema_major("1.0"), Some("1"));
        assert_eq!(schema_major("2.7"), Some("2"));
        assert_eq!(schema_major("nope"), Some("nope"));
    }
}
