//! The append-only event ledger: segment framing, the Background Writer,
//! and the manifest writer (spec.md §4.3, §4.4).

pub mod layout;
pub mod manifest;
pub mod segment;
pub mod writer;

pub use layout::RunLayout;
pub use manifest::{hash_file, read_manifest, write_manifest_atomic};
pub use segment::{read_segment, SegmentContents, SegmentHeader, SegmentRecord, SegmentTrailer};
pub use writer::{BackgroundWriter, WriterOutcome};
