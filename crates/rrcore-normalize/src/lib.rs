//! Deterministic input normalization, fingerprinting, and redaction.
//!
//! The three pieces are kept separate because they run at different points
//! in the record path: the Normalizer and Fingerprinter run synchronously on
//! the calling thread (spec.md §4.1, §4.2), while the Redactor runs inside
//! the Background Writer, after fingerprinting, so redaction never changes
//! what a fingerprint means (spec.md §4.9).

pub mod canonical;
pub mod fingerprint;
pub mod normalizer;
pub mod redact;

pub use fingerprint::fingerprint;
pub use normalizer::{NormalizedInput, Normalizer, Sanitizer};
pub use redact::{Redactor, built_in_redaction_rules};
