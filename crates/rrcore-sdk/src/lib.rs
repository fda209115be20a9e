//! The Interception Surface: the narrow API adapters call around every
//! external I/O, in both record and replay mode (spec.md §4.8).
//!
//! Adapters never see a `Recorder` or a `Player` directly. They hold a
//! [`RecordHandle`] or a [`ReplayHandle`], implement [`Hook`] for their live
//! call, and invoke [`record_call`] or [`replay_call`] — the same adapter
//! code path works under either mode, since both handles expose the
//! identical shape of operation.

pub mod error;
pub mod handle;
pub mod hook;

pub use error::{Error, Result};
pub use handle::{record_call, replay_call, RecordHandle, ReplayHandle};
pub use hook::Hook;
