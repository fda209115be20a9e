//! Fixture builders shared by every crate's integration tests: an isolated
//! recording environment (`TestLedger`), declarative sample events
//! (`RunBuilder`), and a thin CLI-process harness for `rrcore-cli`.

pub mod cli;
pub mod ledger;

pub use cli::{CliResult, CliWorld};
pub use ledger::{RunBuilder, TestLedger};
