//! Ops CLI for the record/replay ledger: create a ledger root, and inspect,
//! verify, and summarize runs already recorded into one. Dashboards, a TUI,
//! and an MCP server layer are out of scope here (spec.md Non-goals:
//! "Dashboards, metric exporters, alerting").

pub mod cli;
mod commands;
mod config;

use anyhow::Result;
use cli::Cli;

pub fn run(cli: Cli) -> Result<()> {
    commands::dispatch(cli.command)
}
