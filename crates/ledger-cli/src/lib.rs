//! Ledger CLI: drives the event store and account handlers end to end.
//!
//! Every invocation starts from an empty in-memory log, so each subcommand
//! is a self-contained demonstration that prints a JSON report.

pub mod commands;
pub mod config;
pub mod error;

use std::sync::Arc;

use ledger_core::clock::{Clock, SystemClock};
use ledger_core::repository::EventRepository;
use ledger_event_store::InMemoryEventRepository;

use crate::config::{Cli, CliConfig, LedgerCommand};
use crate::error::CliError;

/// Runs the parsed command against a fresh store and returns the report as
/// pretty-printed JSON.
///
/// # Errors
///
/// Returns `CliError::Config` for invalid settings, and whatever the selected
/// command fails with.
pub async fn run(cli: &Cli) -> Result<String, CliError> {
    let config = CliConfig::from_cli(cli)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let repo: Arc<dyn EventRepository> = Arc::new(InMemoryEventRepository::new());

    let report = match &cli.command {
        LedgerCommand::Scenario(args) => {
            let report =
                commands::scenario::run_scenario(args, clock.as_ref(), repo.as_ref()).await?;
            serde_json::to_string_pretty(&report)?
        }
        LedgerCommand::Race(args) => {
            let report = commands::race::run_race(args, &config, clock, repo).await?;
            serde_json::to_string_pretty(&report)?
        }
    };
    Ok(report)
}
