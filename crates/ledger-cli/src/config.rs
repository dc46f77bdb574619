//! Command-line arguments and runtime configuration.

use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;

use crate::error::CliError;

/// How log lines are written to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Human-readable text.
    Text,
}

/// Event-sourced account ledger demo.
#[derive(Debug, Parser)]
#[command(name = "ledger", version, about = "Event-sourced account ledger demo")]
pub struct Cli {
    /// Read/decide/append cycles allowed per withdrawal under contention.
    /// Defaults to one per racing writer, which no race can exhaust.
    #[arg(long, env = "LEDGER_MAX_RETRIES", global = true)]
    pub max_retries: Option<u32>,

    /// Log output format.
    #[arg(
        long,
        env = "LEDGER_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Json,
        global = true
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: LedgerCommand,
}

/// Available demonstrations.
#[derive(Debug, Subcommand)]
pub enum LedgerCommand {
    /// Open one account and run withdrawals against it in order.
    Scenario(ScenarioArgs),
    /// Race concurrent withdrawals against one account.
    Race(RaceArgs),
}

/// Arguments for `ledger scenario`.
#[derive(Debug, Clone, Args)]
pub struct ScenarioArgs {
    /// Account identifier.
    #[arg(long, default_value = "acc-1")]
    pub account: String,

    /// Opening balance.
    #[arg(long, default_value = "1000")]
    pub initial_balance: Decimal,

    /// Amount to withdraw; repeat for several withdrawals.
    #[arg(
        long = "withdraw",
        default_values = ["300", "1000"],
        allow_negative_numbers = true
    )]
    pub withdrawals: Vec<Decimal>,
}

/// Arguments for `ledger race`.
#[derive(Debug, Clone, Args)]
pub struct RaceArgs {
    /// Account identifier.
    #[arg(long, default_value = "race-1")]
    pub account: String,

    /// Opening balance.
    #[arg(long, default_value = "1000")]
    pub initial_balance: Decimal,

    /// Amount each writer tries to withdraw.
    #[arg(long, default_value = "100")]
    pub amount: Decimal,

    /// Number of concurrent writers.
    #[arg(long, default_value_t = 16)]
    pub writers: usize,
}

/// Settings shared by every subcommand, checked once at startup.
#[derive(Debug, Clone, Copy)]
pub struct CliConfig {
    /// Read/decide/append cycles allowed per withdrawal, when set.
    pub max_retries: Option<u32>,
    /// Log output format.
    pub log_format: LogFormat,
}

impl CliConfig {
    /// Builds the configuration from parsed arguments.
    ///
    /// # Errors
    ///
    /// Returns `CliError::Config` if `max_retries` is set to zero.
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if cli.max_retries == Some(0) {
            return Err(CliError::Config(
                "LEDGER_MAX_RETRIES / --max-retries must be at least 1".to_owned(),
            ));
        }
        Ok(Self {
            max_retries: cli.max_retries,
            log_format: cli.log_format,
        })
    }
}
