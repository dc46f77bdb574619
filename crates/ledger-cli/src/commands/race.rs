//! `ledger race`: many writers, one account, optimistic concurrency.

use std::sync::Arc;

use ledger_account::application::command_handlers::{
    WithdrawalOutcome, handle_create_account, handle_withdraw_money_with_retry,
};
use ledger_account::application::query_handlers::get_account_by_id;
use ledger_account::domain::commands::{CreateAccount, WithdrawMoney};
use ledger_core::clock::Clock;
use ledger_core::repository::EventRepository;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::config::{CliConfig, RaceArgs};
use crate::error::CliError;

/// Everything `ledger race` prints.
#[derive(Debug, Serialize)]
pub struct RaceReport {
    /// Account identifier.
    pub account_id: String,
    /// Number of concurrent writers.
    pub writers: usize,
    /// Opening balance.
    pub initial_balance: Decimal,
    /// Amount each writer asked for.
    pub amount: Decimal,
    /// Writers whose withdrawal was granted.
    pub withdrawn: usize,
    /// Writers whose withdrawal was refused for lack of funds.
    pub refused: usize,
    /// Appends lost to another writer and decided again.
    pub conflicts_retried: u32,
    /// Balance after all writers finished.
    pub final_balance: Decimal,
    /// Length of the account's log after all writers finished.
    pub final_version: i64,
}

/// Opens `args.account`, then spawns `args.writers` tasks that each try to
/// withdraw `args.amount`, retrying on concurrency conflicts.
///
/// # Errors
///
/// Returns `CliError::Config` for zero writers, `CliError::Domain` if a
/// writer fails (including running out of retries), `CliError::Task` if a
/// writer task dies, and `CliError::Report` if the final balance or log does
/// not add up.
pub async fn run_race(
    args: &RaceArgs,
    config: &CliConfig,
    clock: Arc<dyn Clock>,
    repo: Arc<dyn EventRepository>,
) -> Result<RaceReport, CliError> {
    if args.writers == 0 {
        return Err(CliError::Config("--writers must be at least 1".to_owned()));
    }
    // A writer loses at most once to each other writer.
    let max_attempts = match config.max_retries {
        Some(attempts) => attempts,
        None => u32::try_from(args.writers)
            .map_err(|_| CliError::Config("--writers is too large".to_owned()))?,
    };

    let create = CreateAccount {
        correlation_id: Uuid::new_v4(),
        account_id: args.account.clone(),
        initial_balance: args.initial_balance,
    };
    handle_create_account(&create, clock.as_ref(), repo.as_ref()).await?;

    let tasks: Vec<_> = (0..args.writers)
        .map(|_| {
            let clock = Arc::clone(&clock);
            let repo = Arc::clone(&repo);
            let command = WithdrawMoney {
                correlation_id: Uuid::new_v4(),
                account_id: args.account.clone(),
                amount: args.amount,
            };
            tokio::spawn(async move {
                handle_withdraw_money_with_retry(
                    &command,
                    clock.as_ref(),
                    repo.as_ref(),
                    max_attempts,
                )
                .await
            })
        })
        .collect();

    let mut withdrawn = 0;
    let mut refused = 0;
    let mut conflicts_retried = 0;
    let mut withdrawn_total = Decimal::ZERO;
    for task in tasks {
        let result = task.await??;
        conflicts_retried += result.attempts - 1;
        match result.outcome {
            WithdrawalOutcome::Withdrawn { amount, .. } => {
                withdrawn += 1;
                withdrawn_total += amount;
            }
            WithdrawalOutcome::Refused { .. } => refused += 1,
        }
    }

    let view = get_account_by_id(&args.account, repo.as_ref()).await?;
    check_outcome(args, view.balance, view.version, withdrawn_total)?;

    info!(
        account_id = %args.account,
        withdrawn,
        refused,
        conflicts_retried,
        balance = %view.balance,
        "race finished"
    );

    Ok(RaceReport {
        account_id: args.account.clone(),
        writers: args.writers,
        initial_balance: args.initial_balance,
        amount: args.amount,
        withdrawn,
        refused,
        conflicts_retried,
        final_balance: view.balance,
        final_version: view.version,
    })
}

/// Every writer must have left exactly one event, and the money that left
/// must match the drop in balance.
fn check_outcome(
    args: &RaceArgs,
    final_balance: Decimal,
    final_version: i64,
    withdrawn_total: Decimal,
) -> Result<(), CliError> {
    let expected_version = i64::try_from(args.writers)
        .map_err(|_| CliError::Config("--writers is too large".to_owned()))?
        + 1;
    if final_version != expected_version {
        return Err(CliError::Report(format!(
            "expected {expected_version} events, log holds {final_version}"
        )));
    }
    if args.initial_balance - withdrawn_total != final_balance {
        return Err(CliError::Report(format!(
            "opened with {} and withdrew {withdrawn_total}, but balance is {final_balance}",
            args.initial_balance
        )));
    }
    Ok(())
}
