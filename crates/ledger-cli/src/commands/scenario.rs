//! `ledger scenario`: open an account and withdraw from it step by step.

use ledger_account::application::command_handlers::{
    WithdrawalOutcome, handle_create_account, handle_withdraw_money,
};
use ledger_account::application::query_handlers::{
    AccountView, get_account_by_id, get_account_history,
};
use ledger_account::domain::commands::{CreateAccount, WithdrawMoney};
use ledger_account::domain::replay::replay;
use ledger_core::clock::Clock;
use ledger_core::error::DomainError;
use ledger_core::repository::{EventRepository, StoredEvent};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ScenarioArgs;
use crate::error::CliError;

/// One withdrawal attempt and what came of it.
#[derive(Debug, Serialize)]
pub struct StepReport {
    /// The amount asked for.
    pub amount: Decimal,
    /// The recorded outcome, when the withdrawal reached the log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<WithdrawalOutcome>,
    /// Why the withdrawal was rejected before reaching the log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<String>,
}

/// Everything `ledger scenario` prints.
#[derive(Debug, Serialize)]
pub struct ScenarioReport {
    /// The account's state as seen by the query side.
    pub account: AccountView,
    /// Each withdrawal in the order it ran.
    pub steps: Vec<StepReport>,
    /// The account's log, in append order.
    pub events: Vec<StoredEvent>,
}

/// Opens `args.account` and runs each withdrawal in order.
///
/// Invalid amounts are reported per step and do not stop the run; they
/// leave nothing in the log.
///
/// # Errors
///
/// Returns `CliError::Domain` if the account cannot be opened, a
/// withdrawal fails for any reason other than an invalid amount, or the
/// final history does not replay to the state the query side reports.
pub async fn run_scenario(
    args: &ScenarioArgs,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<ScenarioReport, CliError> {
    let create = CreateAccount {
        correlation_id: Uuid::new_v4(),
        account_id: args.account.clone(),
        initial_balance: args.initial_balance,
    };
    handle_create_account(&create, clock, repo).await?;

    let mut steps = Vec::with_capacity(args.withdrawals.len());
    for amount in &args.withdrawals {
        let command = WithdrawMoney {
            correlation_id: Uuid::new_v4(),
            account_id: args.account.clone(),
            amount: *amount,
        };
        match handle_withdraw_money(&command, clock, repo).await {
            Ok(result) => steps.push(StepReport {
                amount: *amount,
                outcome: Some(result.outcome),
                rejected: None,
            }),
            Err(err @ (DomainError::InvalidAmount(_) | DomainError::Validation(_))) => {
                warn!(%amount, error = %err, "withdrawal rejected");
                steps.push(StepReport {
                    amount: *amount,
                    outcome: None,
                    rejected: Some(err.to_string()),
                });
            }
            Err(err) => return Err(err.into()),
        }
    }

    let account = get_account_by_id(&args.account, repo).await?;
    let events = get_account_history(&args.account, repo).await?;

    let replayed = AccountView::from(&replay(&args.account, &events)?);
    if replayed != account {
        return Err(CliError::Report(format!(
            "replayed state {replayed:?} differs from query view {account:?}"
        )));
    }

    info!(
        account_id = %account.account_id,
        balance = %account.balance,
        version = account.version,
        "scenario finished"
    );

    Ok(ScenarioReport {
        account,
        steps,
        events,
    })
}
