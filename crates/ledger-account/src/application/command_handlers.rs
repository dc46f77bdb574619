//! Command handlers for the Account context.
//!
//! This module contains application-level command handler functions that
//! orchestrate domain logic: read history, replay, decide, append at the
//! version that was read. None of them retry on their own except
//! [`handle_withdraw_money_with_retry`], which is an explicit opt-in.

use ledger_core::aggregate::AggregateRoot;
use ledger_core::clock::Clock;
use ledger_core::command::Command;
use ledger_core::error::DomainError;
use ledger_core::repository::{EventRepository, StoredEvent};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::domain::aggregates::Account;
use crate::domain::commands::{CreateAccount, WithdrawMoney};
use crate::domain::events::AccountEventKind;
use crate::domain::replay::{replay, to_stored_event};

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct AccountCommandResult {
    /// The aggregate ID affected by the command.
    pub aggregate_id: String,
    /// The stored events produced and persisted.
    pub stored_events: Vec<StoredEvent>,
}

/// What a handled withdrawal amounted to. A refusal is a recorded business
/// outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WithdrawalOutcome {
    /// The money was withdrawn.
    Withdrawn {
        /// The amount taken out.
        amount: Decimal,
        /// Balance after the withdrawal.
        new_balance: Decimal,
    },
    /// The withdrawal was refused for lack of funds.
    Refused {
        /// The amount asked for.
        requested: Decimal,
        /// Balance at the time of the refusal.
        available: Decimal,
    },
}

impl WithdrawalOutcome {
    fn from_kind(kind: &AccountEventKind) -> Option<Self> {
        match kind {
            AccountEventKind::MoneyWithdrawn(payload) => Some(Self::Withdrawn {
                amount: payload.amount,
                new_balance: payload.new_balance,
            }),
            AccountEventKind::InsufficientFunds(payload) => Some(Self::Refused {
                requested: payload.requested_amount,
                available: payload.current_balance,
            }),
            AccountEventKind::AccountCreated(_) => None,
        }
    }
}

/// Result of a successfully handled withdrawal.
#[derive(Debug)]
pub struct WithdrawResult {
    /// The aggregate ID affected by the command.
    pub aggregate_id: String,
    /// The stored events produced and persisted.
    pub stored_events: Vec<StoredEvent>,
    /// Whether the money left the account.
    pub outcome: WithdrawalOutcome,
    /// How many read/decide/append cycles it took (1 without retries).
    pub attempts: u32,
}

/// Validates and appends the account's uncommitted events at the version
/// they were decided against.
async fn persist(
    account: &Account,
    repo: &dyn EventRepository,
) -> Result<Vec<StoredEvent>, DomainError> {
    let stored_events = account
        .uncommitted_events()
        .iter()
        .map(|event| {
            event.kind.validate()?;
            Ok(to_stored_event(event))
        })
        .collect::<Result<Vec<_>, DomainError>>()?;

    repo.append(
        account.aggregate_id(),
        account.committed_version(),
        &stored_events,
    )
    .await?;

    Ok(stored_events)
}

/// Handles the `CreateAccount` command: checks that the account has no
/// history, opens it, and persists the `AccountCreated` event.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a malformed command,
/// `DomainError::InvalidAmount` for a negative opening balance,
/// `DomainError::AggregateAlreadyExists` if the account already has events,
/// and `DomainError::ConcurrencyConflict` if another writer opened it first.
#[instrument(
    skip_all,
    fields(
        command_type = command.command_type(),
        correlation_id = %command.correlation_id(),
        account_id = %command.account_id,
    )
)]
pub async fn handle_create_account(
    command: &CreateAccount,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<AccountCommandResult, DomainError> {
    command.validate()?;

    let existing_events = repo.read(&command.account_id).await?;
    if !existing_events.is_empty() {
        return Err(DomainError::AggregateAlreadyExists(
            command.account_id.clone(),
        ));
    }

    let (account, _) = Account::open(
        command.account_id.clone(),
        command.initial_balance,
        command.correlation_id,
        clock,
    )?;
    let stored_events = persist(&account, repo).await?;

    info!(balance = %account.balance(), "account opened");

    Ok(AccountCommandResult {
        aggregate_id: command.account_id.clone(),
        stored_events,
    })
}

/// Handles the `WithdrawMoney` command: replays the account, decides the
/// withdrawal, and persists the resulting event, whether it grants or
/// refuses the withdrawal.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a malformed command,
/// `DomainError::AggregateNotFound` if the account has no history,
/// `DomainError::InvalidAmount` for a zero or negative amount,
/// `DomainError::UnknownEventType` if the history cannot be replayed, and
/// `DomainError::ConcurrencyConflict` if the log grew since it was read.
#[instrument(
    skip_all,
    fields(
        command_type = command.command_type(),
        correlation_id = %command.correlation_id(),
        account_id = %command.account_id,
    )
)]
pub async fn handle_withdraw_money(
    command: &WithdrawMoney,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
) -> Result<WithdrawResult, DomainError> {
    command.validate()?;

    let existing_events = repo.read(&command.account_id).await?;
    if existing_events.is_empty() {
        return Err(DomainError::AggregateNotFound(command.account_id.clone()));
    }
    let account = replay(&command.account_id, &existing_events)?;

    let (decided, event) = account.withdraw(command.amount, command.correlation_id, clock)?;
    let outcome = WithdrawalOutcome::from_kind(&event.kind).ok_or_else(|| {
        DomainError::Infrastructure(format!(
            "withdrawal produced unexpected event {}",
            event.kind.event_type()
        ))
    })?;

    let stored_events = persist(&decided, repo).await?;

    info!(
        version = decided.version(),
        balance = %decided.balance(),
        event_type = event.kind.event_type(),
        "withdrawal decided"
    );

    Ok(WithdrawResult {
        aggregate_id: command.account_id.clone(),
        stored_events,
        outcome,
        attempts: 1,
    })
}

/// Runs [`handle_withdraw_money`] and, on a concurrency conflict, re-reads
/// the account and decides again, up to `max_attempts` cycles in total.
/// Every other error is returned immediately.
///
/// # Errors
///
/// Returns the last `DomainError::ConcurrencyConflict` once `max_attempts`
/// is exhausted, or any non-retryable error from the first cycle that hits
/// it.
pub async fn handle_withdraw_money_with_retry(
    command: &WithdrawMoney,
    clock: &dyn Clock,
    repo: &dyn EventRepository,
    max_attempts: u32,
) -> Result<WithdrawResult, DomainError> {
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match handle_withdraw_money(command, clock, repo).await {
            Ok(mut result) => {
                result.attempts = attempt;
                return Ok(result);
            }
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                debug!(
                    account_id = %command.account_id,
                    attempt,
                    error = %err,
                    "retrying withdrawal after concurrency conflict"
                );
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use ledger_core::clock::Clock;
    use ledger_core::error::DomainError;
    use ledger_core::repository::{EventRepository, StoredEvent};
    use ledger_event_store::InMemoryEventRepository;
    use ledger_test_support::{
        ConflictingEventRepository, EmptyEventRepository, FailingEventRepository, FixedClock,
        RecordingEventRepository, fixed_now,
    };
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::*;
    use crate::domain::events::{
        ACCOUNT_CREATED_EVENT_TYPE, AccountCreated, INSUFFICIENT_FUNDS_EVENT_TYPE,
        MONEY_WITHDRAWN_EVENT_TYPE,
    };

    fn created_event(account_id: &str, balance: Decimal, at: DateTime<Utc>) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::new_v4(),
            aggregate_id: account_id.to_owned(),
            event_type: ACCOUNT_CREATED_EVENT_TYPE.to_owned(),
            payload: serde_json::to_value(AccountCreated {
                account_id: account_id.to_owned(),
                initial_balance: balance,
            })
            .unwrap(),
            version: 1,
            correlation_id: Uuid::new_v4(),
            causation_id: Uuid::new_v4(),
            occurred_at: at,
        }
    }

    fn withdraw_command(account_id: &str, amount: Decimal) -> WithdrawMoney {
        WithdrawMoney {
            correlation_id: Uuid::new_v4(),
            account_id: account_id.to_owned(),
            amount,
        }
    }

    async fn open(repo: &dyn EventRepository, clock: &dyn Clock, balance: Decimal) {
        let command = CreateAccount {
            correlation_id: Uuid::new_v4(),
            account_id: "acc-1".to_owned(),
            initial_balance: balance,
        };
        handle_create_account(&command, clock, repo).await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_create_account_persists_account_created_event() {
        // Arrange
        let correlation_id = Uuid::new_v4();
        let clock = FixedClock(fixed_now());
        let repo = RecordingEventRepository::new(Vec::new());
        let command = CreateAccount {
            correlation_id,
            account_id: "acc-1".to_owned(),
            initial_balance: dec!(1000),
        };

        // Act
        let result = handle_create_account(&command, &clock, &repo)
            .await
            .unwrap();

        // Assert
        assert_eq!(result.aggregate_id, "acc-1");
        assert_eq!(result.stored_events.len(), 1);

        let appended = repo.appended_events();
        assert_eq!(appended.len(), 1);
        let (aggregate_id, expected_version, events) = &appended[0];
        assert_eq!(aggregate_id, "acc-1");
        assert_eq!(*expected_version, 0);
        assert_eq!(events, &result.stored_events);

        let stored = &events[0];
        assert_eq!(stored.event_type, ACCOUNT_CREATED_EVENT_TYPE);
        assert_eq!(stored.version, 1);
        assert_eq!(stored.correlation_id, correlation_id);
        assert_eq!(stored.causation_id, correlation_id);
        assert_eq!(stored.occurred_at, clock.0);

        let payload: AccountCreated = serde_json::from_value(stored.payload.clone()).unwrap();
        assert_eq!(payload.account_id, "acc-1");
        assert_eq!(payload.initial_balance, dec!(1000));
    }

    #[tokio::test]
    async fn test_handle_create_account_rejects_existing_account() {
        let repo =
            RecordingEventRepository::new(vec![created_event("acc-1", dec!(5), fixed_now())]);
        let command = CreateAccount {
            correlation_id: Uuid::new_v4(),
            account_id: "acc-1".to_owned(),
            initial_balance: dec!(10),
        };

        let result = handle_create_account(&command, &FixedClock::default(), &repo).await;

        match result.unwrap_err() {
            DomainError::AggregateAlreadyExists(id) => assert_eq!(id, "acc-1"),
            other => panic!("expected AggregateAlreadyExists, got {other:?}"),
        }
        assert!(repo.appended_events().is_empty());
    }

    #[tokio::test]
    async fn test_handle_create_account_rejects_negative_balance() {
        let repo = EmptyEventRepository;
        let command = CreateAccount {
            correlation_id: Uuid::new_v4(),
            account_id: "acc-1".to_owned(),
            initial_balance: dec!(-10),
        };

        let result = handle_create_account(&command, &FixedClock::default(), &repo).await;

        assert!(matches!(result, Err(DomainError::InvalidAmount(_))));
    }

    #[tokio::test]
    async fn test_handle_create_account_rejects_malformed_id_before_reading() {
        let repo = FailingEventRepository;
        let command = CreateAccount {
            correlation_id: Uuid::new_v4(),
            account_id: String::new(),
            initial_balance: dec!(10),
        };

        let result = handle_create_account(&command, &FixedClock::default(), &repo).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_handle_withdraw_money_persists_money_withdrawn_event() {
        // Arrange
        let clock = FixedClock(fixed_now());
        let repo = RecordingEventRepository::new(vec![created_event("acc-1", dec!(1000), clock.0)]);
        let command = withdraw_command("acc-1", dec!(300));

        // Act
        let result = handle_withdraw_money(&command, &clock, &repo).await.unwrap();

        // Assert
        assert_eq!(
            result.outcome,
            WithdrawalOutcome::Withdrawn {
                amount: dec!(300),
                new_balance: dec!(700),
            }
        );
        assert_eq!(result.attempts, 1);

        let appended = repo.appended_events();
        assert_eq!(appended.len(), 1);
        let (_, expected_version, events) = &appended[0];
        assert_eq!(*expected_version, 1);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, MONEY_WITHDRAWN_EVENT_TYPE);
        assert_eq!(events[0].version, 2);
        assert_eq!(events[0].correlation_id, command.correlation_id);
    }

    #[tokio::test]
    async fn test_handle_withdraw_money_records_refusal_as_success() {
        let clock = FixedClock(fixed_now());
        let repo = RecordingEventRepository::new(vec![created_event("acc-1", dec!(100), clock.0)]);
        let command = withdraw_command("acc-1", dec!(100.01));

        let result = handle_withdraw_money(&command, &clock, &repo).await.unwrap();

        assert_eq!(
            result.outcome,
            WithdrawalOutcome::Refused {
                requested: dec!(100.01),
                available: dec!(100),
            }
        );
        let appended = repo.appended_events();
        assert_eq!(appended[0].2[0].event_type, INSUFFICIENT_FUNDS_EVENT_TYPE);
    }

    #[tokio::test]
    async fn test_handle_withdraw_money_returns_error_when_account_not_found() {
        let repo = EmptyEventRepository;
        let command = withdraw_command("acc-1", dec!(10));

        let result = handle_withdraw_money(&command, &FixedClock::default(), &repo).await;

        match result.unwrap_err() {
            DomainError::AggregateNotFound(id) => assert_eq!(id, "acc-1"),
            other => panic!("expected AggregateNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handle_withdraw_money_rejects_non_positive_amount_without_appending() {
        let repo =
            RecordingEventRepository::new(vec![created_event("acc-1", dec!(100), fixed_now())]);
        let clock = FixedClock::default();

        for amount in [dec!(0), dec!(-5)] {
            let result =
                handle_withdraw_money(&withdraw_command("acc-1", amount), &clock, &repo).await;
            assert!(matches!(result, Err(DomainError::InvalidAmount(_))));
        }
        assert!(repo.appended_events().is_empty());
    }

    #[tokio::test]
    async fn test_handle_withdraw_money_surfaces_unknown_event_type() {
        let mut unknown = created_event("acc-1", dec!(100), fixed_now());
        unknown.event_type = "AccountFrozen".to_owned();
        let repo = RecordingEventRepository::new(vec![unknown]);

        let command = withdraw_command("acc-1", dec!(1));

        let result = handle_withdraw_money(&command, &FixedClock::default(), &repo).await;

        match result.unwrap_err() {
            DomainError::UnknownEventType(tag) => assert_eq!(tag, "AccountFrozen"),
            other => panic!("expected UnknownEventType, got {other:?}"),
        }
        assert!(repo.appended_events().is_empty());
    }

    #[tokio::test]
    async fn test_handle_withdraw_money_propagates_infrastructure_error() {
        let result = handle_withdraw_money(
            &withdraw_command("acc-1", dec!(1)),
            &FixedClock::default(),
            &FailingEventRepository,
        )
        .await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[tokio::test]
    async fn test_handle_withdraw_money_does_not_retry_on_conflict() {
        // Arrange
        let clock = FixedClock::default();
        let store = InMemoryEventRepository::new();
        open(&store, &clock, dec!(100)).await;
        let conflicting = ConflictingEventRepository::new(store, 1);

        // Act
        let result =
            handle_withdraw_money(&withdraw_command("acc-1", dec!(10)), &clock, &conflicting).await;

        // Assert
        match result.unwrap_err() {
            DomainError::ConcurrencyConflict {
                expected, actual, ..
            } => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("expected ConcurrencyConflict, got {other:?}"),
        }
        assert_eq!(conflicting.append_calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_conflicts() {
        // Arrange
        let clock = FixedClock::default();
        let store = InMemoryEventRepository::new();
        open(&store, &clock, dec!(100)).await;
        let repo = ConflictingEventRepository::new(store, 2);

        // Act
        let result = handle_withdraw_money_with_retry(
            &withdraw_command("acc-1", dec!(40)),
            &clock,
            &repo,
            5,
        )
        .await
        .unwrap();

        // Assert
        assert_eq!(result.attempts, 3);
        assert_eq!(repo.append_calls(), 3);
        assert_eq!(repo.inner().read("acc-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let clock = FixedClock::default();
        let store = InMemoryEventRepository::new();
        open(&store, &clock, dec!(100)).await;
        let repo = ConflictingEventRepository::new(store, 10);

        let result = handle_withdraw_money_with_retry(
            &withdraw_command("acc-1", dec!(40)),
            &clock,
            &repo,
            3,
        )
        .await;

        assert!(matches!(
            result,
            Err(DomainError::ConcurrencyConflict { .. })
        ));
        assert_eq!(repo.append_calls(), 3);
        assert_eq!(repo.inner().read("acc-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_does_not_repeat_non_retryable_errors() {
        let clock = FixedClock::default();
        let store = InMemoryEventRepository::new();
        open(&store, &clock, dec!(100)).await;
        let repo = ConflictingEventRepository::new(store, 0);

        let result = handle_withdraw_money_with_retry(
            &withdraw_command("acc-1", dec!(0)),
            &clock,
            &repo,
            5,
        )
        .await;

        assert!(matches!(result, Err(DomainError::InvalidAmount(_))));
        assert_eq!(repo.append_calls(), 0);
    }
}
