//! Event replay: turning stored history back into account state.
//!
//! [`replay`] and [`fold`] are pure and deterministic. Folding a prefix of a
//! stream and then folding the rest onto that state gives the same account
//! as replaying the whole stream at once.

use ledger_core::aggregate::AggregateRoot;
use ledger_core::error::DomainError;
use ledger_core::event::{DomainEvent, EventMetadata};
use ledger_core::repository::StoredEvent;
use serde::de::DeserializeOwned;

use super::aggregates::Account;
use super::events::{
    ACCOUNT_CREATED_EVENT_TYPE, AccountEvent, AccountEventKind, INSUFFICIENT_FUNDS_EVENT_TYPE,
    MONEY_WITHDRAWN_EVENT_TYPE,
};

/// Converts a domain event into the record the store keeps.
#[must_use]
pub fn to_stored_event(event: &AccountEvent) -> StoredEvent {
    let meta = event.metadata();
    StoredEvent {
        event_id: meta.event_id,
        aggregate_id: meta.aggregate_id.clone(),
        event_type: event.event_type().to_owned(),
        payload: event.to_payload(),
        version: meta.version,
        correlation_id: meta.correlation_id,
        causation_id: meta.causation_id,
        occurred_at: meta.occurred_at,
    }
}

/// Decodes a stored record into a typed account event.
///
/// # Errors
///
/// Returns `DomainError::UnknownEventType` if the type tag is not one this
/// context knows, and `DomainError::Infrastructure` if the payload does not
/// match the shape its tag promises.
pub fn decode(stored: &StoredEvent) -> Result<AccountEvent, DomainError> {
    let kind = match stored.event_type.as_str() {
        ACCOUNT_CREATED_EVENT_TYPE => AccountEventKind::AccountCreated(payload_of(stored)?),
        MONEY_WITHDRAWN_EVENT_TYPE => AccountEventKind::MoneyWithdrawn(payload_of(stored)?),
        INSUFFICIENT_FUNDS_EVENT_TYPE => AccountEventKind::InsufficientFunds(payload_of(stored)?),
        other => return Err(DomainError::UnknownEventType(other.to_owned())),
    };

    Ok(AccountEvent {
        metadata: EventMetadata {
            event_id: stored.event_id,
            event_type: stored.event_type.clone(),
            aggregate_id: stored.aggregate_id.clone(),
            version: stored.version,
            correlation_id: stored.correlation_id,
            causation_id: stored.causation_id,
            occurred_at: stored.occurred_at,
        },
        kind,
    })
}

fn payload_of<T: DeserializeOwned>(stored: &StoredEvent) -> Result<T, DomainError> {
    serde_json::from_value(stored.payload.clone()).map_err(|e| {
        DomainError::Infrastructure(format!(
            "event deserialization failed for {} ({}): {e}",
            stored.event_id, stored.event_type
        ))
    })
}

/// Applies `events` in order on top of `account`.
///
/// # Errors
///
/// Stops at the first event that cannot be decoded; see [`decode`].
pub fn fold(mut account: Account, events: &[StoredEvent]) -> Result<Account, DomainError> {
    for stored in events {
        let event = decode(stored)?;
        account.apply(&event);
    }
    Ok(account)
}

/// Rebuilds an account from its full history, starting from the zero-value
/// state.
///
/// # Errors
///
/// Stops at the first event that cannot be decoded; see [`decode`].
pub fn replay(account_id: &str, events: &[StoredEvent]) -> Result<Account, DomainError> {
    fold(Account::new(account_id), events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use ledger_core::clock::Clock;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::domain::aggregates::AccountStatus;

    #[derive(Debug)]
    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }

    /// History of acc-1: opened with 1000, withdrew 300, refused 1000.
    fn scenario_history() -> Vec<StoredEvent> {
        let clock = clock();
        let (account, _) = Account::open("acc-1", dec!(1000), Uuid::new_v4(), &clock).unwrap();
        let (account, _) = account.withdraw(dec!(300), Uuid::new_v4(), &clock).unwrap();
        let (account, _) = account.withdraw(dec!(1000), Uuid::new_v4(), &clock).unwrap();
        account
            .uncommitted_events()
            .iter()
            .map(to_stored_event)
            .collect()
    }

    #[test]
    fn test_replay_of_empty_history_is_zero_value() {
        let account = replay("acc-1", &[]).unwrap();

        assert_eq!(account, Account::new("acc-1"));
    }

    #[test]
    fn test_replay_rebuilds_scenario_state() {
        // Arrange
        let history = scenario_history();

        // Act
        let account = replay("acc-1", &history).unwrap();

        // Assert
        assert_eq!(account.balance(), dec!(700));
        assert_eq!(account.version(), 3);
        assert_eq!(account.status(), AccountStatus::Active);
        assert!(account.uncommitted_events().is_empty());
    }

    #[test]
    fn test_replay_is_deterministic() {
        let history = scenario_history();

        let first = replay("acc-1", &history).unwrap();
        let second = replay("acc-1", &history).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_fold_of_suffix_onto_prefix_matches_full_replay() {
        let history = scenario_history();
        let full = replay("acc-1", &history).unwrap();

        for split in 0..=history.len() {
            let (prefix, suffix) = history.split_at(split);
            let partial = replay("acc-1", prefix).unwrap();

            let resumed = fold(partial, suffix).unwrap();

            assert_eq!(resumed, full, "split at {split}");
        }
    }

    #[test]
    fn test_decode_round_trips_what_to_stored_event_wrote() {
        let (_, event) = Account::open("acc-1", dec!(12.34), Uuid::new_v4(), &clock()).unwrap();

        let decoded = decode(&to_stored_event(&event)).unwrap();

        assert_eq!(decoded, event);
    }

    #[test]
    fn test_unknown_event_type_fails_replay() {
        // Arrange
        let mut history = scenario_history();
        history[1].event_type = "MoneyDeposited".to_owned();

        // Act
        let result = replay("acc-1", &history);

        // Assert
        match result.unwrap_err() {
            DomainError::UnknownEventType(tag) => assert_eq!(tag, "MoneyDeposited"),
            other => panic!("expected UnknownEventType, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_payload_fails_replay() {
        let mut history = scenario_history();
        history[0].payload = serde_json::json!({ "account_id": "acc-1" });

        let result = replay("acc-1", &history);

        match result.unwrap_err() {
            DomainError::Infrastructure(msg) => {
                assert!(msg.contains("event deserialization failed"));
            }
            other => panic!("expected Infrastructure, got {other:?}"),
        }
    }

    #[test]
    fn test_insufficient_funds_only_advances_version() {
        let history = scenario_history();
        let before = replay("acc-1", &history[..2]).unwrap();

        let after = fold(before.clone(), &history[2..]).unwrap();

        assert_eq!(after.balance(), before.balance());
        assert_eq!(after.version(), before.version() + 1);
    }

    #[test]
    fn test_replay_uses_recorded_new_balance_verbatim() {
        let mut history = scenario_history();
        history[1].payload["new_balance"] = serde_json::json!("650");

        let account = replay("acc-1", &history[..2]).unwrap();

        assert_eq!(account.balance(), Decimal::from(650));
    }
}
