//! Query handlers for the Account context.
//!
//! This module contains query handlers that reconstitute accounts from
//! stored events and return read-only view DTOs.

use std::collections::BTreeMap;

use ledger_core::aggregate::AggregateRoot;
use ledger_core::error::DomainError;
use ledger_core::repository::{EventRepository, StoredEvent};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::aggregates::{Account, AccountStatus};
use crate::domain::replay::replay;

/// Read-only view of an account aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountView {
    /// The account identifier.
    pub account_id: String,
    /// Current balance.
    pub balance: Decimal,
    /// Current version (event count).
    pub version: i64,
    /// Lifecycle status.
    pub status: AccountStatus,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.aggregate_id().to_owned(),
            balance: account.balance(),
            version: account.version(),
            status: account.status(),
        }
    }
}

/// Retrieves an account by its aggregate ID.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no events exist for the ID,
/// and `DomainError::UnknownEventType` or `DomainError::Infrastructure` if
/// the history cannot be replayed.
pub async fn get_account_by_id(
    account_id: &str,
    repo: &dyn EventRepository,
) -> Result<AccountView, DomainError> {
    let stored_events = repo.read(account_id).await?;
    if stored_events.is_empty() {
        return Err(DomainError::AggregateNotFound(account_id.to_owned()));
    }
    let account = replay(account_id, &stored_events)?;
    Ok(AccountView::from(&account))
}

/// Returns an account's full event history in append order. An unknown
/// account has an empty history.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the repository cannot be read.
pub async fn get_account_history(
    account_id: &str,
    repo: &dyn EventRepository,
) -> Result<Vec<StoredEvent>, DomainError> {
    repo.read(account_id).await
}

/// Projects every account in the log into a view, sorted by account ID.
///
/// Built from the global, timestamp-ordered event feed; each account's
/// events are put back into version order before replay.
///
/// # Errors
///
/// Fails on the first account whose history cannot be replayed.
pub async fn list_account_balances(
    repo: &dyn EventRepository,
) -> Result<Vec<AccountView>, DomainError> {
    let mut streams: BTreeMap<String, Vec<StoredEvent>> = BTreeMap::new();
    for event in repo.read_all().await? {
        streams
            .entry(event.aggregate_id.clone())
            .or_default()
            .push(event);
    }

    streams
        .into_iter()
        .map(|(account_id, mut events)| {
            events.sort_by_key(|event| event.version);
            let account = replay(&account_id, &events)?;
            Ok(AccountView::from(&account))
        })
        .collect()
}
